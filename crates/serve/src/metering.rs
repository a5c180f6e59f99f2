//! Per-request meter events.

use crate::Identity;
use serde::Serialize;
use tracing::info;

/// One usage event, emitted after each response is serialized.
#[derive(Debug, Clone, Serialize)]
pub struct MeterEvent {
    /// Originating service.
    pub source: &'static str,
    /// Transport kind.
    pub kind: &'static str,
    /// RPC method name.
    pub method: &'static str,
    /// Serialized response size.
    pub egress_bytes: u64,
    /// Resolved user, when authenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Resolved api key, when authenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_id: Option<String>,
}

impl MeterEvent {
    /// An egress event for `method` on behalf of `identity`.
    pub fn egress(method: &'static str, egress_bytes: u64, identity: &Identity) -> Self {
        Self {
            source: "firehose",
            kind: "gRPC Stream",
            method,
            egress_bytes,
            user_id: identity.user_id.clone(),
            api_key_id: identity.api_key_id.clone(),
        }
    }
}

/// Where meter events go. Supplied by the embedding process.
pub trait MeterEventSink: Send + Sync {
    /// Accepts one event. Must not block.
    fn emit(&self, event: MeterEvent);
}

/// Default sink: structured log lines on a dedicated target, one per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMeterSink;

impl MeterEventSink for TracingMeterSink {
    fn emit(&self, event: MeterEvent) {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        info!(target: "firehose_metering", event = %payload, "meter event");
    }
}
