//! Server metrics identifiers.

/// Metric names exported by the firehose server.
#[derive(Debug, Clone, Copy)]
pub struct Metrics;

impl Metrics {
    /// Streams currently open.
    pub const ACTIVE_REQUESTS: &'static str = "firehose_active_requests";
    /// Streams opened since start.
    pub const REQUESTS_TOTAL: &'static str = "firehose_requests_total";
    /// Passthrough requests currently running.
    pub const ACTIVE_PASSTHROUGHS: &'static str = "firehose_active_passthroughs";
    /// Passthrough requests since start.
    pub const PASSTHROUGHS_TOTAL: &'static str = "firehose_passthroughs_total";
    /// Responses sent on block streams.
    pub const BLOCKS_SENT_TOTAL: &'static str = "firehose_blocks_sent_total";
    /// Serialized response bytes sent on block streams.
    pub const BYTES_SENT_TOTAL: &'static str = "firehose_bytes_sent_total";

    /// Registers descriptions and zeroes every metric.
    pub fn init() {
        Self::describe();
        Self::zero();
    }

    fn describe() {
        metrics::describe_gauge!(
            Self::ACTIVE_REQUESTS,
            metrics::Unit::Count,
            "Number of block streams currently open"
        );
        metrics::describe_counter!(
            Self::REQUESTS_TOTAL,
            metrics::Unit::Count,
            "Total number of block streams opened"
        );
        metrics::describe_gauge!(
            Self::ACTIVE_PASSTHROUGHS,
            metrics::Unit::Count,
            "Number of passthrough requests currently running"
        );
        metrics::describe_counter!(
            Self::PASSTHROUGHS_TOTAL,
            metrics::Unit::Count,
            "Total number of passthrough requests"
        );
        metrics::describe_counter!(
            Self::BLOCKS_SENT_TOTAL,
            metrics::Unit::Count,
            "Total responses sent on block streams"
        );
        metrics::describe_counter!(
            Self::BYTES_SENT_TOTAL,
            metrics::Unit::Bytes,
            "Total serialized response bytes sent on block streams"
        );
    }

    fn zero() {
        metrics::gauge!(Self::ACTIVE_REQUESTS).set(0.0);
        metrics::counter!(Self::REQUESTS_TOTAL).absolute(0);
        metrics::gauge!(Self::ACTIVE_PASSTHROUGHS).set(0.0);
        metrics::counter!(Self::PASSTHROUGHS_TOTAL).absolute(0);
        metrics::counter!(Self::BLOCKS_SENT_TOTAL).absolute(0);
        metrics::counter!(Self::BYTES_SENT_TOTAL).absolute(0);
    }
}
