//! Passthrough transforms.
//!
//! A passthrough assumes control of the emission loop: it receives the
//! server's stream constructor so it can spawn child streams, and an output
//! channel wired straight to the client sender. Ordering of its output is
//! its own responsibility.

use crate::TransformError;
use async_trait::async_trait;
use firehose_stream::StreamFactory;
use firehose_types::Cursor;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The request parameters a passthrough operates on.
#[derive(Debug, Clone, Default)]
pub struct PassthroughRequest {
    /// Requested start block (see the stream request semantics).
    pub start_block_num: i64,
    /// Inclusive stop block, `0` for open-ended.
    pub stop_block_num: u64,
    /// Decoded resumption cursor, if the client supplied one.
    pub cursor: Option<Cursor>,
    /// Whether the client asked for final blocks only.
    pub final_blocks_only: bool,
}

/// One passthrough emission. A missing cursor means the message is not a
/// resumption point.
#[derive(Debug, Clone, PartialEq)]
pub struct PassthroughOutput {
    /// Resumption cursor after this message, when it is one.
    pub cursor: Option<Cursor>,
    /// The wire payload.
    pub payload: prost_types::Any,
}

/// A transform that takes over output generation.
#[async_trait]
pub trait PassthroughTransform: Send + Sync {
    /// Whether this passthrough surfaces UNDO steps to its consumer. One
    /// that does not is only compatible with final-blocks-only requests.
    fn emits_undos(&self) -> bool;

    /// Runs the passthrough until done, cancelled or failed. `factory`
    /// spawns child block streams; everything sent on `output` reaches the
    /// client in send order.
    async fn run(
        &self,
        request: PassthroughRequest,
        factory: StreamFactory,
        output: mpsc::Sender<PassthroughOutput>,
        cancel: CancellationToken,
    ) -> Result<(), TransformError>;
}
