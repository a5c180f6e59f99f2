//! Stream-level error type.

use firehose_store::StoreError;
use firehose_types::CursorError;
use thiserror::Error;

/// Terminal conditions of a block stream.
///
/// Anything not explicitly recoverable inside a source (transient store
/// reads are retried locally) terminates the stream with one of these.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The request itself is unservable as expressed.
    #[error("invalid request: {0}")]
    InvalidArgument(String),

    /// The requested range starts below the lowest block still available.
    #[error("{0}")]
    NotFound(String),

    /// The client supplied a cursor that does not decode.
    #[error("invalid cursor: {0}")]
    InvalidCursor(#[from] CursorError),

    /// The live subscription was dropped by the hub because the consumer
    /// could not keep up. Retryable with the last received cursor.
    #[error("live subscription lagging, resume with the last received cursor")]
    SubscriptionLagging,

    /// The live source went away underneath an active stream.
    #[error("live source closed")]
    LiveSourceClosed,

    /// A merged bundle that must exist is absent from every store.
    #[error("merged bundle {base} missing from all stores")]
    BundleHole {
        /// First block number of the missing bundle.
        base: u64,
    },

    /// The per-request cancellation token fired.
    #[error("stream cancelled")]
    Cancelled,

    /// The client's request deadline elapsed before the stream completed.
    #[error("source deadline exceeded")]
    DeadlineExceeded,

    /// The event consumer went away; nothing left to stream to.
    #[error("event consumer dropped")]
    ConsumerGone,

    /// A store read or decode failed beyond retry.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A client-supplied preprocessor failed; fatal for the stream.
    #[error(transparent)]
    Preprocess(#[from] crate::PreprocessError),

    /// An unexpected pipeline failure.
    #[error("internal stream failure: {0}")]
    Internal(String),
}

impl StreamError {
    /// Whether this error is the caller's fault rather than the stream's.
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::InvalidCursor(_))
    }
}
