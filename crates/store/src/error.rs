//! Store-layer error type.

use crate::BlobStoreError;
use firehose_types::DecodeError;
use thiserror::Error;

/// Errors produced while reading and decoding stored block data.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying blob store failed.
    #[error(transparent)]
    Blob(#[from] BlobStoreError),

    /// A bundle's framing is broken.
    #[error("truncated frame in bundle {key:?}")]
    TruncatedBundle {
        /// The bundle object key.
        key: String,
    },

    /// A bundle's blocks are not in ascending order.
    #[error("bundle {key:?} is not ordered at block {num}")]
    UnorderedBundle {
        /// The bundle object key.
        key: String,
        /// The offending block number.
        num: u64,
    },

    /// The chain codec rejected a frame.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl StoreError {
    /// Whether the error means the requested object is absent.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Blob(BlobStoreError::NotFound { .. }))
    }
}
