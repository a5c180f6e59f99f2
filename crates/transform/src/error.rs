//! Transform resolution and execution errors.

use firehose_stream::StreamError;
use thiserror::Error;

/// Errors building transforms from request descriptors or running a
/// passthrough.
#[derive(Debug, Error)]
pub enum TransformError {
    /// No factory is registered for this descriptor kind.
    #[error("unknown transform {type_url:?}")]
    UnknownDescriptor {
        /// The descriptor's type URL.
        type_url: String,
    },

    /// The descriptor bytes do not decode into a valid transform.
    #[error("invalid transform {type_url:?}: {message}")]
    InvalidDescriptor {
        /// The descriptor's type URL.
        type_url: String,
        /// What was wrong with it.
        message: String,
    },

    /// More than one passthrough in the transform list.
    #[error("only one passthrough transform is allowed per request")]
    MultiplePassthroughs,

    /// A child stream spawned by a passthrough failed.
    #[error(transparent)]
    Stream(#[from] StreamError),
}
