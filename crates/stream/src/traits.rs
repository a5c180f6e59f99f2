//! Collaborator traits consumed by the pipeline.

use firehose_types::Block;
use std::collections::BTreeSet;
use thiserror::Error;

/// A client-requested preprocessor failure.
#[derive(Debug, Error)]
#[error("preprocess block: {0}")]
pub struct PreprocessError(pub String);

/// A per-block transformation applied before emission.
///
/// Must be pure (same input, same output) and must not retain references to
/// its input across calls; the pipeline runs it from several worker tasks.
/// When transforms are chained, `previous` carries the upstream output.
pub trait BlockPreprocessor: Send + Sync {
    /// Transforms one block into the payload that goes on the wire.
    fn preprocess(
        &self,
        block: &Block,
        previous: Option<prost_types::Any>,
    ) -> Result<prost_types::Any, PreprocessError>;
}

/// A sparse index over merged bundles, used to skip files with no blocks of
/// interest.
///
/// The index is advisory: false positives are benign, false negatives are
/// the provider's bug. The pipeline trusts what it is told.
pub trait BlockIndexProvider: Send + Sync {
    /// The block numbers within `[base, base + bundle_size)` that possibly
    /// match the client's filter. `None` means the provider has no index for
    /// this range and everything may match.
    fn matching_blocks(&self, base: u64, bundle_size: u64) -> Option<BTreeSet<u64>>;
}
