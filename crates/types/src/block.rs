//! Block reference and block record types.

use bytes::Bytes;
use derive_more::Display;
use thiserror::Error;

/// A `(number, id)` pair uniquely addressing one block on one fork.
///
/// Ids are stored normalized (lowercase hex, no `0x` prefix) so they can be
/// compared byte-for-byte across sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("#{num} ({id})")]
pub struct BlockRef {
    /// The block number (height).
    pub num: u64,
    /// The normalized block id.
    pub id: String,
}

impl BlockRef {
    /// Creates a new [`BlockRef`], normalizing the id.
    pub fn new(num: u64, id: impl AsRef<str>) -> Self {
        Self { num, id: normalize_block_id(id.as_ref()) }
    }
}

/// Normalizes a block id for comparison: lowercased hex without a `0x`
/// prefix.
pub fn normalize_block_id(id: &str) -> String {
    let id = id.strip_prefix("0x").or_else(|| id.strip_prefix("0X")).unwrap_or(id);
    id.to_ascii_lowercase()
}

/// A decoded block record, the unit every source yields.
///
/// The payload stays opaque to the core: only the embedding chain
/// integration knows how to interpret it. `payload_type` carries the type
/// URL under which the payload is re-wrapped on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    /// Number and id of this block.
    pub reference: BlockRef,
    /// The parent block on the same fork.
    pub parent: BlockRef,
    /// The highest block this block considers final.
    pub last_final: BlockRef,
    /// Block production time, nanoseconds since the unix epoch.
    pub timestamp_nanos: u64,
    /// Type URL of the encoded payload.
    pub payload_type: String,
    /// The chain-specific encoded payload.
    pub payload: Bytes,
}

impl Block {
    /// The block number.
    pub const fn num(&self) -> u64 {
        self.reference.num
    }

    /// The normalized block id.
    pub fn id(&self) -> &str {
        &self.reference.id
    }

    /// Whether this block is the first block of the chain.
    pub const fn is_genesis(&self) -> bool {
        self.reference.num == 0
    }

    /// Checks the structural invariants of a decoded block.
    ///
    /// Non-genesis blocks must sit exactly one above their parent, and the
    /// final head a block reports can never be above the block itself.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if !self.is_genesis() && self.reference.num != self.parent.num + 1 {
            return Err(DecodeError::Malformed(format!(
                "block {} does not follow its parent {}",
                self.reference, self.parent
            )));
        }
        if self.last_final.num > self.reference.num {
            return Err(DecodeError::Malformed(format!(
                "block {} reports a final head {} above itself",
                self.reference, self.last_final
            )));
        }
        Ok(())
    }
}

/// Errors produced while decoding raw block bytes.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes do not form a valid block record.
    #[error("malformed block: {0}")]
    Malformed(String),
    /// The payload type is not one this decoder understands.
    #[error("unsupported payload type {0:?}")]
    UnsupportedPayloadType(String),
}

/// The chain-supplied block codec.
///
/// Supplied by the embedding integration; the core never looks inside the
/// payload it produces.
pub trait BlockDecoder: Send + Sync {
    /// Decodes one encoded block record.
    fn decode(&self, bytes: &[u8]) -> Result<Block, DecodeError>;
}
