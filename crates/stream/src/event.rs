//! The event envelope every stream emits.

use firehose_types::{Block, BlockRef, Cursor, Step};

/// What an event carries besides its step and cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// An undecorated block straight from a source.
    Block(Block),
    /// A block after client-requested preprocessing; the block is kept for
    /// addressing, the output is what goes on the wire.
    Processed {
        /// The source block.
        block: Block,
        /// The preprocessor output.
        output: prost_types::Any,
    },
    /// A rollback marker for an undone block. The undone reference travels
    /// in the cursor; no payload goes on the wire.
    Tombstone(BlockRef),
}

/// One emission of a block stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    /// Fork lifecycle position of this emission.
    pub step: Step,
    /// Resumption cursor after this emission.
    pub cursor: Cursor,
    /// The emission content.
    pub payload: EventPayload,
}

impl StreamEvent {
    /// The block this event is about.
    pub fn block_ref(&self) -> &BlockRef {
        match &self.payload {
            EventPayload::Block(block) | EventPayload::Processed { block, .. } => &block.reference,
            EventPayload::Tombstone(reference) => reference,
        }
    }
}
