//! Core types shared across the firehose stack.
//!
//! This crate defines the block reference and record types, the fork
//! lifecycle [`Step`] enumeration and the opaque [`Cursor`] carried by every
//! emitted stream event.

mod block;
pub use block::{normalize_block_id, Block, BlockDecoder, BlockRef, DecodeError};

mod step;
pub use step::Step;

mod cursor;
pub use cursor::{Cursor, CursorError};
