//! Opaque stream cursors.
//!
//! A cursor pins a client's position in the stream: the block the last event
//! was about, the chain head at that moment and the final head the stream
//! had reached. The opaque form is a versioned, self-delimited string so it
//! round-trips byte-for-byte and clients can compare cursors for equality.

use crate::{normalize_block_id, BlockRef, Step};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use thiserror::Error;

const CURSOR_VERSION: &str = "c1";

/// A decoded resumption cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// The lifecycle step of the event this cursor was attached to.
    pub step: Step,
    /// The block the event was about.
    pub block: BlockRef,
    /// The chain head when the event was emitted.
    pub head: BlockRef,
    /// The final head when the event was emitted.
    pub last_final: BlockRef,
}

impl Cursor {
    /// Encodes this cursor into its opaque string form.
    ///
    /// Encoding is deterministic: equal cursors encode to equal strings.
    pub fn to_opaque(&self) -> String {
        let plain = format!(
            "{}:{}:{}:{}:{}:{}:{}:{}",
            CURSOR_VERSION,
            self.step.cursor_tag(),
            self.block.num,
            self.block.id,
            self.head.num,
            self.head.id,
            self.last_final.num,
            self.last_final.id,
        );
        URL_SAFE_NO_PAD.encode(plain)
    }

    /// Decodes an opaque cursor string.
    ///
    /// Decoding is strict: anything that does not round-trip exactly through
    /// [`Cursor::to_opaque`] is rejected. The empty string is the "no
    /// cursor" sentinel and is rejected here; callers check for absence
    /// before decoding.
    pub fn from_opaque(opaque: &str) -> Result<Self, CursorError> {
        if opaque.is_empty() {
            return Err(CursorError::Empty);
        }
        let raw = URL_SAFE_NO_PAD.decode(opaque).map_err(|_| CursorError::Encoding)?;
        let plain = String::from_utf8(raw).map_err(|_| CursorError::Encoding)?;

        let segments: Vec<&str> = plain.split(':').collect();
        let [version, step, block_num, block_id, head_num, head_id, final_num, final_id] =
            segments[..]
        else {
            return Err(CursorError::Malformed("expected 8 segments"));
        };
        if version != CURSOR_VERSION {
            return Err(CursorError::Malformed("unknown cursor version"));
        }

        let step = step
            .parse::<u8>()
            .ok()
            .and_then(Step::from_cursor_tag)
            .ok_or(CursorError::Malformed("invalid step"))?;

        let cursor = Self {
            step,
            block: parse_ref(block_num, block_id)?,
            head: parse_ref(head_num, head_id)?,
            last_final: parse_ref(final_num, final_id)?,
        };

        if cursor.last_final.num > cursor.block.num {
            return Err(CursorError::Malformed("final head above cursor block"));
        }
        if cursor.step.is_final() && cursor.block != cursor.last_final {
            return Err(CursorError::Malformed("final cursor must sit on its final head"));
        }
        Ok(cursor)
    }
}

fn parse_ref(num: &str, id: &str) -> Result<BlockRef, CursorError> {
    let num = num.parse::<u64>().map_err(|_| CursorError::Malformed("invalid block number"))?;
    if id.is_empty() {
        return Err(CursorError::Malformed("empty block id"));
    }
    if id != normalize_block_id(id) {
        return Err(CursorError::Malformed("block id not normalized"));
    }
    Ok(BlockRef { num, id: id.to_string() })
}

/// Errors produced while decoding an opaque cursor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    /// The empty sentinel was passed where a cursor was required.
    #[error("empty cursor")]
    Empty,
    /// The opaque wrapper is not valid url-safe base64 / utf-8.
    #[error("invalid cursor encoding")]
    Encoding,
    /// The decoded cursor violates the cursor layout or its invariants.
    #[error("malformed cursor: {0}")]
    Malformed(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cursor(step: Step, block: (u64, &str), head: (u64, &str), last: (u64, &str)) -> Cursor {
        Cursor {
            step,
            block: BlockRef::new(block.0, block.1),
            head: BlockRef::new(head.0, head.1),
            last_final: BlockRef::new(last.0, last.1),
        }
    }

    #[rstest]
    #[case(cursor(Step::New, (5, "5a"), (7, "7a"), (3, "3a")))]
    #[case(cursor(Step::Undo, (6, "6a"), (6, "6b"), (4, "4a")))]
    #[case(cursor(Step::Final, (3, "3a"), (7, "7a"), (3, "3a")))]
    #[case(cursor(Step::New, (0, "genesis"), (0, "genesis"), (0, "genesis")))]
    fn round_trips(#[case] cursor: Cursor) {
        let opaque = cursor.to_opaque();
        let decoded = Cursor::from_opaque(&opaque).unwrap();
        assert_eq!(decoded, cursor);
        // Deterministic re-encoding.
        assert_eq!(decoded.to_opaque(), opaque);
    }

    #[test]
    fn rejects_empty_sentinel() {
        assert_eq!(Cursor::from_opaque(""), Err(CursorError::Empty));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(Cursor::from_opaque("garbage!!"), Err(CursorError::Encoding));
    }

    #[test]
    fn rejects_truncated_payload() {
        let opaque = URL_SAFE_NO_PAD.encode("c1:1:5:5a:7");
        assert_eq!(Cursor::from_opaque(&opaque), Err(CursorError::Malformed("expected 8 segments")));
    }

    #[test]
    fn rejects_unknown_version() {
        let opaque = URL_SAFE_NO_PAD.encode("c2:1:5:5a:7:7a:3:3a");
        assert_eq!(
            Cursor::from_opaque(&opaque),
            Err(CursorError::Malformed("unknown cursor version"))
        );
    }

    #[test]
    fn rejects_out_of_range_number() {
        let opaque = URL_SAFE_NO_PAD.encode("c1:1:99999999999999999999:5a:7:7a:3:3a");
        assert_eq!(
            Cursor::from_opaque(&opaque),
            Err(CursorError::Malformed("invalid block number"))
        );
    }

    #[test]
    fn rejects_denormalized_id() {
        let opaque = URL_SAFE_NO_PAD.encode("c1:1:5:0x5A:7:7a:3:3a");
        assert_eq!(
            Cursor::from_opaque(&opaque),
            Err(CursorError::Malformed("block id not normalized"))
        );
    }

    #[test]
    fn rejects_final_cursor_off_its_final_head() {
        let opaque = URL_SAFE_NO_PAD.encode("c1:3:5:5a:7:7a:3:3a");
        assert_eq!(
            Cursor::from_opaque(&opaque),
            Err(CursorError::Malformed("final cursor must sit on its final head"))
        );
    }

    #[test]
    fn rejects_final_head_above_block() {
        let opaque = URL_SAFE_NO_PAD.encode("c1:1:5:5a:7:7a:6:6a");
        assert_eq!(
            Cursor::from_opaque(&opaque),
            Err(CursorError::Malformed("final head above cursor block"))
        );
    }

    #[test]
    fn rejects_extra_segments() {
        let opaque = URL_SAFE_NO_PAD.encode("c1:1:5:5a:7:7a:3:3a:extra");
        assert_eq!(Cursor::from_opaque(&opaque), Err(CursorError::Malformed("expected 8 segments")));
    }
}
