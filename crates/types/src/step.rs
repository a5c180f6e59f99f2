//! The fork lifecycle step attached to every emitted block.

use derive_more::Display;

/// Where a block stands in the fork lifecycle when it is emitted.
///
/// For any `(num, id)` pair a stream emits `NEW (UNDO NEW)* FINAL?`, with
/// `FINAL` terminal for that pair.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// The block was appended to the longest chain.
    #[display("NEW")]
    New,
    /// The block was evicted by a reorganization and must be rolled back.
    #[display("UNDO")]
    Undo,
    /// The block is irreversible.
    #[display("FINAL")]
    Final,
}

impl Step {
    /// Stable numeric tag used inside opaque cursors.
    pub const fn cursor_tag(self) -> u8 {
        match self {
            Self::New => 1,
            Self::Undo => 2,
            Self::Final => 3,
        }
    }

    /// Inverse of [`Step::cursor_tag`].
    pub const fn from_cursor_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::New),
            2 => Some(Self::Undo),
            3 => Some(Self::Final),
            _ => None,
        }
    }

    /// Whether this step marks irreversibility.
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Final)
    }
}
