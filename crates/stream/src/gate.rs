//! Resumption gate.
//!
//! After a resume or a file-to-live handover, the sources replay events the
//! consumer already has. The gate decides, event by event, whether an
//! emission extends the consumer's position or repeats it. Once one fork
//! event (NEW/UNDO) passes, the fork gate is open and everything later
//! flows; FINAL emissions are filtered independently by a monotone floor.

use firehose_types::{BlockRef, Cursor, Step};
use tracing::warn;

#[derive(Debug)]
enum ForkPosition {
    /// Nothing constrains fork events below `start`.
    FromStart(u64),
    /// The consumer's last fork event was NEW of this block.
    AfterNew(BlockRef),
    /// The consumer's last fork event was UNDO of this block; the matching
    /// replayed UNDO has (`true`) or has not (`false`) gone by.
    AfterUndo(BlockRef, bool),
    /// The consumer's last event was FINAL; its fork position is the cursor
    /// head.
    AfterHead(BlockRef),
    /// A fork event has been emitted; everything passes.
    Open,
}

/// Stateful emit/skip filter for replayed event sequences.
#[derive(Debug)]
pub struct CursorGate {
    fork: ForkPosition,
    /// FINAL events pass only strictly above this number.
    final_floor: Option<u64>,
}

impl CursorGate {
    /// Gate for a fresh stream starting at `start`: fork events below
    /// `start` and FINAL events below `start` are dropped.
    pub const fn from_start(start: u64) -> Self {
        Self { fork: ForkPosition::FromStart(start), final_floor: start.checked_sub(1) }
    }

    /// Gate resuming from a client cursor.
    pub fn from_cursor(cursor: &Cursor) -> Self {
        let final_floor = Some(cursor.last_final.num);
        match cursor.step {
            Step::New => Self { fork: ForkPosition::AfterNew(cursor.block.clone()), final_floor },
            Step::Undo => {
                Self { fork: ForkPosition::AfterUndo(cursor.block.clone(), false), final_floor }
            }
            Step::Final => Self { fork: ForkPosition::AfterHead(cursor.head.clone()), final_floor },
        }
    }

    /// Gate for the live handover of a stream that already emitted up to
    /// `last_new`, with FINAL emissions already at `final_floor`.
    pub const fn handover(last_new: BlockRef, final_floor: Option<u64>) -> Self {
        Self { fork: ForkPosition::AfterNew(last_new), final_floor }
    }

    /// Whether a fork event already passed through.
    pub const fn is_open(&self) -> bool {
        matches!(self.fork, ForkPosition::Open)
    }

    /// Current FINAL floor, for carrying across a gate swap.
    pub const fn final_floor(&self) -> Option<u64> {
        self.final_floor
    }

    /// Decides whether the event `(step, reference)` reaches the consumer.
    pub fn admits(&mut self, step: Step, reference: &BlockRef) -> bool {
        match step {
            Step::Final => self.admit_final(reference),
            Step::New | Step::Undo => self.admit_fork(step, reference),
        }
    }

    fn admit_final(&mut self, reference: &BlockRef) -> bool {
        if self.final_floor.is_some_and(|floor| reference.num <= floor) {
            return false;
        }
        self.final_floor = Some(reference.num);
        true
    }

    fn admit_fork(&mut self, step: Step, reference: &BlockRef) -> bool {
        let admitted = match &mut self.fork {
            ForkPosition::Open => true,
            ForkPosition::FromStart(start) => match step {
                Step::New => reference.num >= *start,
                // A rollback of something never emitted.
                Step::Undo => false,
                Step::Final => unreachable!("admit_fork is only called for New/Undo"),
            },
            ForkPosition::AfterNew(last) => match step {
                Step::New => {
                    if reference.num < last.num || *reference == *last {
                        false
                    } else if reference.num == last.num {
                        // Same height, different id, no UNDO in between: the
                        // replaying source no longer carries the undo edge.
                        warn!(
                            target: "firehose_stream",
                            expected = %last,
                            got = %reference,
                            "gate saw a sibling block with no interleaved undo, emitting it"
                        );
                        true
                    } else {
                        true
                    }
                }
                // Only rolling back the cursor block itself extends the
                // consumer's position.
                Step::Undo => *reference == *last,
                Step::Final => unreachable!("admit_fork is only called for New/Undo"),
            },
            ForkPosition::AfterUndo(undone, seen_matching) => match step {
                Step::New => {
                    if reference.num < undone.num {
                        false
                    } else if *reference == *undone {
                        // Before the matching undo replays, this is the
                        // original NEW of the undone block; after it, a redo.
                        *seen_matching
                    } else {
                        // The sibling continuing the chain after the undo.
                        reference.num == undone.num || *seen_matching
                    }
                }
                Step::Undo => {
                    if *reference == *undone && !*seen_matching {
                        *seen_matching = true;
                        false
                    } else {
                        // A deeper rollback the consumer has not seen yet.
                        *seen_matching && reference.num < undone.num
                    }
                }
                Step::Final => unreachable!("admit_fork is only called for New/Undo"),
            },
            ForkPosition::AfterHead(head) => match step {
                Step::New => {
                    if reference.num > head.num {
                        true
                    } else if reference.num == head.num && reference.id != head.id {
                        warn!(
                            target: "firehose_stream",
                            expected = %head,
                            got = %reference,
                            "gate saw a sibling of the cursor head with no interleaved undo, emitting it"
                        );
                        true
                    } else {
                        false
                    }
                }
                // Only an undo of the consumer's own head is news to it.
                Step::Undo => *reference == *head,
                Step::Final => unreachable!("admit_fork is only called for New/Undo"),
            },
        };
        if admitted {
            self.fork = ForkPosition::Open;
        }
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firehose_types::Cursor;

    fn r(num: u64, id: &str) -> BlockRef {
        BlockRef::new(num, id)
    }

    fn new_cursor(step: Step, block: BlockRef, head: BlockRef, last_final: BlockRef) -> Cursor {
        Cursor { step, block, head, last_final }
    }

    #[test]
    fn from_start_skips_below_start() {
        let mut gate = CursorGate::from_start(4);
        assert!(!gate.admits(Step::New, &r(3, "3a")));
        assert!(!gate.admits(Step::Final, &r(2, "2a")));
        assert!(gate.admits(Step::New, &r(4, "4a")));
        // Open: everything fork-shaped flows now.
        assert!(gate.admits(Step::Undo, &r(4, "4a")));
        assert!(gate.admits(Step::Final, &r(4, "4b")));
    }

    #[test]
    fn final_floor_is_monotone() {
        let mut gate = CursorGate::from_start(0);
        assert!(gate.admits(Step::Final, &r(0, "0a")));
        assert!(gate.admits(Step::Final, &r(1, "1a")));
        assert!(!gate.admits(Step::Final, &r(1, "1a")));
        assert!(!gate.admits(Step::Final, &r(0, "0a")));
        assert!(gate.admits(Step::Final, &r(2, "2a")));
    }

    #[test]
    fn new_cursor_replay_is_deduplicated() {
        let cursor = new_cursor(Step::New, r(5, "5a"), r(5, "5a"), r(3, "3a"));
        let mut gate = CursorGate::from_cursor(&cursor);

        // Replay of what the consumer already has.
        assert!(!gate.admits(Step::New, &r(4, "4a")));
        assert!(!gate.admits(Step::New, &r(5, "5a")));
        assert!(!gate.admits(Step::Final, &r(3, "3a")));
        // The continuation.
        assert!(gate.admits(Step::Final, &r(4, "4a")));
        assert!(gate.admits(Step::New, &r(6, "6a")));
    }

    #[test]
    fn new_cursor_admits_undo_of_cursor_block() {
        let cursor = new_cursor(Step::New, r(5, "5a"), r(5, "5a"), r(3, "3a"));
        let mut gate = CursorGate::from_cursor(&cursor);

        assert!(!gate.admits(Step::New, &r(5, "5a")));
        assert!(!gate.admits(Step::Undo, &r(6, "6x")));
        assert!(gate.admits(Step::Undo, &r(5, "5a")));
        assert!(gate.admits(Step::New, &r(5, "5b")));
    }

    #[test]
    fn undo_cursor_resumes_on_sibling_exactly_once() {
        // Stream history: NEW 5a, NEW 6a, UNDO 6a; client resumes after the
        // undo. Replay must surface only NEW 6b.
        let cursor = new_cursor(Step::Undo, r(6, "6a"), r(6, "6a"), r(4, "4a"));
        let mut gate = CursorGate::from_cursor(&cursor);

        assert!(!gate.admits(Step::New, &r(5, "5a")));
        assert!(!gate.admits(Step::New, &r(6, "6a"))); // original NEW of the undone block
        assert!(!gate.admits(Step::Undo, &r(6, "6a"))); // the undo the client already has
        assert!(gate.admits(Step::New, &r(6, "6b"))); // exactly once
        assert!(gate.admits(Step::New, &r(7, "7b")));
    }

    #[test]
    fn undo_cursor_admits_sibling_without_replayed_undo() {
        // A file-backed resume: merged blocks never replay the undo edge,
        // the canonical sibling arrives directly.
        let cursor = new_cursor(Step::Undo, r(6, "6a"), r(6, "6a"), r(4, "4a"));
        let mut gate = CursorGate::from_cursor(&cursor);

        assert!(!gate.admits(Step::New, &r(5, "5a")));
        assert!(gate.admits(Step::New, &r(6, "6b")));
    }

    #[test]
    fn undo_cursor_admits_deeper_rollback() {
        let cursor = new_cursor(Step::Undo, r(6, "6a"), r(6, "6a"), r(4, "4a"));
        let mut gate = CursorGate::from_cursor(&cursor);

        assert!(!gate.admits(Step::Undo, &r(6, "6a")));
        assert!(gate.admits(Step::Undo, &r(5, "5a")));
    }

    #[test]
    fn final_cursor_resumes_past_head() {
        // History: NEW 5a, NEW 6a, UNDO 6a, NEW 6b, FINAL 5a (cursor, head 6b).
        let cursor = new_cursor(Step::Final, r(5, "5a"), r(6, "6b"), r(5, "5a"));
        let mut gate = CursorGate::from_cursor(&cursor);

        assert!(!gate.admits(Step::New, &r(5, "5a")));
        assert!(!gate.admits(Step::New, &r(6, "6a")));
        assert!(!gate.admits(Step::Undo, &r(6, "6a"))); // pre-cursor churn
        assert!(!gate.admits(Step::New, &r(6, "6b"))); // the head itself
        assert!(!gate.admits(Step::Final, &r(5, "5a")));
        assert!(gate.admits(Step::New, &r(7, "7b")));
    }

    #[test]
    fn final_cursor_admits_undo_of_head() {
        let cursor = new_cursor(Step::Final, r(5, "5a"), r(6, "6b"), r(5, "5a"));
        let mut gate = CursorGate::from_cursor(&cursor);

        assert!(gate.admits(Step::Undo, &r(6, "6b")));
        assert!(gate.admits(Step::New, &r(6, "6c")));
    }

    #[test]
    fn handover_deduplicates_live_replay() {
        // File part emitted NEW up to 3, FINAL up to 1; hub replays from 2.
        let mut gate = CursorGate::handover(r(3, "3a"), Some(1));

        assert!(!gate.admits(Step::New, &r(2, "2a")));
        assert!(!gate.admits(Step::New, &r(3, "3a")));
        assert!(!gate.admits(Step::Final, &r(1, "1a")));
        assert!(gate.admits(Step::Final, &r(2, "2a")));
        assert!(gate.admits(Step::New, &r(4, "4a")));
    }
}
