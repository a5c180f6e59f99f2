//! The consumed live-hub interface.
//!
//! The hub maintains a sliding window of recent blocks with fork resolution
//! and is implemented elsewhere; the pipeline only consumes this contract.

use firehose_types::{Block, BlockRef, Step};
use tokio::sync::mpsc;

/// One fork-lifecycle emission from the hub.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveEvent {
    /// Lifecycle step the hub assigned. The hub is responsible for UNDO
    /// edges on reorganizations and NEW/FINAL otherwise.
    pub step: Step,
    /// The block the step applies to.
    pub block: Block,
    /// The hub's head when the event was produced.
    pub head: BlockRef,
}

/// What a subscription receives: events, or the terminal lag marker the hub
/// leaves behind when it drops a subscriber that cannot keep up.
#[derive(Debug, Clone, PartialEq)]
pub enum HubDelivery {
    /// A fork-lifecycle event.
    Event(LiveEvent),
    /// The hub dropped this subscription; `dropped` events were lost.
    Lagged {
        /// Number of events lost before the drop.
        dropped: u64,
    },
}

/// A per-consumer subscription to the hub.
///
/// On subscription the hub replays its current window from the lowest
/// retained block, in fork-lifecycle order, then continues with live
/// events. Each event is delivered at most once.
#[derive(Debug)]
pub struct HubSubscription {
    rx: mpsc::Receiver<HubDelivery>,
}

impl HubSubscription {
    /// Wraps the delivery channel handed out by a hub implementation.
    pub const fn new(rx: mpsc::Receiver<HubDelivery>) -> Self {
        Self { rx }
    }

    /// Next delivery; `None` when the hub side went away.
    pub async fn recv(&mut self) -> Option<HubDelivery> {
        self.rx.recv().await
    }
}

/// The fork-aware hub of recent blocks.
pub trait ForkableHub: Send + Sync {
    /// Lowest block number still retained in the window, if any.
    fn lowest_block_num(&self) -> Option<u64>;

    /// Current head block number, if the hub has seen one.
    fn head_block_num(&self) -> Option<u64>;

    /// Point lookup inside the window. An empty `id` means "whatever block
    /// this hub considers canonical at that height".
    fn get_block(&self, num: u64, id: &str) -> Option<Block>;

    /// Opens a subscription with the given delivery buffer. A consumer that
    /// falls more than `buffer` events behind is dropped with
    /// [`HubDelivery::Lagged`].
    fn subscribe(&self, buffer: usize) -> HubSubscription;
}
