//! Test support: a line-format block codec, chain fixtures and a scripted
//! hub standing in for the external fork-resolving collaborator.

use crate::{
    EventPayload, ForkableHub, HubDelivery, HubSubscription, LiveEvent, StreamEvent,
};
use bytes::Bytes;
use firehose_store::{bundle_base, encode_merged_bundle, one_block_key, MemoryBlobStore};
use firehose_types::{Block, BlockDecoder, BlockRef, DecodeError, Step};
use std::{
    collections::BTreeMap,
    sync::Mutex,
};
use tokio::sync::mpsc;

/// Type URL stamped on fixture payloads.
pub const TEST_PAYLOAD_TYPE: &str = "type.test/firehose.block";

/// Builds a fixture block. The parent number is derived, the payload is the
/// codec line so fixtures survive an encode/decode trip unchanged.
pub fn test_block(num: u64, id: &str, parent_id: &str, final_num: u64, final_id: &str) -> Block {
    let mut block = Block {
        reference: BlockRef::new(num, id),
        parent: BlockRef::new(num.saturating_sub(1), parent_id),
        last_final: BlockRef::new(final_num, final_id),
        timestamp_nanos: num * 1_000_000_000,
        payload_type: TEST_PAYLOAD_TYPE.to_string(),
        payload: Bytes::new(),
    };
    block.payload = encode_test_block(&block);
    block
}

/// A linear chain of fixture blocks covering `[from, to)`, ids `{num}a`,
/// each block finalizing two below itself.
pub fn test_chain(from: u64, to: u64) -> Vec<Block> {
    (from..to)
        .map(|num| {
            let final_num = num.saturating_sub(2);
            test_block(
                num,
                &format!("{num}a"),
                &format!("{}a", num.saturating_sub(1)),
                final_num,
                &format!("{final_num}a"),
            )
        })
        .collect()
}

/// Encodes a block in the fixture line format.
pub fn encode_test_block(block: &Block) -> Bytes {
    Bytes::from(format!(
        "{}:{}:{}:{}:{}",
        block.num(),
        block.id(),
        block.parent.id,
        block.last_final.num,
        block.last_final.id,
    ))
}

/// The fixture codec: `num:id:parent_id:final_num:final_id` per frame.
#[derive(Debug, Clone, Copy)]
pub struct TestCodec;

impl BlockDecoder for TestCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Block, DecodeError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| DecodeError::Malformed("frame is not utf-8".to_string()))?;
        let parts: Vec<&str> = text.split(':').collect();
        let [num, id, parent_id, final_num, final_id] = parts[..] else {
            return Err(DecodeError::Malformed(format!("bad frame {text:?}")));
        };
        let num: u64 =
            num.parse().map_err(|_| DecodeError::Malformed(format!("bad number in {text:?}")))?;
        let final_num: u64 = final_num
            .parse()
            .map_err(|_| DecodeError::Malformed(format!("bad final number in {text:?}")))?;
        Ok(test_block(num, id, parent_id, final_num, final_id))
    }
}

/// Seeds merged bundles covering `blocks` into an in-memory store.
pub fn seed_merged_bundles(store: &MemoryBlobStore, blocks: &[Block]) {
    let mut bundles: BTreeMap<u64, Vec<Bytes>> = BTreeMap::new();
    for block in blocks {
        bundles.entry(bundle_base(block.num())).or_default().push(encode_test_block(block));
    }
    for (base, frames) in bundles {
        store.set_object(&firehose_store::bundle_name(base), encode_merged_bundle(frames));
    }
}

/// Seeds a one-block (forked) file.
pub fn seed_one_block(store: &MemoryBlobStore, block: &Block) {
    store.set_object(&one_block_key(block.num(), block.id()), encode_test_block(block));
}

/// Shorthand for a hub emission.
pub fn live_event(step: Step, block: Block, head: BlockRef) -> LiveEvent {
    LiveEvent { step, block, head }
}

#[derive(Debug, Default)]
struct TestHubInner {
    lowest: Option<u64>,
    head: Option<BlockRef>,
    window: Vec<LiveEvent>,
    subscribers: Vec<mpsc::Sender<HubDelivery>>,
    lag_after: Option<usize>,
    delivered: usize,
}

/// A scripted in-memory hub.
///
/// Window events pushed before a subscription are replayed on subscribe;
/// events pushed after are delivered live, mirroring the real hub's
/// replay-then-follow contract.
#[derive(Debug, Default)]
pub struct TestHub {
    inner: Mutex<TestHubInner>,
}

impl TestHub {
    /// A hub with a window floor and head but no events yet.
    pub fn new(lowest: u64, head: BlockRef) -> Self {
        Self {
            inner: Mutex::new(TestHubInner {
                lowest: Some(lowest),
                head: Some(head),
                ..Default::default()
            }),
        }
    }

    /// A hub that has not seen any block yet.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Appends an event to the replayable window without delivering it.
    pub fn push_window(&self, event: LiveEvent) {
        let mut inner = self.inner.lock().expect("hub lock");
        inner.head = Some(event.head.clone());
        if inner.lowest.is_none() {
            inner.lowest = Some(event.block.num());
        }
        inner.window.push(event);
    }

    /// Appends an event and delivers it to live subscribers.
    pub fn push_live(&self, event: LiveEvent) {
        let mut inner = self.inner.lock().expect("hub lock");
        inner.head = Some(event.head.clone());
        if inner.lowest.is_none() {
            inner.lowest = Some(event.block.num());
        }
        inner.window.push(event.clone());

        let lagged = inner.lag_after.is_some_and(|limit| inner.delivered >= limit);
        if lagged {
            for tx in inner.subscribers.drain(..) {
                let _ = tx.try_send(HubDelivery::Lagged { dropped: 1 });
            }
            return;
        }
        inner.delivered += 1;
        inner.subscribers.retain(|tx| tx.try_send(HubDelivery::Event(event.clone())).is_ok());
    }

    /// Drops subscribers with a lag marker after `limit` deliveries.
    pub fn lag_after(&self, limit: usize) {
        self.inner.lock().expect("hub lock").lag_after = Some(limit);
    }
}

impl ForkableHub for TestHub {
    fn lowest_block_num(&self) -> Option<u64> {
        self.inner.lock().expect("hub lock").lowest
    }

    fn head_block_num(&self) -> Option<u64> {
        self.inner.lock().expect("hub lock").head.as_ref().map(|head| head.num)
    }

    fn get_block(&self, num: u64, id: &str) -> Option<Block> {
        let inner = self.inner.lock().expect("hub lock");
        for event in inner.window.iter().rev() {
            if event.block.num() != num {
                continue;
            }
            if !id.is_empty() {
                if event.block.id() == id {
                    return Some(event.block.clone());
                }
                continue;
            }
            // Canonical lookup: skip forks whose latest edge is an undo.
            match event.step {
                Step::Undo => continue,
                _ => return Some(event.block.clone()),
            }
        }
        None
    }

    fn subscribe(&self, buffer: usize) -> HubSubscription {
        let mut inner = self.inner.lock().expect("hub lock");
        // Room for the whole replay plus the live buffer, so the scripted
        // hub never blocks on a slow test consumer.
        let (tx, rx) = mpsc::channel(buffer.max(inner.window.len() + 1));
        let mut replayed = 0;
        for event in &inner.window {
            if inner.lag_after.is_some_and(|limit| replayed >= limit) {
                let _ = tx.try_send(HubDelivery::Lagged { dropped: 1 });
                return HubSubscription::new(rx);
            }
            replayed += 1;
            let _ = tx.try_send(HubDelivery::Event(event.clone()));
        }
        inner.delivered = replayed;
        inner.subscribers.push(tx);
        HubSubscription::new(rx)
    }
}

/// Asserts the fork-lifecycle invariants over an emitted sequence:
/// per-`(num, id)` the step sequence matches `NEW (UNDO NEW)* FINAL?` with
/// `FINAL` terminal, FINAL numbers are monotone, and directly adjacent NEW
/// events chain parent to child.
pub fn assert_lifecycle(events: &[StreamEvent]) {
    let mut per_block: BTreeMap<(u64, String), Vec<Step>> = BTreeMap::new();
    let mut last_final: Option<u64> = None;

    for event in events {
        let reference = event.block_ref().clone();
        let history = per_block.entry((reference.num, reference.id.clone())).or_default();
        match event.step {
            Step::New => assert!(
                history.is_empty() || history.last() == Some(&Step::Undo),
                "NEW {reference} after {history:?}"
            ),
            Step::Undo => assert_eq!(
                history.last(),
                Some(&Step::New),
                "UNDO {reference} without a live NEW"
            ),
            Step::Final => {
                assert!(
                    !history.contains(&Step::Final),
                    "second FINAL for {reference}"
                );
                assert!(
                    last_final.is_none_or(|previous| reference.num > previous),
                    "FINAL {reference} after FINAL at {last_final:?}"
                );
                last_final = Some(reference.num);
            }
        }
        history.push(event.step);
    }

    for (window, pair) in events.windows(2).enumerate() {
        let (left, right) = (&pair[0], &pair[1]);
        if left.step != Step::New || right.step != Step::New {
            continue;
        }
        let (Some(left_block), Some(right_block)) = (event_block(left), event_block(right)) else {
            continue;
        };
        assert_eq!(
            right_block.num(),
            left_block.num() + 1,
            "adjacent NEW events out of sequence at index {window}"
        );
        assert_eq!(
            right_block.parent, left_block.reference,
            "adjacent NEW events not parent-linked at index {window}"
        );
    }
}

/// Asserts a final-blocks-only emission: every step FINAL, numbers strictly
/// increasing.
pub fn assert_final_only(events: &[StreamEvent]) {
    let mut previous: Option<u64> = None;
    for event in events {
        assert_eq!(event.step, Step::Final, "non-FINAL event {:?}", event.block_ref());
        let num = event.block_ref().num;
        assert!(previous.is_none_or(|p| num > p), "FINAL numbers not increasing at {num}");
        previous = Some(num);
    }
}

fn event_block(event: &StreamEvent) -> Option<&Block> {
    match &event.payload {
        EventPayload::Block(block) | EventPayload::Processed { block, .. } => Some(block),
        EventPayload::Tombstone(_) => None,
    }
}
