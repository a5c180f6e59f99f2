//! End-to-end scenarios for the joining stream.

use crate::{
    testing::{
        assert_final_only, assert_lifecycle, live_event, seed_merged_bundles, test_block,
        TestCodec, TestHub,
    },
    ForkableHub, StreamConfig, StreamError, StreamEvent, StreamFactory, StreamRequest,
};
use firehose_store::{BlobStore, MemoryBlobStore};
use firehose_types::{Block, BlockRef, Cursor, Step};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

fn factory(merged: MemoryBlobStore, hub: Option<Arc<TestHub>>) -> StreamFactory {
    StreamFactory::new(
        Arc::new(merged) as Arc<dyn BlobStore>,
        Vec::new(),
        hub.map(|hub| hub as Arc<dyn ForkableHub>),
        Arc::new(TestCodec),
        StreamConfig::default(),
    )
}

struct Running {
    rx: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
    handle: JoinHandle<Result<(), StreamError>>,
}

fn start(factory: &StreamFactory, request: StreamRequest) -> Running {
    let cancel = CancellationToken::new();
    let (stream, rx) = factory.new_stream(request, cancel.clone());
    let handle = tokio::spawn(stream.run());
    Running { rx, cancel, handle }
}

/// Drains a bounded stream to completion.
async fn run_to_end(factory: &StreamFactory, request: StreamRequest) -> (Vec<StreamEvent>, Result<(), StreamError>) {
    let mut running = start(factory, request);
    let mut events = Vec::new();
    while let Some(event) = running.rx.recv().await {
        events.push(event);
    }
    (events, running.handle.await.expect("stream task panicked"))
}

/// Takes `n` events from an unbounded stream, then tears it down.
async fn take_n(factory: &StreamFactory, request: StreamRequest, n: usize) -> Vec<StreamEvent> {
    let mut running = start(factory, request);
    let mut events = Vec::with_capacity(n);
    while events.len() < n {
        let event = running.rx.recv().await.expect("stream ended early");
        events.push(event);
    }
    running.cancel.cancel();
    let _ = running.handle.await;
    events
}

fn steps(events: &[StreamEvent]) -> Vec<(Step, u64)> {
    events.iter().map(|event| (event.step, event.block_ref().num)).collect()
}

/// Blocks `from..=to` where each block finalizes its parent.
fn tightly_final_chain(from: u64, to: u64) -> Vec<Block> {
    (from..=to)
        .map(|num| {
            test_block(
                num,
                &format!("{num}a"),
                &format!("{}a", num - 1),
                num - 1,
                &format!("{}a", num - 1),
            )
        })
        .collect()
}

/// Blocks `from..=to` with finality pinned at genesis, so no FINAL step
/// interleaves with the NEW sequence.
fn loose_chain(from: u64, to: u64) -> Vec<Block> {
    (from..=to)
        .map(|num| test_block(num, &format!("{num}a"), &format!("{}a", num - 1), 0, "0a"))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn file_only_range_emits_news_and_lagging_finals() {
    let store = MemoryBlobStore::new();
    seed_merged_bundles(&store, &tightly_final_chain(2, 5));
    let factory = factory(store, None);

    let (events, outcome) = run_to_end(
        &factory,
        StreamRequest { start_block_num: 2, stop_block_num: 4, ..Default::default() },
    )
    .await;

    outcome.expect("stop block is a clean end");
    assert_eq!(
        steps(&events),
        vec![
            (Step::New, 2),
            (Step::New, 3),
            (Step::Final, 2),
            (Step::New, 4),
            (Step::Final, 3),
        ]
    );
    assert_lifecycle(&events);
}

#[tokio::test(start_paused = true)]
async fn file_to_live_handover_has_no_gap_and_no_duplicate() {
    let store = MemoryBlobStore::new();
    seed_merged_bundles(&store, &loose_chain(2, 5));

    let hub = Arc::new(TestHub::new(4, BlockRef::new(7, "7a")));
    for num in 4..=7u64 {
        let block = test_block(num, &format!("{num}a"), &format!("{}a", num - 1), 0, "0a");
        hub.push_window(live_event(Step::New, block, BlockRef::new(7, "7a")));
    }

    let factory = factory(store, Some(hub));
    let events = take_n(
        &factory,
        StreamRequest { start_block_num: 2, ..Default::default() },
        6,
    )
    .await;

    assert_eq!(
        steps(&events),
        vec![
            (Step::New, 2),
            (Step::New, 3),
            (Step::New, 4),
            (Step::New, 5),
            (Step::New, 6),
            (Step::New, 7),
        ]
    );
    assert_lifecycle(&events);
}

#[tokio::test(start_paused = true)]
async fn handover_tie_break_prefers_the_hub_variant() {
    let store = MemoryBlobStore::new();
    let mut blocks = loose_chain(2, 3);
    // The file tier carries a stale sibling at the boundary height.
    blocks.push(test_block(4, "4x", "3a", 0, "0a"));
    seed_merged_bundles(&store, &blocks);

    let hub = Arc::new(TestHub::new(4, BlockRef::new(5, "5a")));
    for (num, id, parent) in [(4u64, "4a", "3a"), (5, "5a", "4a")] {
        let block = test_block(num, id, parent, 0, "0a");
        hub.push_window(live_event(Step::New, block, BlockRef::new(5, "5a")));
    }

    let factory = factory(store, Some(hub));
    let events = take_n(
        &factory,
        StreamRequest { start_block_num: 2, ..Default::default() },
        4,
    )
    .await;

    let ids: Vec<String> = events.iter().map(|event| event.block_ref().id.clone()).collect();
    assert_eq!(ids, vec!["2a", "3a", "4a", "5a"]);
}

#[tokio::test(start_paused = true)]
async fn resume_after_undo_surfaces_the_sibling_exactly_once() {
    let hub = Arc::new(TestHub::new(4, BlockRef::new(6, "6b")));
    let head = BlockRef::new(6, "6b");
    let b4 = test_block(4, "4a", "3a", 2, "2a");
    let b5 = test_block(5, "5a", "4a", 3, "3a");
    let b6a = test_block(6, "6a", "5a", 4, "4a");
    let b6b = test_block(6, "6b", "5a", 4, "4a");
    let b7b = test_block(7, "7b", "6b", 4, "4a");
    hub.push_window(live_event(Step::New, b4, head.clone()));
    hub.push_window(live_event(Step::New, b5, head.clone()));
    hub.push_window(live_event(Step::New, b6a.clone(), head.clone()));
    hub.push_window(live_event(Step::Undo, b6a, head.clone()));
    hub.push_window(live_event(Step::New, b6b, head.clone()));
    hub.push_window(live_event(Step::New, b7b, head.clone()));

    let cursor = Cursor {
        step: Step::Undo,
        block: BlockRef::new(6, "6a"),
        head: BlockRef::new(6, "6a"),
        last_final: BlockRef::new(4, "4a"),
    };
    let factory = factory(MemoryBlobStore::new(), Some(hub));
    let events = take_n(
        &factory,
        StreamRequest { cursor: Some(cursor), ..Default::default() },
        2,
    )
    .await;

    assert_eq!(steps(&events), vec![(Step::New, 6), (Step::New, 7)]);
    assert_eq!(events[0].block_ref().id, "6b");
    assert_eq!(events[1].block_ref().id, "7b");
}

#[tokio::test(start_paused = true)]
async fn final_only_hides_the_reorg() {
    let hub = Arc::new(TestHub::new(5, BlockRef::new(6, "6b")));
    let head = BlockRef::new(6, "6b");
    let b5 = test_block(5, "5a", "4a", 3, "3a");
    let b6a = test_block(6, "6a", "5a", 4, "4a");
    let b6b = test_block(6, "6b", "5a", 5, "5a");
    hub.push_window(live_event(Step::New, b5.clone(), head.clone()));
    hub.push_window(live_event(Step::New, b6a.clone(), head.clone()));
    hub.push_window(live_event(Step::Undo, b6a, head.clone()));
    hub.push_window(live_event(Step::New, b6b.clone(), head.clone()));
    hub.push_window(live_event(Step::Final, b5, head.clone()));
    hub.push_window(live_event(Step::Final, b6b, head.clone()));

    let factory = factory(MemoryBlobStore::new(), Some(hub));
    let events = take_n(
        &factory,
        StreamRequest { start_block_num: 5, final_blocks_only: true, ..Default::default() },
        2,
    )
    .await;

    assert_eq!(steps(&events), vec![(Step::Final, 5), (Step::Final, 6)]);
    assert_eq!(events[1].block_ref().id, "6b");
    assert_final_only(&events);
}

#[tokio::test(start_paused = true)]
async fn every_cursor_resumes_into_the_exact_suffix() {
    let store = MemoryBlobStore::new();
    seed_merged_bundles(&store, &tightly_final_chain(2, 14));
    let factory = factory(store, None);

    let (full, outcome) = run_to_end(
        &factory,
        StreamRequest { start_block_num: 3, stop_block_num: 12, ..Default::default() },
    )
    .await;
    outcome.expect("bounded run completes");
    assert_lifecycle(&full);

    for cut in 0..full.len() {
        let cursor = full[cut].cursor.clone();
        // The opaque form is what clients hold; round-trip it like one.
        let cursor = Cursor::from_opaque(&cursor.to_opaque()).expect("emitted cursors decode");

        let (resumed, outcome) = run_to_end(
            &factory,
            StreamRequest {
                cursor: Some(cursor),
                stop_block_num: 12,
                ..Default::default()
            },
        )
        .await;
        outcome.unwrap_or_else(|err| panic!("resume at {cut} failed: {err}"));
        assert_eq!(
            resumed,
            full[cut + 1..].to_vec(),
            "resume at index {cut} diverged from the original run"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn negative_start_without_hub_fails_fast() {
    let factory = factory(MemoryBlobStore::new(), None);
    let (events, outcome) = run_to_end(
        &factory,
        StreamRequest { start_block_num: -10, ..Default::default() },
    )
    .await;

    assert!(events.is_empty());
    assert!(matches!(outcome, Err(StreamError::InvalidArgument(_))));
}

#[tokio::test(start_paused = true)]
async fn negative_start_resolves_against_the_live_head() {
    let hub = Arc::new(TestHub::new(88, BlockRef::new(93, "93a")));
    for num in 90..=93u64 {
        let block = test_block(
            num,
            &format!("{num}a"),
            &format!("{}a", num - 1),
            num - 2,
            &format!("{}a", num - 2),
        );
        hub.push_window(live_event(Step::New, block, BlockRef::new(93, "93a")));
    }

    let factory = factory(MemoryBlobStore::new(), Some(hub));
    let events = take_n(
        &factory,
        StreamRequest { start_block_num: -3, ..Default::default() },
        4,
    )
    .await;

    assert_eq!(
        steps(&events),
        vec![(Step::New, 90), (Step::New, 91), (Step::New, 92), (Step::New, 93)]
    );
}

#[tokio::test(start_paused = true)]
async fn lagging_subscription_is_surfaced() {
    let hub = Arc::new(TestHub::new(5, BlockRef::new(6, "6a")));
    hub.push_window(live_event(
        Step::New,
        test_block(5, "5a", "4a", 3, "3a"),
        BlockRef::new(5, "5a"),
    ));
    hub.push_window(live_event(
        Step::New,
        test_block(6, "6a", "5a", 4, "4a"),
        BlockRef::new(6, "6a"),
    ));
    hub.lag_after(1);

    let factory = factory(MemoryBlobStore::new(), Some(hub));
    let mut running = start(
        &factory,
        StreamRequest { start_block_num: 5, ..Default::default() },
    );

    assert_eq!(running.rx.recv().await.expect("first event").block_ref().num, 5);
    assert!(running.rx.recv().await.is_none());
    assert!(matches!(
        running.handle.await.expect("stream task"),
        Err(StreamError::SubscriptionLagging)
    ));
}

#[tokio::test(start_paused = true)]
async fn start_below_lowest_available_is_not_found() {
    // The hub window starts at 500 and the archive has no bundles at all:
    // the requested range is gone.
    let hub = Arc::new(TestHub::new(500, BlockRef::new(700, "700a")));
    let factory = factory(MemoryBlobStore::new(), Some(hub));

    let (events, outcome) = run_to_end(
        &factory,
        StreamRequest { start_block_num: 2, ..Default::default() },
    )
    .await;

    assert!(events.is_empty());
    assert!(matches!(outcome, Err(StreamError::NotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn cancellation_tears_the_stream_down() {
    let store = MemoryBlobStore::new();
    seed_merged_bundles(&store, &tightly_final_chain(2, 5));
    let factory = factory(store, None);

    let mut running = start(
        &factory,
        StreamRequest { start_block_num: 2, ..Default::default() },
    );
    let first = running.rx.recv().await.expect("first event");
    assert_eq!(first.block_ref().num, 2);

    running.cancel.cancel();
    let outcome = running.handle.await.expect("stream task");
    assert!(matches!(outcome, Err(StreamError::Cancelled)));
}
