//! The joining block stream.
//!
//! Drives one client stream through its lifecycle: resolve the start
//! position, stream from merged bundles, hand over to the live hub at the
//! boundary without gaps or duplicates, and terminate cleanly at the stop
//! block. All emissions flow through one [`Emitter`] so ordering and
//! fork-lifecycle invariants hold no matter which source produced them.

use crate::{
    BlockIndexProvider, BlockPreprocessor, CursorGate, EventPayload, FileSource, ForkableHub,
    HubDelivery, LiveEvent, PreparedBlock, StreamError, StreamEvent,
};
use firehose_store::{bundle_base, BlobStore};
use firehose_types::{Block, BlockDecoder, BlockRef, Cursor, Step};
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const FILE_CHANNEL_CAPACITY: usize = 32;
const HANDOVER_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Whether a stream keeps going after an emission.
enum Flow {
    Continue,
    Done,
}

/// How the file phase ended.
enum FilePhase {
    Done,
    Handover,
}

/// One client's joining stream. Owns its file source and live subscription;
/// both are released on termination, whatever the cause.
pub struct BlockStream {
    pub(crate) merged: Arc<dyn BlobStore>,
    pub(crate) secondaries: Vec<Arc<dyn BlobStore>>,
    pub(crate) hub: Option<Arc<dyn ForkableHub>>,
    pub(crate) decoder: Arc<dyn BlockDecoder>,
    pub(crate) preprocessor: Option<Arc<dyn BlockPreprocessor>>,
    pub(crate) index_provider: Option<Arc<dyn BlockIndexProvider>>,
    pub(crate) start_block_num: i64,
    pub(crate) stop_block_num: u64,
    pub(crate) cursor: Option<Cursor>,
    pub(crate) final_blocks_only: bool,
    pub(crate) preproc_threads: usize,
    pub(crate) live_buffer: usize,
    pub(crate) finality_safety_margin: u64,
    pub(crate) tx: mpsc::Sender<StreamEvent>,
    pub(crate) cancel: CancellationToken,
}

impl std::fmt::Debug for BlockStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStream")
            .field("start_block_num", &self.start_block_num)
            .field("stop_block_num", &self.stop_block_num)
            .field("final_blocks_only", &self.final_blocks_only)
            .finish_non_exhaustive()
    }
}

impl BlockStream {
    /// Runs the stream to completion.
    ///
    /// `Ok(())` means the stop block was reached and fully emitted; every
    /// other termination is an error, including cancellation.
    pub async fn run(self) -> Result<(), StreamError> {
        let result = self.execute().await;
        match &result {
            Ok(()) => info!(target: "firehose_stream", "stream reached its stop block"),
            Err(err) => debug!(target: "firehose_stream", %err, "stream terminated"),
        }
        result
    }

    async fn execute(self) -> Result<(), StreamError> {
        let (start, gate) = match &self.cursor {
            Some(cursor) => (cursor.last_final.num, CursorGate::from_cursor(cursor)),
            None => {
                let start = resolve_start(self.start_block_num, self.hub.as_deref())?;
                (start, CursorGate::from_start(start))
            }
        };
        if self.stop_block_num > 0 && start > self.stop_block_num {
            return Err(StreamError::InvalidArgument(format!(
                "start block {start} is beyond stop block {}",
                self.stop_block_num
            )));
        }

        let mut emitter = Emitter {
            tx: self.tx.clone(),
            stop: self.stop_block_num,
            final_only: self.final_blocks_only,
            gate,
            pending_finals: VecDeque::new(),
            last_emitted_new: None,
            final_head: self.cursor.as_ref().map(|cursor| cursor.last_final.clone()),
        };

        let live_directly = self
            .hub
            .as_ref()
            .and_then(|hub| hub.lowest_block_num())
            .is_some_and(|lowest| start >= lowest);

        if !live_directly {
            info!(target: "firehose_stream", start, "starting from merged bundles");
            match self.run_file_phase(start, &mut emitter).await? {
                FilePhase::Done => return Ok(()),
                FilePhase::Handover => {}
            }
        }

        // Handover: the live replay covers the boundary backlog; a fresh
        // gate at the last emitted position deduplicates it. A still-closed
        // gate means the consumer's cursor position was not reached in the
        // file phase, so that gate keeps filtering the live replay instead.
        if !self.final_blocks_only && emitter.gate.is_open() {
            if let Some(last_new) = emitter.last_emitted_new.clone() {
                emitter.gate = CursorGate::handover(last_new, emitter.gate.final_floor());
            }
        }
        info!(target: "firehose_stream", "following the live hub");
        self.run_live_phase(&mut emitter).await
    }

    async fn run_file_phase(
        &self,
        start: u64,
        emitter: &mut Emitter,
    ) -> Result<FilePhase, StreamError> {
        let (file_tx, mut file_rx) = mpsc::channel(FILE_CHANNEL_CAPACITY);
        let file_cancel = self.cancel.child_token();
        let _stop_source = file_cancel.clone().drop_guard();

        let mut source =
            FileSource::new(self.merged.clone(), self.decoder.clone(), start)
                .with_secondaries(self.secondaries.clone())
                .with_stop(self.stop_block_num)
                .with_preproc_threads(self.preproc_threads)
                .with_finality_safety_margin(self.finality_safety_margin);
        if let Some(hub) = &self.hub {
            source = source.with_hub(hub.clone());
        }
        if let Some(preprocessor) = &self.preprocessor {
            source = source.with_preprocessor(preprocessor.clone());
        }
        if let Some(provider) = &self.index_provider {
            source = source.with_index_provider(provider.clone());
        }
        tokio::spawn(source.run(file_tx, file_cancel.clone()));

        let mut next_expected = start;
        let mut poll = tokio::time::interval(HANDOVER_POLL_INTERVAL);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(StreamError::Cancelled),
                delivery = file_rx.recv() => match delivery {
                    Some(Ok(prepared)) => {
                        if let Some(hub_block) = self.hub_block_at(prepared.block.num()) {
                            if hub_block.id() != prepared.block.id() {
                                // Hub wins at the boundary; never silently
                                // overwrite with the file variant.
                                warn!(
                                    target: "firehose_stream",
                                    file_block = %prepared.block.reference,
                                    hub_block = %hub_block.reference,
                                    "file and hub disagree at the handover boundary, dropping file variant"
                                );
                            }
                            return Ok(FilePhase::Handover);
                        }
                        next_expected = prepared.block.num() + 1;
                        match emitter.emit_file_block(prepared).await? {
                            Flow::Done => return Ok(FilePhase::Done),
                            Flow::Continue => {}
                        }
                    }
                    Some(Err(err)) => return Err(self.map_file_error(err, start)),
                    None => {
                        return Err(StreamError::Internal("file source ended unexpectedly".to_string()));
                    }
                },
                _ = poll.tick() => {
                    // The walk may be stalled at the tip while the hub has
                    // caught up with the boundary.
                    if self.hub_block_at(next_expected).is_some() {
                        return Ok(FilePhase::Handover);
                    }
                }
            }
        }
    }

    async fn run_live_phase(&self, emitter: &mut Emitter) -> Result<(), StreamError> {
        let Some(hub) = &self.hub else {
            return Err(StreamError::Internal("live phase without a hub".to_string()));
        };
        let mut subscription = hub.subscribe(self.live_buffer);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(StreamError::Cancelled),
                delivery = subscription.recv() => match delivery {
                    Some(HubDelivery::Event(event)) => match emitter.emit_live_event(event).await? {
                        Flow::Done => return Ok(()),
                        Flow::Continue => {}
                    },
                    Some(HubDelivery::Lagged { dropped }) => {
                        warn!(target: "firehose_stream", dropped, "hub dropped the subscription");
                        return Err(StreamError::SubscriptionLagging);
                    }
                    None => return Err(StreamError::LiveSourceClosed),
                },
            }
        }
    }

    /// The hub's canonical block at `num`, when its window covers it.
    fn hub_block_at(&self, num: u64) -> Option<Block> {
        let hub = self.hub.as_ref()?;
        if hub.lowest_block_num()? > num {
            return None;
        }
        hub.get_block(num, "")
    }

    /// A hole at the very first bundle means the request starts below the
    /// lowest block still available.
    fn map_file_error(&self, err: StreamError, start: u64) -> StreamError {
        match err {
            StreamError::BundleHole { base } if base == bundle_base(start) => {
                StreamError::NotFound(format!("start block {start} is below the lowest available block"))
            }
            other => other,
        }
    }
}

fn resolve_start(start_block_num: i64, hub: Option<&dyn ForkableHub>) -> Result<u64, StreamError> {
    if start_block_num >= 0 {
        return Ok(start_block_num as u64);
    }
    let offset = start_block_num.unsigned_abs();
    let hub = hub.ok_or_else(|| {
        StreamError::InvalidArgument(
            "negative start block requires a live source, none is configured".to_string(),
        )
    })?;
    let head = hub.head_block_num().ok_or_else(|| {
        StreamError::InvalidArgument("negative start block with no live head available".to_string())
    })?;
    Ok(head.saturating_sub(offset))
}

/// Serializes every emission of one stream and enforces its lifecycle:
/// the resumption gate, NEW ordering, lagging FINAL derivation for
/// file-sourced blocks and the stop-block rule.
struct Emitter {
    tx: mpsc::Sender<StreamEvent>,
    stop: u64,
    final_only: bool,
    gate: CursorGate,
    /// File-sourced blocks whose NEW position passed but whose FINAL has
    /// not been reached yet.
    pending_finals: VecDeque<PreparedBlock>,
    last_emitted_new: Option<BlockRef>,
    /// The final position already emitted to the consumer. Cursors carry
    /// this, not a block's own declared final ref: a resumed stream must
    /// re-emit exactly the FINALs the consumer has not seen.
    final_head: Option<BlockRef>,
}

impl Emitter {
    async fn send(
        &self,
        step: Step,
        cursor: Cursor,
        payload: EventPayload,
    ) -> Result<(), StreamError> {
        self.tx
            .send(StreamEvent { step, cursor, payload })
            .await
            .map_err(|_| StreamError::ConsumerGone)
    }

    /// Merged bundles carry final blocks: each one is NEW at its position
    /// and drives the lagging FINAL emission through its `last_final` ref.
    async fn emit_file_block(&mut self, prepared: PreparedBlock) -> Result<Flow, StreamError> {
        let reference = prepared.block.reference.clone();
        if self.stop > 0 && reference.num > self.stop {
            return Ok(Flow::Done);
        }

        if self.final_only {
            if self.gate.admits(Step::Final, &reference) {
                let cursor = final_cursor(&reference, &reference);
                self.send(Step::Final, cursor, payload_of(prepared)).await?;
            }
            if self.stop > 0 && reference.num == self.stop {
                return Ok(Flow::Done);
            }
            return Ok(Flow::Continue);
        }

        let last_final = prepared.block.last_final.clone();
        if self.final_head.is_none() {
            // Nothing finalized by this stream yet: the consumer's final
            // position is just below the first block it sees.
            self.final_head = Some(prepared.block.parent.clone());
        }
        if self.gate.admits(Step::New, &reference) {
            let cursor = Cursor {
                step: Step::New,
                block: reference.clone(),
                head: reference.clone(),
                last_final: self.emitted_final_head(),
            };
            self.send(Step::New, cursor, payload_of(prepared.clone())).await?;
        }
        // The fork position advances past this block even when the gate
        // skipped it: the consumer already holds it.
        self.last_emitted_new = Some(reference.clone());
        self.pending_finals.push_back(prepared);

        while self
            .pending_finals
            .front()
            .is_some_and(|pending| pending.block.num() <= last_final.num)
        {
            let pending = self.pending_finals.pop_front().expect("front checked");
            let final_ref = pending.block.reference.clone();
            if self.gate.admits(Step::Final, &final_ref) {
                self.final_head = Some(final_ref.clone());
                let cursor = final_cursor(&final_ref, &reference);
                self.send(Step::Final, cursor, payload_of(pending)).await?;
            }
        }

        if self.stop > 0 && reference.num == self.stop {
            return Ok(Flow::Done);
        }
        Ok(Flow::Continue)
    }

    /// The hub assigns steps itself; the emitter gates, projects and
    /// forwards with cursors built from `{head, block.last_final}`.
    async fn emit_live_event(&mut self, event: LiveEvent) -> Result<Flow, StreamError> {
        let reference = event.block.reference.clone();
        if self.stop > 0 && reference.num > self.stop {
            return Ok(Flow::Done);
        }

        if self.final_only {
            if event.step == Step::Final && self.gate.admits(Step::Final, &reference) {
                let cursor = final_cursor(&reference, &event.head);
                self.send(Step::Final, cursor, EventPayload::Block(event.block)).await?;
                if self.stop > 0 && reference.num == self.stop {
                    return Ok(Flow::Done);
                }
            }
            return Ok(Flow::Continue);
        }

        match event.step {
            Step::New => {
                if self.final_head.is_none() {
                    self.final_head = Some(event.block.parent.clone());
                }
                if self.gate.admits(Step::New, &reference) {
                    let cursor = Cursor {
                        step: Step::New,
                        block: reference.clone(),
                        head: event.head.clone(),
                        last_final: self.emitted_final_head(),
                    };
                    self.send(Step::New, cursor, EventPayload::Block(event.block)).await?;
                }
                self.last_emitted_new = Some(reference);
            }
            Step::Undo => {
                if self.gate.admits(Step::Undo, &reference) {
                    let cursor = Cursor {
                        step: Step::Undo,
                        block: reference.clone(),
                        head: event.head.clone(),
                        last_final: self.emitted_final_head(),
                    };
                    self.send(Step::Undo, cursor, EventPayload::Tombstone(reference.clone()))
                        .await?;
                }
                self.last_emitted_new = Some(event.block.parent.clone());
            }
            Step::Final => {
                if self.gate.admits(Step::Final, &reference) {
                    self.final_head = Some(reference.clone());
                    let cursor = final_cursor(&reference, &event.head);
                    self.send(Step::Final, cursor, EventPayload::Block(event.block)).await?;
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// The consumer's current final position; callers ensure it is set
    /// before any fork event is emitted.
    fn emitted_final_head(&self) -> BlockRef {
        self.final_head.clone().unwrap_or_default()
    }
}

fn payload_of(prepared: PreparedBlock) -> EventPayload {
    match prepared.processed {
        Some(output) => EventPayload::Processed { block: prepared.block, output },
        None => EventPayload::Block(prepared.block),
    }
}

/// FINAL cursors sit on their own block: `block == last_final`.
fn final_cursor(block: &BlockRef, head: &BlockRef) -> Cursor {
    Cursor {
        step: Step::Final,
        block: block.clone(),
        head: head.clone(),
        last_final: block.clone(),
    }
}
