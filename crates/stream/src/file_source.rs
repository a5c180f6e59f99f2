//! Historical source reading merged-block bundles from object storage.
//!
//! Bundles are walked forward from the one covering the start block. Up to
//! `preproc_threads` bundles are downloaded, decoded and preprocessed
//! concurrently, but blocks re-enter the stream strictly in ascending
//! block-number order through an in-order reassembly buffer.

use crate::{
    backoff::{READ_ATTEMPTS, READ_BASE_DELAY},
    BlockIndexProvider, BlockPreprocessor, ForkableHub, StreamError,
};
use firehose_store::{
    bundle_base, read_merged_bundle, BlobStore, StoreError, BUNDLE_SIZE,
};
use firehose_types::{Block, BlockDecoder};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// A decoded block with its optional preprocessor output, ready to emit.
#[derive(Debug, Clone)]
pub struct PreparedBlock {
    /// The decoded block.
    pub block: Block,
    /// Output of the client-requested preprocessor, when one is set.
    pub processed: Option<prost_types::Any>,
}

/// One bundle's worth of pipeline output.
enum Fetched {
    Ready(Vec<PreparedBlock>),
    Missing,
}

/// The merged-bundles walker.
pub struct FileSource {
    primary: Arc<dyn BlobStore>,
    secondaries: Vec<Arc<dyn BlobStore>>,
    decoder: Arc<dyn BlockDecoder>,
    preprocessor: Option<Arc<dyn BlockPreprocessor>>,
    index_provider: Option<Arc<dyn BlockIndexProvider>>,
    hub: Option<Arc<dyn ForkableHub>>,
    start: u64,
    stop: u64,
    preproc_threads: usize,
    finality_safety_margin: u64,
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("start", &self.start)
            .field("stop", &self.stop)
            .field("preproc_threads", &self.preproc_threads)
            .finish_non_exhaustive()
    }
}

impl FileSource {
    /// Creates a source walking forward from `start`.
    pub fn new(primary: Arc<dyn BlobStore>, decoder: Arc<dyn BlockDecoder>, start: u64) -> Self {
        Self {
            primary,
            secondaries: Vec::new(),
            decoder,
            preprocessor: None,
            index_provider: None,
            hub: None,
            start,
            stop: 0,
            preproc_threads: 1,
            finality_safety_margin: BUNDLE_SIZE,
        }
    }

    /// Stores consulted only when the primary lacks a bundle.
    pub fn with_secondaries(mut self, secondaries: Vec<Arc<dyn BlobStore>>) -> Self {
        self.secondaries = secondaries;
        self
    }

    /// Per-block preprocessor run inside the worker pool.
    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn BlockPreprocessor>) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    /// Sparse index used to skip bundles with no matching blocks.
    pub fn with_index_provider(mut self, provider: Arc<dyn BlockIndexProvider>) -> Self {
        self.index_provider = Some(provider);
        self
    }

    /// Hub used to detect holes: a bundle safely below the hub's window
    /// must exist, so its absence is fatal rather than "not yet produced".
    pub fn with_hub(mut self, hub: Arc<dyn ForkableHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Upper bound (inclusive); the walk never fetches bundles past it.
    pub const fn with_stop(mut self, stop: u64) -> Self {
        self.stop = stop;
        self
    }

    /// Extra blocks below the hub window before a missing bundle counts as
    /// a hole.
    pub const fn with_finality_safety_margin(mut self, margin: u64) -> Self {
        self.finality_safety_margin = margin;
        self
    }

    /// Number of bundles processed concurrently.
    pub fn with_preproc_threads(mut self, threads: usize) -> Self {
        self.preproc_threads = threads.max(1);
        self
    }

    /// Runs the walk, sending ordered blocks into `tx` until cancelled or
    /// failed. A terminal error is delivered through the channel.
    pub async fn run(
        self,
        tx: mpsc::Sender<Result<PreparedBlock, StreamError>>,
        cancel: CancellationToken,
    ) {
        if let Err(err) = self.walk(&tx, &cancel).await {
            // Best effort: the consumer may already be gone.
            let _ = tx.send(Err(err)).await;
        }
    }

    async fn walk(
        &self,
        tx: &mpsc::Sender<Result<PreparedBlock, StreamError>>,
        cancel: &CancellationToken,
    ) -> Result<(), StreamError> {
        let mut next_emit = bundle_base(self.start);
        let mut next_fetch = next_emit;
        let mut ready: BTreeMap<u64, Fetched> = BTreeMap::new();
        let mut tasks: JoinSet<(u64, Result<Fetched, StreamError>)> = JoinSet::new();
        let mut missing_retries: u32 = 0;

        loop {
            // Emit everything contiguous with the walk position.
            while let Some(fetched) = ready.remove(&next_emit) {
                match fetched {
                    Fetched::Ready(blocks) => {
                        for prepared in blocks {
                            if tx.send(Ok(prepared)).await.is_err() {
                                return Ok(());
                            }
                        }
                        missing_retries = 0;
                        next_emit += BUNDLE_SIZE;
                    }
                    Fetched::Missing => {
                        self.check_bundle_hole(next_emit)?;
                        missing_retries += 1;
                        if missing_retries == 1 || missing_retries % 16 == 0 {
                            debug!(
                                target: "firehose_stream",
                                base = next_emit,
                                retries = missing_retries,
                                "next bundle absent, polling"
                            );
                        }
                        self.spawn_fetch(&mut tasks, next_emit, poll_delay(missing_retries));
                        break;
                    }
                }
            }

            // Keep up to `preproc_threads` bundles in flight, bounded by the
            // stop block when the request is bounded.
            let mut horizon = next_emit.saturating_add(self.preproc_threads as u64 * BUNDLE_SIZE);
            if self.stop > 0 {
                horizon = horizon.min(bundle_base(self.stop) + BUNDLE_SIZE);
            }
            while next_fetch < horizon {
                self.spawn_fetch(&mut tasks, next_fetch, Duration::ZERO);
                next_fetch += BUNDLE_SIZE;
            }

            if tasks.is_empty() {
                // Bounded request fully fetched and emitted; idle until the
                // owner tears the source down.
                cancel.cancelled().await;
                return Ok(());
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                joined = tasks.join_next() => match joined {
                    Some(Ok((base, Ok(fetched)))) => {
                        ready.insert(base, fetched);
                    }
                    Some(Ok((_, Err(err)))) => return Err(err),
                    Some(Err(join_err)) => {
                        return Err(StreamError::Internal(format!("bundle worker died: {join_err}")));
                    }
                    None => unreachable!("join_next on a non-empty task set"),
                },
            }
        }
    }

    /// A bundle comfortably below the hub's retained window must exist in
    /// the archive; its absence is a hole, not eventual consistency.
    fn check_bundle_hole(&self, base: u64) -> Result<(), StreamError> {
        let Some(lowest) = self.hub.as_ref().and_then(|hub| hub.lowest_block_num()) else {
            return Ok(());
        };
        if base + BUNDLE_SIZE + self.finality_safety_margin <= lowest {
            warn!(
                target: "firehose_stream",
                base,
                hub_lowest = lowest,
                "merged bundle below the live window is missing from all stores"
            );
            return Err(StreamError::BundleHole { base });
        }
        Ok(())
    }

    fn spawn_fetch(
        &self,
        tasks: &mut JoinSet<(u64, Result<Fetched, StreamError>)>,
        base: u64,
        delay: Duration,
    ) {
        // Index fast path: a bundle reported as zero-match is never
        // downloaded at all.
        if let Some(matching) =
            self.index_provider.as_ref().and_then(|p| p.matching_blocks(base, BUNDLE_SIZE))
        {
            if matching.is_empty() {
                trace!(target: "firehose_stream", base, "index reports empty bundle, skipping");
                tasks.spawn(async move { (base, Ok(Fetched::Ready(Vec::new()))) });
                return;
            }
        }

        let mut stores = Vec::with_capacity(1 + self.secondaries.len());
        stores.push(self.primary.clone());
        stores.extend(self.secondaries.iter().cloned());
        let decoder = self.decoder.clone();
        let preprocessor = self.preprocessor.clone();
        let start = self.start;

        tasks.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            (base, fetch_bundle(stores, decoder, preprocessor, base, start).await)
        });
    }
}

async fn fetch_bundle(
    stores: Vec<Arc<dyn BlobStore>>,
    decoder: Arc<dyn BlockDecoder>,
    preprocessor: Option<Arc<dyn BlockPreprocessor>>,
    base: u64,
    start: u64,
) -> Result<Fetched, StreamError> {
    let Some(blocks) = read_bundle_from_any(&stores, decoder.as_ref(), base).await? else {
        return Ok(Fetched::Missing);
    };

    let mut prepared = Vec::with_capacity(blocks.len());
    for block in blocks {
        if block.num() < start {
            continue;
        }
        let processed = match &preprocessor {
            Some(preprocessor) => Some(preprocessor.preprocess(&block, None)?),
            None => None,
        };
        prepared.push(PreparedBlock { block, processed });
    }
    Ok(Fetched::Ready(prepared))
}

/// Primary first, secondaries only when the primary lacks the bundle.
/// Transient errors retried with bounded backoff; framing and codec errors
/// are fatal immediately.
async fn read_bundle_from_any(
    stores: &[Arc<dyn BlobStore>],
    decoder: &dyn BlockDecoder,
    base: u64,
) -> Result<Option<Vec<Block>>, StreamError> {
    for store in stores {
        let mut delay = READ_BASE_DELAY;
        let mut attempt = 0;
        loop {
            match read_merged_bundle(store.as_ref(), decoder, base).await {
                Ok(blocks) => return Ok(Some(blocks)),
                Err(err) if err.is_not_found() => break,
                Err(err @ StoreError::Blob(_)) => {
                    attempt += 1;
                    if attempt >= READ_ATTEMPTS {
                        return Err(err.into());
                    }
                    debug!(target: "firehose_stream", base, %err, attempt, "transient bundle read failure");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                // Truncated, unordered or undecodable bundles never heal.
                Err(err) => return Err(err.into()),
            }
        }
    }
    Ok(None)
}

fn poll_delay(retries: u32) -> Duration {
    let exp = retries.min(6);
    Duration::from_millis(50u64 << exp)
}
