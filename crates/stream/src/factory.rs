//! Per-request stream construction.

use crate::{
    BlockIndexProvider, BlockPreprocessor, BlockStream, ForkableHub, StreamEvent,
};
use firehose_store::{BlobStore, BytesMeter};
use firehose_types::{BlockDecoder, Cursor};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Per-server stream tuning. Every default is explicit; nothing is
/// process-global.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Bundles decoded and preprocessed concurrently per stream.
    pub preproc_threads: usize,
    /// Capacity of the emitted-event channel; this bound is what stalls the
    /// pipeline when the wire is slow.
    pub channel_capacity: usize,
    /// Live subscription buffer before the hub declares the consumer
    /// lagging.
    pub live_buffer: usize,
    /// Extra blocks below the hub window before a missing bundle counts as
    /// a hole.
    pub finality_safety_margin: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            preproc_threads: 16,
            channel_capacity: 64,
            live_buffer: 250,
            finality_safety_margin: 100,
        }
    }
}

/// One stream request, after transport decoding and transform resolution.
#[derive(Default)]
pub struct StreamRequest {
    /// Positive: absolute. Zero: genesis. Negative: blocks below the live
    /// head, resolved at stream start.
    pub start_block_num: i64,
    /// Inclusive upper bound; `0` streams forever.
    pub stop_block_num: u64,
    /// Resumption cursor, already decoded.
    pub cursor: Option<Cursor>,
    /// Emit only FINAL steps.
    pub final_blocks_only: bool,
    /// Client-requested preprocessor, from the transform registry.
    pub preprocessor: Option<Arc<dyn BlockPreprocessor>>,
    /// Sparse bundle index, from the transform registry.
    pub index_provider: Option<Arc<dyn BlockIndexProvider>>,
    /// Per-request byte meter for scoped store views.
    pub meter: Option<BytesMeter>,
}

impl std::fmt::Debug for StreamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRequest")
            .field("start_block_num", &self.start_block_num)
            .field("stop_block_num", &self.stop_block_num)
            .field("cursor", &self.cursor)
            .field("final_blocks_only", &self.final_blocks_only)
            .field("preprocessor", &self.preprocessor.is_some())
            .field("index_provider", &self.index_provider.is_some())
            .finish()
    }
}

/// Builds [`BlockStream`]s over one set of stores and one hub.
///
/// Shared across all requests of a server; also handed to passthrough
/// transforms so they can spawn child streams.
#[derive(Clone)]
pub struct StreamFactory {
    merged: Arc<dyn BlobStore>,
    secondaries: Vec<Arc<dyn BlobStore>>,
    hub: Option<Arc<dyn ForkableHub>>,
    decoder: Arc<dyn BlockDecoder>,
    config: StreamConfig,
}

impl std::fmt::Debug for StreamFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamFactory")
            .field("secondaries", &self.secondaries.len())
            .field("hub", &self.hub.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StreamFactory {
    /// Creates a factory over the given stores and optional hub.
    pub fn new(
        merged: Arc<dyn BlobStore>,
        secondaries: Vec<Arc<dyn BlobStore>>,
        hub: Option<Arc<dyn ForkableHub>>,
        decoder: Arc<dyn BlockDecoder>,
        config: StreamConfig,
    ) -> Self {
        Self { merged, secondaries, hub, decoder, config }
    }

    /// The configured live hub, if any.
    pub fn hub(&self) -> Option<&Arc<dyn ForkableHub>> {
        self.hub.as_ref()
    }

    /// Assembles a stream for `request`. The caller drives
    /// [`BlockStream::run`] and drains the returned receiver; dropping
    /// either side tears the stream down.
    pub fn new_stream(
        &self,
        request: StreamRequest,
        cancel: CancellationToken,
    ) -> (BlockStream, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let stream = BlockStream {
            merged: scoped_or_shared(&self.merged, request.meter.as_ref()),
            secondaries: self
                .secondaries
                .iter()
                .map(|store| scoped_or_shared(store, request.meter.as_ref()))
                .collect(),
            hub: self.hub.clone(),
            decoder: self.decoder.clone(),
            preprocessor: request.preprocessor,
            index_provider: request.index_provider,
            start_block_num: request.start_block_num,
            stop_block_num: request.stop_block_num,
            cursor: request.cursor,
            final_blocks_only: request.final_blocks_only,
            preproc_threads: self.config.preproc_threads,
            live_buffer: self.config.live_buffer,
            finality_safety_margin: self.config.finality_safety_margin,
            tx,
            cancel,
        };
        (stream, rx)
    }
}

/// Per-request metered view when the driver supports scoping, the shared
/// handle otherwise.
pub(crate) fn scoped_or_shared(
    store: &Arc<dyn BlobStore>,
    meter: Option<&BytesMeter>,
) -> Arc<dyn BlobStore> {
    meter
        .and_then(|meter| store.scoped(meter.clone()))
        .unwrap_or_else(|| store.clone())
}
