//! Single-block lookup across the three storage tiers.

use crate::{backoff::READ_BASE_DELAY, factory::scoped_or_shared, ForkableHub, StreamError};
use firehose_store::{
    bundle_base, find_one_block, read_merged_bundle, BlobStore, BytesMeter, StoreError,
};
use firehose_types::{normalize_block_id, Block, BlockDecoder};
use std::sync::Arc;
use tracing::debug;

const MERGED_PROBE_ATTEMPTS: u32 = 3;

/// Resolves one `(num, id)` against the live hub, the merged-blocks store
/// and the forked-blocks store, in that tier order.
pub struct BlockGetter {
    hub: Option<Arc<dyn ForkableHub>>,
    merged: Arc<dyn BlobStore>,
    forked: Option<Arc<dyn BlobStore>>,
    decoder: Arc<dyn BlockDecoder>,
}

impl std::fmt::Debug for BlockGetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockGetter")
            .field("hub", &self.hub.is_some())
            .field("forked", &self.forked.is_some())
            .finish_non_exhaustive()
    }
}

impl BlockGetter {
    /// Creates a getter over the configured tiers.
    pub fn new(
        hub: Option<Arc<dyn ForkableHub>>,
        merged: Arc<dyn BlobStore>,
        forked: Option<Arc<dyn BlobStore>>,
        decoder: Arc<dyn BlockDecoder>,
    ) -> Self {
        Self { hub, merged, forked, decoder }
    }

    /// Looks the block up. An empty `id` means "whichever block the owning
    /// tier considers canonical at that height". `Ok(None)` is not-found.
    pub async fn get(
        &self,
        num: u64,
        id: &str,
        meter: Option<&BytesMeter>,
    ) -> Result<Option<Block>, StreamError> {
        let id = normalize_block_id(id);

        // Live tier. Above the hub's floor the hub is authoritative: a miss
        // there is final, archived tiers cannot have the block yet.
        if let Some(hub) = &self.hub {
            if let Some(lowest) = hub.lowest_block_num() {
                if num > lowest {
                    let found = hub.get_block(num, &id);
                    debug!(target: "firehose_stream", num, id, source = "hub", found = found.is_some(), "single block lookup");
                    return Ok(found);
                }
            }
        }

        // Merged tier.
        let merged = scoped_or_shared(&self.merged, meter);
        match self.probe_merged(merged.as_ref(), num, &id).await? {
            MergedProbe::Found(block) => {
                debug!(target: "firehose_stream", num, id, source = "merged_blocks", "single block lookup");
                return Ok(Some(block));
            }
            MergedProbe::Absent => {}
        }

        // Forked tier, exact `(num, id)` only.
        if let Some(forked) = &self.forked {
            let forked = scoped_or_shared(forked, meter);
            if let Some(block) =
                find_one_block(forked.as_ref(), self.decoder.as_ref(), num, &id).await?
            {
                debug!(target: "firehose_stream", num, id, source = "forked_blocks", "single block lookup");
                return Ok(Some(block));
            }
        }

        debug!(target: "firehose_stream", num, id, found = false, "single block lookup");
        Ok(None)
    }

    /// Up to three attempts on transient errors; a missing bundle or an id
    /// mismatch falls through to the forked tier.
    async fn probe_merged(
        &self,
        store: &dyn BlobStore,
        num: u64,
        id: &str,
    ) -> Result<MergedProbe, StreamError> {
        let mut delay = READ_BASE_DELAY;
        let mut attempt = 0;
        loop {
            match read_merged_bundle(store, self.decoder.as_ref(), bundle_base(num)).await {
                Ok(blocks) => {
                    let found = blocks
                        .into_iter()
                        .find(|block| block.num() == num && (id.is_empty() || block.id() == id));
                    return Ok(match found {
                        Some(block) => MergedProbe::Found(block),
                        None => MergedProbe::Absent,
                    });
                }
                Err(err) if err.is_not_found() => return Ok(MergedProbe::Absent),
                Err(err @ StoreError::Blob(_)) => {
                    attempt += 1;
                    if attempt >= MERGED_PROBE_ATTEMPTS {
                        return Err(err.into());
                    }
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

enum MergedProbe {
    Found(Block),
    Absent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        live_event, seed_merged_bundles, seed_one_block, test_block, TestCodec, TestHub,
    };
    use firehose_store::MemoryBlobStore;
    use firehose_types::{BlockRef, Step};

    fn getter(hub: Option<TestHub>, merged: MemoryBlobStore, forked: Option<MemoryBlobStore>) -> BlockGetter {
        BlockGetter::new(
            hub.map(|hub| Arc::new(hub) as Arc<dyn ForkableHub>),
            Arc::new(merged),
            forked.map(|store| Arc::new(store) as Arc<dyn BlobStore>),
            Arc::new(TestCodec),
        )
    }

    #[tokio::test]
    async fn hub_is_authoritative_above_its_floor() {
        let hub = TestHub::new(200, BlockRef::new(260, "260a"));
        let block = test_block(250, "250a", "249a", 248, "248a");
        hub.push_window(live_event(Step::New, block.clone(), BlockRef::new(260, "260a")));

        // The same height also exists in the archive; it must not be probed.
        let merged = MemoryBlobStore::new();
        seed_merged_bundles(&merged, &[test_block(250, "stale", "249a", 248, "248a")]);

        let getter = getter(Some(hub), merged, None);
        let found = getter.get(250, "250a", None).await.unwrap().unwrap();
        assert_eq!(found.id(), "250a");

        // Absent from the hub: immediate not-found, no archive fall-through.
        assert!(getter.get(255, "", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn merged_tier_serves_matching_id() {
        let hub = TestHub::new(200, BlockRef::new(260, "260a"));
        let merged = MemoryBlobStore::new();
        seed_merged_bundles(&merged, &[test_block(100, "100x", "99a", 98, "98a")]);

        let getter = getter(Some(hub), merged, None);
        let found = getter.get(100, "100X", None).await.unwrap().unwrap();
        assert_eq!(found.id(), "100x");
    }

    #[tokio::test(start_paused = true)]
    async fn merged_tier_retries_transient_errors() {
        let merged = MemoryBlobStore::new();
        seed_merged_bundles(&merged, &[test_block(100, "100x", "99a", 98, "98a")]);
        merged.fail_reads(&firehose_store::bundle_name(100), 2);

        let getter = getter(None, merged, None);
        assert!(getter.get(100, "", None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn id_mismatch_falls_through_to_forked_tier() {
        let merged = MemoryBlobStore::new();
        seed_merged_bundles(&merged, &[test_block(100, "100x", "99a", 98, "98a")]);

        let forked = MemoryBlobStore::new();
        seed_one_block(&forked, &test_block(100, "100y", "99a", 98, "98a"));

        let getter = getter(None, merged, Some(forked));
        let found = getter.get(100, "100y", None).await.unwrap().unwrap();
        assert_eq!(found.id(), "100y");

        // Nowhere at all.
        assert!(getter.get(100, "100z", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn meters_scoped_reads() {
        let merged = MemoryBlobStore::new();
        seed_merged_bundles(&merged, &[test_block(100, "100x", "99a", 98, "98a")]);

        let getter = getter(None, merged, None);
        let meter = BytesMeter::new();
        getter.get(100, "", Some(&meter)).await.unwrap().unwrap();
        assert!(meter.total() > 0);
    }
}
