//! Merged-bundle framing.
//!
//! A merged bundle is a flat sequence of `u32` big-endian length-prefixed
//! frames, each frame one codec-encoded block. Bundles hold final blocks
//! only, in ascending block-number order.

use crate::{bundle_name, BlobStore, StoreError};
use bytes::{BufMut, Bytes, BytesMut};
use firehose_types::{Block, BlockDecoder};

/// Reads and decodes the merged bundle starting at `base`.
///
/// Framing and codec errors are fatal for the caller; a missing bundle
/// surfaces as [`BlobStoreError::NotFound`](crate::BlobStoreError).
pub async fn read_merged_bundle(
    store: &dyn BlobStore,
    decoder: &dyn BlockDecoder,
    base: u64,
) -> Result<Vec<Block>, StoreError> {
    let key = bundle_name(base);
    let raw = store.read(&key).await?;

    let mut blocks: Vec<Block> = Vec::new();
    let mut rest: &[u8] = &raw;
    while !rest.is_empty() {
        if rest.len() < 4 {
            return Err(StoreError::TruncatedBundle { key });
        }
        let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        rest = &rest[4..];
        if rest.len() < len {
            return Err(StoreError::TruncatedBundle { key });
        }
        let block = decoder.decode(&rest[..len])?;
        block.validate()?;
        if blocks.last().is_some_and(|previous| block.num() <= previous.num()) {
            return Err(StoreError::UnorderedBundle { key, num: block.num() });
        }
        blocks.push(block);
        rest = &rest[len..];
    }
    Ok(blocks)
}

/// Encodes pre-serialized block frames into merged-bundle framing.
///
/// The reader side never writes bundles; this exists for test fixtures and
/// for seeding [`MemoryBlobStore`](crate::MemoryBlobStore) instances.
pub fn encode_merged_bundle<I, F>(frames: I) -> Bytes
where
    I: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    let mut out = BytesMut::new();
    for frame in frames {
        let frame = frame.as_ref();
        out.put_u32(frame.len() as u32);
        out.put_slice(frame);
    }
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBlobStore;
    use firehose_types::{BlockRef, DecodeError};

    /// Frames are `num:id:parent_id:final_num` for test purposes.
    struct LineDecoder;

    impl BlockDecoder for LineDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<Block, DecodeError> {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| DecodeError::Malformed("not utf-8".to_string()))?;
            let mut parts = text.split(':');
            let num: u64 = parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| DecodeError::Malformed(text.to_string()))?;
            let id = parts.next().unwrap_or_default();
            let parent_id = parts.next().unwrap_or_default();
            let final_num: u64 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
            Ok(Block {
                reference: BlockRef::new(num, id),
                parent: BlockRef::new(num.saturating_sub(1), parent_id),
                last_final: BlockRef::new(final_num, "f"),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn reads_frames_in_order() {
        let store = MemoryBlobStore::new();
        let bundle = encode_merged_bundle(["100:aa:99:98", "101:bb:aa:99"]);
        store.set_object(&bundle_name(100), bundle);

        let blocks = read_merged_bundle(&store, &LineDecoder, 100).await.unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].num(), 100);
        assert_eq!(blocks[1].num(), 101);
    }

    #[tokio::test]
    async fn truncated_length_prefix_is_fatal() {
        let store = MemoryBlobStore::new();
        store.set_object(&bundle_name(0), Bytes::from_static(&[0, 0]));

        let err = read_merged_bundle(&store, &LineDecoder, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::TruncatedBundle { .. }));
    }

    #[tokio::test]
    async fn truncated_frame_is_fatal() {
        let store = MemoryBlobStore::new();
        let mut raw = BytesMut::new();
        raw.put_u32(50);
        raw.put_slice(b"short");
        store.set_object(&bundle_name(0), raw.freeze());

        let err = read_merged_bundle(&store, &LineDecoder, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::TruncatedBundle { .. }));
    }

    #[tokio::test]
    async fn unordered_bundle_is_fatal() {
        let store = MemoryBlobStore::new();
        let bundle = encode_merged_bundle(["101:bb:aa:99", "100:aa:99:98"]);
        store.set_object(&bundle_name(100), bundle);

        let err = read_merged_bundle(&store, &LineDecoder, 100).await.unwrap_err();
        assert!(matches!(err, StoreError::UnorderedBundle { num: 100, .. }));
    }

    #[tokio::test]
    async fn missing_bundle_is_not_found() {
        let store = MemoryBlobStore::new();
        let err = read_merged_bundle(&store, &LineDecoder, 300).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
