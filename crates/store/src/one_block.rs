//! Forked (one-block) file lookup.

use crate::{one_block_key, one_block_prefix, BlobStore, StoreError};
use firehose_types::{normalize_block_id, Block, BlockDecoder};
use tracing::warn;

/// Finds a single block in a one-block (forked blocks) store.
///
/// With a non-empty `id` the exact `(num, id)` file is read. With an empty
/// `id`, the first file at that height (lexicographic listing order) is
/// taken. `Ok(None)` means no matching file exists.
pub async fn find_one_block(
    store: &dyn BlobStore,
    decoder: &dyn BlockDecoder,
    num: u64,
    id: &str,
) -> Result<Option<Block>, StoreError> {
    let id = normalize_block_id(id);

    let key = if id.is_empty() {
        let listed = store.list_prefix(&one_block_prefix(num)).await?;
        match listed.into_iter().next() {
            Some(key) => key,
            None => return Ok(None),
        }
    } else {
        one_block_key(num, &id)
    };

    let raw = match store.read(&key).await {
        Ok(raw) => raw,
        Err(err) if err.is_not_found() => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let block = decoder.decode(&raw)?;
    if !id.is_empty() && block.id() != id {
        // The file name promised a different block than its content.
        warn!(target: "firehose_store", key, block_id = block.id(), "one-block file content mismatch");
        return Ok(None);
    }
    Ok(Some(block))
}
