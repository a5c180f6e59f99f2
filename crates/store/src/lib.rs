//! Object-store access for the firehose stack.
//!
//! Stores are consumed, never written: the merger service produces merged
//! bundles and the reader side only needs the byte-blob contract in
//! [`BlobStore`], the bundle addressing scheme and the two decoders (merged
//! bundles, one-block files).

mod blob;
pub use blob::{BlobStore, BlobStoreError, BytesMeter, MeteredStore};

mod bundle;
pub use bundle::{bundle_base, bundle_name, one_block_key, one_block_prefix, BUNDLE_SIZE};

mod error;
pub use error::StoreError;

mod envelope;
pub use envelope::{encode_envelope, EnvelopeCodec};

mod merged;
pub use merged::{encode_merged_bundle, read_merged_bundle};

mod one_block;
pub use one_block::find_one_block;

mod memory;
pub use memory::MemoryBlobStore;

mod fs;
pub use fs::FsBlobStore;
