//! Stream assembly pipeline.
//!
//! This crate merges a historical source (merged-block bundles in object
//! storage) with a live source (a fork-aware hub of recent blocks) into one
//! ordered, fork-lifecycle-tagged sequence of [`StreamEvent`]s, with
//! cursor-based exactly-once resumption across both sources.

mod error;
pub use error::StreamError;

mod event;
pub use event::{EventPayload, StreamEvent};

mod traits;
pub use traits::{BlockIndexProvider, BlockPreprocessor, PreprocessError};

mod hub;
pub use hub::{ForkableHub, HubDelivery, HubSubscription, LiveEvent};

mod gate;
pub use gate::CursorGate;

mod backoff;

mod file_source;
pub use file_source::{FileSource, PreparedBlock};

mod stream;
pub use stream::BlockStream;

mod factory;
pub use factory::{StreamConfig, StreamFactory, StreamRequest};

mod getter;
pub use getter::BlockGetter;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

#[cfg(test)]
mod stream_tests;
