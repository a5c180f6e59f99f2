//! Client-requested transforms.
//!
//! A request carries opaque descriptor messages; the registry maps each to
//! a block preprocessor, a sparse block-index provider, a passthrough that
//! takes over output generation, or a combination, and composes them.

mod error;
pub use error::TransformError;

mod registry;
pub use registry::{BuildOutcome, Transform, TransformFactory, TransformRegistry};

mod passthrough;
pub use passthrough::{PassthroughOutput, PassthroughRequest, PassthroughTransform};
