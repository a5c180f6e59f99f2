//! The transform registry.

use crate::{PassthroughTransform, TransformError};
use firehose_stream::{BlockIndexProvider, BlockPreprocessor, PreprocessError};
use firehose_types::Block;
use std::{collections::HashMap, sync::Arc};

/// What a single descriptor resolves to.
pub enum Transform {
    /// A block-level mapping, optionally with a sparse index so the file
    /// source can skip bundles with nothing of interest.
    Filter {
        /// The per-block mapping.
        preprocessor: Arc<dyn BlockPreprocessor>,
        /// Optional bundle index.
        index_provider: Option<Arc<dyn BlockIndexProvider>>,
    },
    /// A transform that takes over output generation.
    Passthrough(Arc<dyn PassthroughTransform>),
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Filter { index_provider, .. } => f
                .debug_struct("Transform::Filter")
                .field("index_provider", &index_provider.is_some())
                .finish(),
            Self::Passthrough(_) => f.debug_struct("Transform::Passthrough").finish(),
        }
    }
}

/// Builds a [`Transform`] out of one descriptor's bytes.
pub trait TransformFactory: Send + Sync {
    /// Decodes and validates the descriptor payload.
    fn new_transform(&self, descriptor: &prost_types::Any) -> Result<Transform, TransformError>;
}

/// The artifacts one request's transform list resolves to.
pub struct BuildOutcome {
    /// Composed preprocessor, in descriptor declaration order.
    pub preprocessor: Option<Arc<dyn BlockPreprocessor>>,
    /// Bundle index of the first transform that provides one.
    pub index_provider: Option<Arc<dyn BlockIndexProvider>>,
    /// The passthrough, when the request is one.
    pub passthrough: Option<Arc<dyn PassthroughTransform>>,
    /// Human-readable summary for request logging.
    pub description: String,
}

impl std::fmt::Debug for BuildOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOutcome")
            .field("preprocessor", &self.preprocessor.is_some())
            .field("index_provider", &self.index_provider.is_some())
            .field("passthrough", &self.passthrough.is_some())
            .field("description", &self.description)
            .finish()
    }
}

/// Maps descriptor type URLs to transform factories. Populated at startup
/// by the embedding chain integration, read-only afterwards.
#[derive(Default)]
pub struct TransformRegistry {
    factories: HashMap<String, Box<dyn TransformFactory>>,
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&String> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("TransformRegistry").field("kinds", &kinds).finish()
    }
}

impl TransformRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for a descriptor kind. Replaces any previous
    /// factory for the same type URL.
    pub fn register(
        &mut self,
        type_url: impl Into<String>,
        factory: impl TransformFactory + 'static,
    ) {
        self.factories.insert(type_url.into(), Box::new(factory));
    }

    /// Resolves a request's descriptor list into its artifacts.
    pub fn build(&self, descriptors: &[prost_types::Any]) -> Result<BuildOutcome, TransformError> {
        let mut preprocessors: Vec<Arc<dyn BlockPreprocessor>> = Vec::new();
        let mut index_provider: Option<Arc<dyn BlockIndexProvider>> = None;
        let mut passthrough: Option<Arc<dyn PassthroughTransform>> = None;
        let mut passthrough_kind: Option<&str> = None;
        let mut kinds: Vec<&str> = Vec::new();

        for descriptor in descriptors {
            let factory = self.factories.get(&descriptor.type_url).ok_or_else(|| {
                TransformError::UnknownDescriptor { type_url: descriptor.type_url.clone() }
            })?;
            kinds.push(&descriptor.type_url);

            match factory.new_transform(descriptor)? {
                Transform::Filter { preprocessor, index_provider: provider } => {
                    preprocessors.push(preprocessor);
                    if index_provider.is_none() {
                        index_provider = provider;
                    }
                }
                Transform::Passthrough(transform) => {
                    if passthrough.is_some() {
                        return Err(TransformError::MultiplePassthroughs);
                    }
                    passthrough_kind = Some(&descriptor.type_url);
                    passthrough = Some(transform);
                }
            }
        }

        // A passthrough owns output generation for the whole request: any
        // other transforms in the list are never applied.
        if let Some(kind) = passthrough_kind {
            return Ok(BuildOutcome {
                preprocessor: None,
                index_provider: None,
                passthrough,
                description: kind.to_string(),
            });
        }

        let preprocessor: Option<Arc<dyn BlockPreprocessor>> = match preprocessors.len() {
            0 => None,
            1 => preprocessors.pop(),
            _ => Some(Arc::new(ComposedPreprocessor { chain: preprocessors })),
        };

        Ok(BuildOutcome {
            preprocessor,
            index_provider,
            passthrough: None,
            description: kinds.join("+"),
        })
    }
}

/// Runs each preprocessor in declaration order, feeding every stage the
/// previous stage's output.
struct ComposedPreprocessor {
    chain: Vec<Arc<dyn BlockPreprocessor>>,
}

impl BlockPreprocessor for ComposedPreprocessor {
    fn preprocess(
        &self,
        block: &Block,
        previous: Option<prost_types::Any>,
    ) -> Result<prost_types::Any, PreprocessError> {
        let mut carried = previous;
        for stage in &self.chain {
            carried = Some(stage.preprocess(block, carried.take())?);
        }
        // The chain is never empty by construction.
        carried.ok_or_else(|| PreprocessError("empty preprocessor chain".to_string()))
    }
}
