// Text embedding providers

pub mod ollama;

pub use ollama::{DEFAULT_EMBEDDING_DIMENSION, ModelInfo, OllamaClient};

use crate::{RagError, Result};

/// Turns text into fixed-dimension vectors.
///
/// Implementations must return exactly one vector per input, in input order,
/// and every vector from one embedder must have the same dimension.
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    #[inline]
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("provider returned no embedding".to_string()))
    }
}
