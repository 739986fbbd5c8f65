
use std::sync::Arc;

use tracing::debug;

use crate::embeddings::Embedder;
use crate::ingest::DocumentMetadata;
use crate::store::{SearchHit, VectorStore};
use crate::{RagError, Result};

pub const DEFAULT_TOP_K: usize = 3;

/// A stored chunk matched against a query
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub text: String,
    pub metadata: DocumentMetadata,
    pub distance: f32,
    /// Insertion order within the store
    pub seq: u64,
}

impl From<SearchHit> for RetrievedChunk {
    #[inline]
    fn from(hit: SearchHit) -> Self {
        Self {
            text: hit.chunk.text,
            metadata: hit.chunk.metadata,
            distance: hit.distance,
            seq: hit.chunk.seq,
        }
    }
}

/// Top-k similarity search over a [`VectorStore`]
pub struct Retriever {
    store: VectorStore,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl Retriever {
    #[inline]
    pub fn new(store: VectorStore, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            top_k: DEFAULT_TOP_K,
        }
    }

    #[inline]
    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    pub const fn top_k(&self) -> usize {
        self.top_k
    }

    #[inline]
    pub const fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Retrieve with the configured `k`
    #[inline]
    pub async fn retrieve_default(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        self.retrieve(query, self.top_k).await
    }

    /// Up to `k` chunks by increasing distance. An empty store yields nothing.
    #[inline]
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Err(RagError::Validation("k must be at least 1".to_string()));
        }
        if query.trim().is_empty() {
            return Err(RagError::Validation("query cannot be empty".to_string()));
        }

        if self.store.count().await? == 0 {
            debug!("Store is empty, skipping query embedding");
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed_query(query)?;
        let hits = self.store.search(&vector, k).await?;
        debug!("Retrieved {} chunk(s) for query", hits.len());

        Ok(hits.into_iter().map(RetrievedChunk::from).collect())
    }
}
