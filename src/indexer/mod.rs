
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::embeddings::Embedder;
use crate::ingest::Chunk;
use crate::store::{EmbeddedChunk, VectorStore, WriterLock};
use crate::{RagError, Result};

const DEFAULT_BATCH_SIZE: usize = 16;
const DEFAULT_STALE_LOCK: Duration = Duration::from_secs(600);

/// Outcome of one [`Indexer::index`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    /// Chunks written by this call
    pub chunks_indexed: usize,
    /// Chunks in the store afterwards
    pub total_chunks: usize,
    pub dimension: Option<usize>,
}

/// Embeds chunks and writes them to a [`VectorStore`]
pub struct Indexer {
    store: VectorStore,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    stale_lock: Duration,
    expected_dimension: Option<usize>,
    show_progress: bool,
}

impl Indexer {
    #[inline]
    pub fn new(store: VectorStore, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            stale_lock: DEFAULT_STALE_LOCK,
            expected_dimension: None,
            show_progress: console::user_attended_stderr(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_stale_lock(mut self, stale_lock: Duration) -> Self {
        self.stale_lock = stale_lock;
        self
    }

    /// Refuse to write vectors whose length differs from `dimension`
    #[inline]
    #[must_use]
    pub const fn with_expected_dimension(mut self, dimension: usize) -> Self {
        self.expected_dimension = Some(dimension);
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    #[inline]
    pub const fn store(&self) -> &VectorStore {
        &self.store
    }

    #[inline]
    pub fn into_store(self) -> VectorStore {
        self.store
    }

    /// Embed every chunk, then append them all in a single write.
    ///
    /// Nothing is written unless every embedding succeeded.
    #[inline]
    pub async fn index(&mut self, chunks: &[Chunk]) -> Result<IndexReport> {
        if chunks.is_empty() {
            debug!("Nothing to index");
            return Ok(IndexReport {
                chunks_indexed: 0,
                total_chunks: self.store.count().await?,
                dimension: self.store.dimension(),
            });
        }

        let _lock = WriterLock::acquire(self.store.path(), self.stale_lock)?;

        info!(
            "Embedding {} chunks with {}",
            chunks.len(),
            self.embedder.model_name()
        );
        let records = self.embed(chunks)?;

        let written = self.store.add(&records).await?;
        let total_chunks = self.store.count().await?;

        info!(
            "Indexed {} chunks ({} total in store)",
            written, total_chunks
        );
        Ok(IndexReport {
            chunks_indexed: written,
            total_chunks,
            dimension: self.store.dimension(),
        })
    }

    fn embed(&self, chunks: &[Chunk]) -> Result<Vec<EmbeddedChunk>> {
        let bar = if self.show_progress {
            ProgressBar::new(chunks.len() as u64).with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut records = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            if let Some(first) = batch.first() {
                bar.set_message(first.metadata.source.clone());
            }

            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_documents(&texts).inspect_err(|_| {
                bar.abandon();
            })?;

            if vectors.len() != batch.len() {
                bar.abandon();
                return Err(RagError::Embedding(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            if let Some(expected) = self.expected_dimension {
                if let Some(vector) = vectors.iter().find(|v| v.len() != expected) {
                    bar.abandon();
                    return Err(RagError::Embedding(format!(
                        "{} returned {}-dimensional embeddings, but {} are configured",
                        self.embedder.model_name(),
                        vector.len(),
                        expected
                    )));
                }
            }

            records.extend(
                batch
                    .iter()
                    .zip(vectors)
                    .map(|(chunk, vector)| EmbeddedChunk {
                        chunk: chunk.clone(),
                        vector,
                    }),
            );
            bar.inc(batch.len() as u64);
        }

        bar.finish_and_clear();
        Ok(records)
    }
}
