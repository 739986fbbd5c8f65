// Persistent vector storage for embedded chunks

pub mod lock;
pub mod vector_store;

pub use lock::WriterLock;
pub use vector_store::VectorStore;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ingest::{Chunk, DocumentMetadata};

/// Name of the single table holding all chunks
pub const TABLE_NAME: &str = "chunks";

/// Distance used to rank stored vectors against a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Squared Euclidean distance
    #[default]
    L2,
    Cosine,
}

impl DistanceMetric {
    #[inline]
    pub const fn to_lancedb(self) -> lancedb::DistanceType {
        match self {
            Self::L2 => lancedb::DistanceType::L2,
            Self::Cosine => lancedb::DistanceType::Cosine,
        }
    }
}

impl fmt::Display for DistanceMetric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::L2 => f.write_str("l2"),
            Self::Cosine => f.write_str("cosine"),
        }
    }
}

/// A chunk paired with its embedding, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A chunk as read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredChunk {
    pub id: String,
    /// Insertion counter, unique within a store
    pub seq: u64,
    pub text: String,
    pub metadata: DocumentMetadata,
    pub offset: u64,
    pub chunk_index: u64,
    pub token_count: u32,
    pub created_at: String,
}

/// One nearest-neighbour result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: StoredChunk,
    pub distance: f32,
}
