use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Load error: {0}")]
    Load(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Whether the error leaves the session usable for the next input.
    #[inline]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod generator;
pub mod http;
pub mod indexer;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod retriever;
pub mod session;
pub mod store;
pub mod tasks;

#[cfg(test)]
pub(crate) mod test_support;
