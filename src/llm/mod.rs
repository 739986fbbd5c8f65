// Text generation providers


pub mod gemini;
pub mod ollama;

pub use gemini::GeminiClient;
pub use ollama::OllamaChatClient;

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, ProviderKind};
use crate::session::ConversationTurn;
use crate::{RagError, Result};

/// Outcome of a single generation call, identical across providers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Text(String),
    /// The provider answered but produced no text
    Empty,
    /// The provider refused to answer
    Blocked { reason: String },
}

impl Completion {
    /// Wrap provider output, treating blank text as [`Completion::Empty`]
    #[inline]
    pub fn from_text(text: String) -> Self {
        if text.trim().is_empty() {
            Self::Empty
        } else {
            Self::Text(text)
        }
    }

    #[inline]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    #[inline]
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Empty => Err(RagError::Generation(
                "model returned an empty response".to_string(),
            )),
            Self::Blocked { reason } => Err(RagError::Generation(format!(
                "response blocked by provider: {reason}"
            ))),
        }
    }
}

pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Single prompt in, single completion out
    fn complete(&self, prompt: &str) -> Result<Completion>;

    /// Continue a conversation; the last turn is the newest user input
    fn chat(&self, turns: &[ConversationTurn]) -> Result<Completion>;
}

/// Build the configured provider. A missing API key fails here, at startup.
#[inline]
pub fn build_language_model(config: &Config) -> Result<Arc<dyn LanguageModel>> {
    let model: Arc<dyn LanguageModel> = match config.generation.provider {
        ProviderKind::Gemini => Arc::new(GeminiClient::new(config)?),
        ProviderKind::Ollama => Arc::new(OllamaChatClient::new(config)?),
    };
    info!(
        "Using {} model {}",
        config.generation.provider,
        model.model_name()
    );
    Ok(model)
}
