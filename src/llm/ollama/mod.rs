use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{Completion, LanguageModel};
use crate::config::Config;
use crate::http::HttpClient;
use crate::session::{ConversationTurn, Role};
use crate::{RagError, Result};

/// Generation through a local Ollama server
#[derive(Debug, Clone)]
pub struct OllamaChatClient {
    base_url: Url,
    model: String,
    temperature: f32,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
struct Options {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: Options,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: Options,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaChatClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            base_url: config.ollama_url()?,
            model: config.ollama.chat_model.clone(),
            temperature: config.generation.temperature,
            http: HttpClient::from_config(&config.http),
        })
    }

    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    fn post(&self, route: &str, body: &impl Serialize) -> anyhow::Result<String> {
        let url = self
            .base_url
            .join(route)
            .with_context(|| format!("Failed to build Ollama URL for {route}"))?;
        debug!("Calling Ollama model {} at {}", self.model, url);
        self.http
            .post_json(&url, body, &[])
            .with_context(|| format!("Ollama request to {route} failed"))
    }

    fn generate(&self, prompt: &str) -> anyhow::Result<Completion> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: Options {
                temperature: self.temperature,
            },
        };
        let response: GenerateResponse = serde_json::from_str(&self.post("/api/generate", &request)?)
            .context("Failed to parse Ollama generate response")?;
        Ok(Completion::from_text(response.response))
    }

    fn converse(&self, turns: &[ConversationTurn]) -> anyhow::Result<Completion> {
        let messages = turns
            .iter()
            .map(|turn| ChatMessage {
                role: match turn.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: &turn.text,
            })
            .collect();
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: Options {
                temperature: self.temperature,
            },
        };
        let response: ChatResponse = serde_json::from_str(&self.post("/api/chat", &request)?)
            .context("Failed to parse Ollama chat response")?;
        Ok(Completion::from_text(
            response.message.map_or_else(String::new, |m| m.content),
        ))
    }
}

impl LanguageModel for OllamaChatClient {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn complete(&self, prompt: &str) -> Result<Completion> {
        self.generate(prompt)
            .map_err(|e| RagError::Generation(format!("{e:#}")))
    }

    #[inline]
    fn chat(&self, turns: &[ConversationTurn]) -> Result<Completion> {
        self.converse(turns)
            .map_err(|e| RagError::Generation(format!("{e:#}")))
    }
}
