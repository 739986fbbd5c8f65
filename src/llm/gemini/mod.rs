#[cfg(test)]
mod tests;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::{Completion, LanguageModel};
use crate::config::{Config, ConfigError};
use crate::http::HttpClient;
use crate::session::{ConversationTurn, Role};
use crate::{RagError, Result};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Finish reasons that mean the candidate was withheld
const BLOCKING_FINISH_REASONS: [&str; 5] = [
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

/// Client for the Gemini `generateContent` REST endpoint
#[derive(Clone)]
pub struct GeminiClient {
    base_url: Url,
    model: String,
    api_key: String,
    temperature: f32,
    http: HttpClient,
}

impl std::fmt::Debug for GeminiClient {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiClient {
    /// Reads the API key from the environment variable named in config
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.gemini.api_key()?;
        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(config: &Config, api_key: String) -> Result<Self> {
        let base_url = Url::parse(&config.gemini.base_url)
            .map_err(|_| ConfigError::InvalidUrl(config.gemini.base_url.clone()))?;

        Ok(Self {
            base_url,
            model: config.gemini.model.clone(),
            api_key,
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

    fn generate(&self, contents: Vec<Content<'_>>) -> anyhow::Result<Completion> {
        let url = self
            .base_url
            .join(&format!("/v1beta/models/{}:generateContent", self.model))
            .context("Failed to build Gemini URL")?;

        let request = GenerateRequest {
            contents,
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        debug!("Calling Gemini model {}", self.model);
        let response_text = self
            .http
            .post_json(&url, &request, &[(API_KEY_HEADER, &self.api_key)])
            .context("Gemini request failed")?;

        let response: GenerateResponse =
            serde_json::from_str(&response_text).context("Failed to parse Gemini response")?;

        Ok(interpret(response))
    }
}

fn interpret(response: GenerateResponse) -> Completion {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        warn!("Gemini blocked the prompt: {}", reason);
        return Completion::Blocked { reason };
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Completion::Empty;
    };

    let text: String = candidate.content.map_or_else(String::new, |content| {
        content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect()
    });

    if text.trim().is_empty() {
        if let Some(reason) = candidate
            .finish_reason
            .filter(|r| BLOCKING_FINISH_REASONS.contains(&r.as_str()))
        {
            warn!("Gemini withheld the answer: {}", reason);
            return Completion::Blocked { reason };
        }
    }

    Completion::from_text(text)
}

const fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

impl LanguageModel for GeminiClient {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn complete(&self, prompt: &str) -> Result<Completion> {
        let contents = vec![Content {
            role: "user",
            parts: [Part { text: prompt }],
        }];
        self.generate(contents)
            .map_err(|e| RagError::Generation(format!("{e:#}")))
    }

    #[inline]
    fn chat(&self, turns: &[ConversationTurn]) -> Result<Completion> {
        let contents = turns
            .iter()
            .map(|turn| Content {
                role: gemini_role(turn.role),
                parts: [Part { text: &turn.text }],
            })
            .collect();
        self.generate(contents)
            .map_err(|e| RagError::Generation(format!("{e:#}")))
    }
}
