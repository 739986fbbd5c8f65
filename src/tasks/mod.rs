// Single-prompt generation tasks


use std::fmt;
use std::sync::Arc;

use clap::ValueEnum;
use itertools::Itertools;
use tracing::{debug, warn};
use url::Url;

use crate::http::HttpClient;
use crate::ingest::FeedItem;
use crate::ingest::feed::fetch_feed;
use crate::llm::LanguageModel;
use crate::session::ChatSession;
use crate::{RagError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum NewsCategory {
    #[default]
    Tech,
    Finance,
}

impl NewsCategory {
    #[inline]
    pub const fn feed_url(self) -> &'static str {
        match self {
            Self::Tech => "https://feeds.feedburner.com/TechCrunch/",
            Self::Finance => "https://www.investing.com/rss/news_301.rss",
        }
    }
}

impl fmt::Display for NewsCategory {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tech => f.write_str("Tech"),
            Self::Finance => f.write_str("Finance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum EmailCategory {
    #[default]
    Business,
    Personal,
    Marketing,
    FollowUp,
    ThankYou,
    Invitation,
}

impl fmt::Display for EmailCategory {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Business => "Business",
            Self::Personal => "Personal",
            Self::Marketing => "Marketing",
            Self::FollowUp => "Follow-up",
            Self::ThankYou => "Thank You",
            Self::Invitation => "Invitation",
        };
        f.write_str(label)
    }
}

fn require(input: &str, what: &str) -> Result<()> {
    if input.trim().is_empty() {
        return Err(RagError::Validation(format!("{what} cannot be empty")));
    }
    Ok(())
}

#[inline]
pub fn headlines_prompt(items: &[FeedItem]) -> String {
    let titles = items.iter().map(|item| format!(" - {}", item.title)).join("\n");
    format!("Summarize the following news headlines in 3-5 points:\n\n{titles}")
}

#[inline]
pub fn transcript_prompt(text: &str) -> String {
    format!("Summarize the following YouTube transcript into concise bullet points:\n\n{text}")
}

#[inline]
pub fn notes_prompt(topic: &str) -> String {
    format!(
        "Generate detailed, well-structured notes based on the following topic:

**Topic:** {topic}

Requirements:
- Use clear markdown formatting (headings, bullet points, bold, etc.).
- Include examples where applicable.
- Add image references if necessary (use markdown image syntax `![alt](url)`).
- Keep explanations educational and concise."
    )
}

#[inline]
pub fn email_prompt(topic: &str, category: EmailCategory) -> String {
    format!(
        "Draft a {category} email based on the following topic or key points:\n\n{topic}\n\nMake sure the email is well-structured and professional."
    )
}

/// Fetch the latest headlines for a category
#[inline]
pub fn fetch_headlines(
    http: &HttpClient,
    category: NewsCategory,
    limit: usize,
) -> Result<Vec<FeedItem>> {
    let url = Url::parse(category.feed_url())
        .map_err(|e| RagError::Load(format!("invalid feed URL: {e}")))?;
    fetch_feed(http, &url, limit)
}

#[inline]
pub fn summarize_headlines(model: &dyn LanguageModel, items: &[FeedItem]) -> Result<String> {
    if items.iter().all(|item| item.title.trim().is_empty()) {
        return Err(RagError::Validation("no headlines to summarize".to_string()));
    }
    debug!("Summarizing {} headline(s)", items.len());
    model.complete(&headlines_prompt(items))?.into_text()
}

#[inline]
pub fn summarize_transcript(model: &dyn LanguageModel, text: &str) -> Result<String> {
    require(text, "transcript")?;
    model.complete(&transcript_prompt(text))?.into_text()
}

#[inline]
pub fn generate_notes(model: &dyn LanguageModel, topic: &str) -> Result<String> {
    require(topic, "topic")?;
    let notes = model.complete(&notes_prompt(topic.trim()))?.into_text()?;
    Ok(notes.trim().to_string())
}

#[inline]
pub fn draft_email(
    model: &dyn LanguageModel,
    topic: &str,
    category: EmailCategory,
) -> Result<String> {
    require(topic, "email topic")?;
    let draft = model
        .complete(&email_prompt(topic.trim(), category))?
        .into_text()?;
    Ok(draft.trim().to_string())
}

/// Chatbot that keeps the whole conversation as context
pub struct MemoryChat {
    model: Arc<dyn LanguageModel>,
}

impl MemoryChat {
    #[inline]
    pub const fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Send one message. Failures are also recorded in the session as an
    /// assistant turn so the history shows what happened.
    #[inline]
    pub fn send(&self, session: &mut ChatSession, input: &str) -> Result<String> {
        require(input, "message")?;
        session.push_user(input.trim());

        let result = self
            .model
            .chat(session.turns())
            .and_then(|completion| completion.into_text());

        match result {
            Ok(answer) => {
                session.push_assistant(answer.as_str());
                Ok(answer)
            }
            Err(e) => {
                warn!("Chat turn failed: {}", e);
                session.push_assistant(format!("Error: {e}"));
                Err(e)
            }
        }
    }
}
