// Turning sources into documents and documents into chunks


pub mod chunking;
pub mod feed;
pub mod pdf;
pub mod transcript;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::http::HttpClient;
use crate::{RagError, Result};

pub use chunking::{Chunk, ChunkingConfig, split_documents};
pub use feed::FeedItem;

/// Feed entries kept when no limit is given
pub const DEFAULT_FEED_LIMIT: usize = 5;

const YOUTUBE_HOSTS: [&str; 5] = [
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtu.be",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Path or URL the document was loaded from
    pub source: String,
    /// 1-based page number for paginated sources
    pub page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    #[inline]
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: DocumentMetadata {
                source: source.into(),
                page: None,
            },
        }
    }

    #[inline]
    #[must_use]
    pub const fn with_page(mut self, page: u32) -> Self {
        self.metadata.page = Some(page);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    TextFile(PathBuf),
    Pdf(PathBuf),
    Feed { url: Url, limit: usize },
    Transcript(Url),
}

impl Source {
    /// Classify user input as a URL or a local path
    #[inline]
    pub fn detect(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(RagError::Validation("source cannot be empty".to_string()));
        }

        if input.starts_with("http://") || input.starts_with("https://") {
            let url = Url::parse(input)
                .map_err(|e| RagError::Load(format!("invalid URL '{input}': {e}")))?;
            let is_youtube = url
                .host_str()
                .is_some_and(|host| YOUTUBE_HOSTS.contains(&host));
            return Ok(if is_youtube {
                Self::Transcript(url)
            } else {
                Self::Feed {
                    url,
                    limit: DEFAULT_FEED_LIMIT,
                }
            });
        }

        let path = PathBuf::from(input);
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        Ok(if is_pdf {
            Self::Pdf(path)
        } else {
            Self::TextFile(path)
        })
    }
}

impl fmt::Display for Source {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextFile(path) | Self::Pdf(path) => write!(f, "{}", path.display()),
            Self::Feed { url, .. } | Self::Transcript(url) => write!(f, "{url}"),
        }
    }
}

/// Loads documents from any [`Source`]
#[derive(Debug, Clone)]
pub struct Loader {
    http: HttpClient,
    watch_endpoint: String,
}

impl Default for Loader {
    #[inline]
    fn default() -> Self {
        Self::new(HttpClient::default())
    }
}

impl Loader {
    #[inline]
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            watch_endpoint: transcript::DEFAULT_WATCH_ENDPOINT.to_string(),
        }
    }

    /// Look up caption tracks on a different watch page endpoint
    #[inline]
    #[must_use]
    pub fn with_watch_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.watch_endpoint = endpoint.into();
        self
    }

    #[inline]
    pub const fn http(&self) -> &HttpClient {
        &self.http
    }

    #[inline]
    pub fn load(&self, source: &Source) -> Result<Vec<Document>> {
        info!("Loading {}", source);
        let documents = match source {
            Source::TextFile(path) => vec![load_text_file(path)?],
            Source::Pdf(path) => pdf::load_pdf(path)?,
            Source::Feed { url, limit } => {
                let items = feed::fetch_feed(&self.http, url, *limit)?;
                vec![feed::items_to_document(url, &items)]
            }
            Source::Transcript(url) => {
                let video_id = transcript::extract_video_id(url.as_str())
                    .ok_or_else(|| RagError::Load("invalid YouTube URL".to_string()))?;
                let text =
                    transcript::fetch_transcript(&self.http, &self.watch_endpoint, &video_id)?;
                vec![Document::new(text, url.as_str())]
            }
        };
        debug!("Loaded {} document(s) from {}", documents.len(), source);
        Ok(documents)
    }
}

/// Load a source with default HTTP settings
#[inline]
pub fn load_source(source: &Source) -> Result<Vec<Document>> {
    Loader::default().load(source)
}

fn load_text_file(path: &Path) -> Result<Document> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| RagError::Load(format!("failed to read {}: {e}", path.display())))?;
    Ok(Document::new(text, path.display().to_string()))
}
