
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Document, DocumentMetadata};
use crate::config::ConfigError;
use crate::{RagError, Result};

/// Break points tried in order when a window has to end early
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

const MAX_CHUNK_SIZE: usize = 100_000;

/// A piece of a document ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Metadata of the document this chunk came from
    pub metadata: DocumentMetadata,
    /// Position of the chunk across the whole split call
    pub chunk_index: usize,
    /// Character offset of the chunk within its document
    pub offset: usize,
    /// Estimated token count
    pub token_count: usize,
}

/// Sizes are measured in characters, not bytes or tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub const fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    #[inline]
    pub const fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidChunkOverlap(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }
        Ok(())
    }
}

/// A window of a single text, before metadata is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub offset: usize,
    pub text: String,
}

/// Split one text into overlapping windows.
///
/// Each window holds at most `chunk_size` characters. A window that does not
/// reach the end of the text is shortened back to the last paragraph break,
/// line break or space, as long as it stays longer than the overlap. The next
/// window starts `chunk_overlap` characters before the previous one ended, so
/// consecutive windows share exactly `chunk_overlap` characters and together
/// cover the whole text.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextSpan>> {
    config
        .validate()
        .map_err(|e| RagError::Validation(e.to_string()))?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut spans = Vec::new();
    let mut start = 0;

    loop {
        let hard_end = (start + config.chunk_size).min(len);
        let end = if hard_end < len {
            find_break(&chars, start, hard_end, config.chunk_overlap)
        } else {
            len
        };

        spans.push(TextSpan {
            offset: start,
            text: chars.get(start..end).unwrap_or_default().iter().collect(),
        });

        if end >= len {
            break;
        }
        start = end - config.chunk_overlap;
    }

    Ok(spans)
}

/// End position of a window starting at `start`, preferring natural breaks.
/// The returned end always leaves the window longer than `overlap`.
fn find_break(chars: &[char], start: usize, hard_end: usize, overlap: usize) -> usize {
    for separator in SEPARATORS {
        let sep: Vec<char> = separator.chars().collect();
        let Some(last_pos) = hard_end.checked_sub(sep.len()) else {
            continue;
        };

        let found = (start..=last_pos)
            .rev()
            .take_while(|pos| pos + sep.len() - start > overlap)
            .find(|&pos| chars.get(pos..pos + sep.len()) == Some(sep.as_slice()));

        if let Some(pos) = found {
            return pos + sep.len();
        }
    }
    hard_end
}

/// Split every document, numbering chunks across the whole batch
#[inline]
pub fn split_documents(documents: &[Document], config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();

    for document in documents {
        for span in split_text(&document.text, config)? {
            let token_count = estimate_token_count(&span.text);
            chunks.push(Chunk {
                text: span.text,
                metadata: document.metadata.clone(),
                chunk_index: chunks.len(),
                offset: span.offset,
                token_count,
            });
        }
    }

    debug!(
        "Split {} document(s) into {} chunk(s) (size {}, overlap {})",
        documents.len(),
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap
    );

    Ok(chunks)
}

#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // ~0.75 words per token, plus a little for punctuation
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}
