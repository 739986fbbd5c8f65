use std::path::Path;

use tracing::{debug, warn};

use super::Document;
use crate::{RagError, Result};

/// Extract one document per page that has any text. Page numbers are 1-based.
#[inline]
pub fn load_pdf(path: &Path) -> Result<Vec<Document>> {
    let bytes = std::fs::read(path)
        .map_err(|e| RagError::Load(format!("failed to read {}: {e}", path.display())))?;
    let source = path.display().to_string();
    let documents = pdf_documents(&bytes, &source)?;
    debug!("Extracted {} page(s) from {}", documents.len(), source);
    Ok(documents)
}

/// Same as [`load_pdf`] for a PDF already in memory
#[inline]
pub fn pdf_documents(bytes: &[u8], source: &str) -> Result<Vec<Document>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| RagError::Load(format!("failed to parse PDF {source}: {e}")))?;

    let documents: Vec<Document> = pages
        .into_iter()
        .zip(1_u32..)
        .filter(|(text, _)| !text.trim().is_empty())
        .map(|(text, page)| Document::new(text, source).with_page(page))
        .collect();

    if documents.is_empty() {
        warn!("No extractable text in {}", source);
        return Err(RagError::Load(format!(
            "PDF {source} contains no extractable text"
        )));
    }

    Ok(documents)
}
