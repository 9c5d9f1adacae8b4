//! PDF to markdown conversion.
//!
//! Conversion sits behind a trait so tests can feed synthetic pages and the
//! converter can be swapped for a richer external one without touching the
//! pipeline.

use lopdf::Document;

use crate::types::{AppError, AppResult};

/// An image extracted from a document, keyed by the name its in-text
/// reference uses.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// One page of converted output.
#[derive(Debug, Clone)]
pub struct PageMarkdown {
    pub text: String,
    pub images: Vec<ExtractedImage>,
}

pub trait MarkdownConverter: Send + Sync {
    fn convert(&self, bytes: &[u8]) -> AppResult<Vec<PageMarkdown>>;
}

/// Text-only converter on top of lopdf. Embedded images are not extracted;
/// pages come out as plain markdown paragraphs.
pub struct LopdfConverter;

impl MarkdownConverter for LopdfConverter {
    fn convert(&self, bytes: &[u8]) -> AppResult<Vec<PageMarkdown>> {
        let document = Document::load_mem(bytes)
            .map_err(|e| AppError::Ingest(format!("unreadable PDF: {e}")))?;
        let mut pages = Vec::new();
        for (page_number, _) in document.get_pages() {
            let text = document
                .extract_text(&[page_number])
                .map_err(|e| AppError::Ingest(format!("page {page_number} extraction failed: {e}")))?;
            pages.push(PageMarkdown { text, images: Vec::new() });
        }
        if pages.is_empty() {
            return Err(AppError::Ingest("PDF contains no pages".to_string()));
        }
        Ok(pages)
    }
}
