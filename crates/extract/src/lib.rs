mod pdf;
mod plain;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

pub use pdf::PdfTextExtractor;
pub use plain::PlainTextExtractor;

/// Page separator emitted by most PDF text backends.
pub const FORM_FEED: char = '\x0C';

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to parse document: {0}")]
    Parse(String),
    #[error("document is not valid UTF-8: {0}")]
    Encoding(String),
}

pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Per-page text in document order. Pages without text may be returned empty.
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;

    /// Concatenates pages, each followed by a newline; blank pages contribute nothing.
    fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let pages = self.extract_pages(bytes)?;
        Ok(join_pages(&pages))
    }
}

pub fn join_pages(pages: &[String]) -> String {
    let mut text = String::new();
    for page in pages.iter().filter(|page| !page.trim().is_empty()) {
        text.push_str(page);
        text.push('\n');
    }
    text
}

pub fn split_pages(text: &str) -> Vec<String> {
    text.split(FORM_FEED).map(ToString::to_string).collect()
}

/// Chooses an extractor by file extension: `.pdf` goes through the PDF backend, anything else is read as text.
pub fn extractor_for_path(path: &Path) -> Arc<dyn TextExtractor> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        Arc::new(PdfTextExtractor)
    } else {
        Arc::new(PlainTextExtractor)
    }
}
