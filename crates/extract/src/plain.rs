use crate::{split_pages, ExtractionError, TextExtractor};

/// Treats the input as UTF-8 text with form feeds between pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "plain-text"
    }

    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|err| ExtractionError::Encoding(err.to_string()))?;
        Ok(split_pages(text))
    }
}
