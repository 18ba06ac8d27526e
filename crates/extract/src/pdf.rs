use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::{ExtractionError, TextExtractor};

/// PDF text extraction backed by `pdf-extract`, one string per page.
///
/// Page text is trimmed at its edges. The parser can panic on malformed input, so calls are isolated with
/// `catch_unwind` and reported as [`ExtractionError::Parse`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(bytes)
        }));

        let pages = match outcome {
            Ok(Ok(pages)) => pages,
            Ok(Err(err)) => return Err(ExtractionError::Parse(err.to_string())),
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                warn!(reason = %reason, "pdf parser panicked");
                return Err(ExtractionError::Parse(format!("parser panicked: {reason}")));
            }
        };

        let pages: Vec<String> = pages
            .into_iter()
            .map(|page| page.trim().to_string())
            .collect();
        let blank = pages.iter().filter(|page| page.is_empty()).count();
        if blank > 0 {
            debug!(pages = pages.len(), blank, "pages without extractable text");
        }

        Ok(pages)
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
