use pdfchunk_extract::ExtractionError;
use pdfchunk_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    /// Caller-supplied input was missing or malformed; the message is safe to return.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProcessError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
