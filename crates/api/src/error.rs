use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pdfchunk_core::ChunkResponse;
use pdfchunk_pipeline::ProcessError;
use thiserror::Error;
use tracing::error;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    RateLimited(String),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Process(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Process(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::RateLimited(message) => message.clone(),
            Self::Process(err) if err.is_client_error() => err.to_string(),
            Self::Process(err) => {
                error!(error = %err, debug = ?err, "request failed");
                INTERNAL_ERROR_MESSAGE.to_string()
            }
        };

        (status, Json(ChunkResponse::failure(message))).into_response()
    }
}
