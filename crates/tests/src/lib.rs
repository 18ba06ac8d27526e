//! Shared fixtures for the end-to-end suites.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use pdfchunk_api::{build_router, ApiState};
use pdfchunk_core::{ServiceConfig, StorageBackendKind};
use pdfchunk_extract::{PlainTextExtractor, TextExtractor};
use pdfchunk_storage::{DocumentStorage, RateLimitStore};

pub const OUTPUT_BUCKET: &str = "chunked-output";

pub fn test_config(chunk_size: usize, max_requests: usize) -> ServiceConfig {
    ServiceConfig {
        chunk_size,
        max_requests_per_ip: max_requests,
        rate_limit_window: Duration::from_secs(3600),
        output_bucket: OUTPUT_BUCKET.to_string(),
        storage_backend: StorageBackendKind::Memory,
        ..ServiceConfig::default()
    }
}

/// Router whose "PDF" parser reads UTF-8 text, so fixtures stay readable.
pub fn text_app(config: &ServiceConfig, storage: DocumentStorage) -> Router {
    app_with_extractor(config, storage, Arc::new(PlainTextExtractor))
}

pub fn app_with_extractor(
    config: &ServiceConfig,
    storage: DocumentStorage,
    extractor: Arc<dyn TextExtractor>,
) -> Router {
    let state = ApiState::new(config, extractor, storage, RateLimitStore::memory());
    build_router(state)
}
