mod error;
mod rate_limit;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::{ConnectInfo, DefaultBodyLimit, State};
use axum::http::{header, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Json, Router};
use bytes::Bytes;
use pdfchunk_core::{ChunkReport, ChunkResponse, InvocationEvent, ServiceConfig, StorageEvent};
use pdfchunk_extract::{PdfTextExtractor, TextExtractor};
use pdfchunk_observability::AppMetrics;
use pdfchunk_pipeline::{parse_invocation, parse_upload, DocumentProcessor, ProcessError};
use pdfchunk_storage::{DocumentStorage, RateLimitStore};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use crate::error::{ApiError, INTERNAL_ERROR_MESSAGE};
pub use crate::rate_limit::{spawn_rate_limit_janitor, ClientRateLimiter};

#[derive(Clone)]
pub struct ApiState {
    pub processor: DocumentProcessor,
    pub storage: DocumentStorage,
    pub limiter: ClientRateLimiter,
    pub metrics: Arc<AppMetrics>,
    pub output_bucket: String,
    pub max_body_bytes: usize,
}

impl ApiState {
    pub fn new(
        config: &ServiceConfig,
        extractor: Arc<dyn TextExtractor>,
        storage: DocumentStorage,
        rate_store: RateLimitStore,
    ) -> Self {
        let metrics = AppMetrics::shared();
        Self {
            processor: DocumentProcessor::new(extractor, config.chunk_size, metrics.clone()),
            storage,
            limiter: ClientRateLimiter::new(
                rate_store,
                config.rate_limit_window,
                config.max_requests_per_ip,
            ),
            metrics,
            output_bucket: config.output_bucket.clone(),
            max_body_bytes: config.max_body_bytes,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    chunk_size: usize,
    storage_backend: &'static str,
    rate_limit_backend: &'static str,
    metrics: pdfchunk_observability::MetricsSnapshot,
}

pub async fn build_state(config: &ServiceConfig) -> Result<ApiState> {
    let rate_store = match config.database_url.as_deref() {
        Some(database_url) => RateLimitStore::sqlite(database_url)
            .await
            .with_context(|| format!("failed connecting rate limit store at {database_url}"))?,
        None => RateLimitStore::memory(),
    };
    let storage = DocumentStorage::from_config(config);

    info!(
        storage_backend = storage.backend_name(),
        rate_limit_backend = rate_store.backend_name(),
        chunk_size = config.chunk_size,
        "initialised pdfchunk state"
    );

    Ok(ApiState::new(
        config,
        Arc::new(PdfTextExtractor),
        storage,
        rate_store,
    ))
}

pub fn build_router(state: ApiState) -> Router {
    let limited = Router::new()
        .route("/v1/chunk", post(chunk_upload))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/v1/events/storage", post(storage_event))
        .route("/v1/invoke", post(invoke))
        .merge(limited)
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.max_body_bytes))
        .with_state(state)
}

fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        chunk_size: state.processor.chunk_size(),
        storage_backend: state.storage.backend_name(),
        rate_limit_backend: state.limiter.backend_name(),
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn chunk_upload(State(state): State<ApiState>, body: Bytes) -> Response {
    let started = Instant::now();
    state.metrics.inc_request();

    let result = match std::str::from_utf8(&body) {
        Ok(text) => match parse_upload(text) {
            Ok(upload) => state.processor.handle_upload(upload).await,
            Err(err) => Err(err),
        },
        Err(_) => Err(ProcessError::validation("Invalid JSON body")),
    };

    finish_chunk_request(&state, started, result.map_err(ApiError::from))
}

async fn invoke(State(state): State<ApiState>, body: Bytes) -> Response {
    let event = match parse_invocation(&body) {
        Ok(event) => event,
        Err(err) => {
            state.metrics.inc_request();
            return ApiError::from(err).into_response();
        }
    };

    match event {
        InvocationEvent::Storage(event) => run_storage_event(&state, &event).await,
        InvocationEvent::Web(event) => {
            let started = Instant::now();
            state.metrics.inc_request();

            let client = event.source_ip().to_string();
            info!(client = %client, "handling web invocation");
            if !state.limiter.allow(&client).await {
                return reject_rate_limited(&state, &client);
            }

            let result = state.processor.handle_web_event(&event).await;
            finish_chunk_request(&state, started, result.map_err(ApiError::from))
        }
    }
}

async fn storage_event(State(state): State<ApiState>, body: Bytes) -> Response {
    match serde_json::from_slice::<StorageEvent>(&body) {
        Ok(event) => run_storage_event(&state, &event).await,
        Err(_) => {
            state.metrics.inc_request();
            ApiError::from(ProcessError::validation("Invalid storage event")).into_response()
        }
    }
}

async fn run_storage_event(state: &ApiState, event: &StorageEvent) -> Response {
    let started = Instant::now();
    state.metrics.inc_request();

    let result = state
        .processor
        .handle_storage_event(event, &state.storage, &state.output_bucket)
        .await;
    state.metrics.observe_latency(started.elapsed());

    match result {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => {
            state.metrics.inc_failure();
            ApiError::from(err).into_response()
        }
    }
}

fn finish_chunk_request(
    state: &ApiState,
    started: Instant,
    result: Result<ChunkReport, ApiError>,
) -> Response {
    state.metrics.observe_latency(started.elapsed());

    match result {
        Ok(report) => (StatusCode::OK, Json(ChunkResponse::ok(report))).into_response(),
        Err(err) => {
            state.metrics.inc_failure();
            err.into_response()
        }
    }
}

fn reject_rate_limited(state: &ApiState, client: &str) -> Response {
    warn!(client, "rate limit exceeded");
    state.metrics.inc_rate_limited();
    ApiError::RateLimited(state.limiter.rejection_message()).into_response()
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let client = request_ip(&request);
    if !state.limiter.allow(&client).await {
        state.metrics.inc_request();
        return reject_rate_limited(&state, &client);
    }

    next.run(request).await
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}
