use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Process-wide counters, mirrored into the `metrics` facade for exporters.
#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    documents_processed_total: AtomicU64,
    chunks_emitted_total: AtomicU64,
    rate_limited_total: AtomicU64,
    failures_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub documents_processed_total: u64,
    pub chunks_emitted_total: u64,
    pub rate_limited_total: u64,
    pub failures_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("pdfchunk_requests_total").increment(1);
    }

    pub fn record_document(&self, chunks: usize) {
        self.documents_processed_total.fetch_add(1, Ordering::Relaxed);
        self.chunks_emitted_total
            .fetch_add(chunks as u64, Ordering::Relaxed);
        metrics::counter!("pdfchunk_documents_processed_total").increment(1);
        metrics::counter!("pdfchunk_chunks_emitted_total").increment(chunks as u64);
    }

    pub fn inc_rate_limited(&self) {
        self.rate_limited_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("pdfchunk_rate_limited_total").increment(1);
    }

    pub fn inc_failure(&self) {
        self.failures_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("pdfchunk_failures_total").increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        metrics::histogram!("pdfchunk_request_latency_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            documents_processed_total: self.documents_processed_total.load(Ordering::Relaxed),
            chunks_emitted_total: self.chunks_emitted_total.load(Ordering::Relaxed),
            rate_limited_total: self.rate_limited_total.load(Ordering::Relaxed),
            failures_total: self.failures_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,pdfchunk_api=info,pdfchunk_pipeline=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}
