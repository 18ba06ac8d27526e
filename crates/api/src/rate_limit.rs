use std::time::Duration;

use chrono::Utc;
use pdfchunk_core::config::describe_window;
use pdfchunk_storage::{RateLimitRepository, RateLimitStore};
use tracing::{info, warn};

/// Sliding-window limiter keyed by client address.
#[derive(Clone)]
pub struct ClientRateLimiter {
    store: RateLimitStore,
    window: Duration,
    max_requests: usize,
}

impl ClientRateLimiter {
    pub fn new(store: RateLimitStore, window: Duration, max_requests: usize) -> Self {
        Self {
            store,
            window,
            max_requests,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    fn window_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.window).unwrap_or_else(|_| chrono::Duration::hours(1))
    }

    /// Records the request and reports whether it is within the limit.
    ///
    /// A failing store lets the request through.
    pub async fn allow(&self, client_id: &str) -> bool {
        let now = Utc::now();
        let cutoff = now - self.window_delta();

        match self
            .store
            .record_hit(client_id, now, cutoff, self.max_requests)
            .await
        {
            Ok(allowed) => allowed,
            Err(err) => {
                warn!(error = %err, client_id, "rate limit store unavailable, allowing request");
                true
            }
        }
    }

    pub async fn purge_expired(&self) -> u64 {
        let cutoff = Utc::now() - self.window_delta();
        match self.store.purge_expired(cutoff).await {
            Ok(removed) => removed,
            Err(err) => {
                warn!(error = %err, "failed purging rate limit entries");
                0
            }
        }
    }

    pub fn rejection_message(&self) -> String {
        format!(
            "Rate limit exceeded. Maximum {} requests per {}.",
            self.max_requests,
            describe_window(self.window)
        )
    }
}

/// Periodically evicts clients whose hits have all expired.
pub fn spawn_rate_limit_janitor(
    limiter: ClientRateLimiter,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let removed = limiter.purge_expired().await;
            if removed > 0 {
                info!(removed, "purged idle rate limit clients");
            }
        }
    })
}
