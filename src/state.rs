use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::middleware::rate_limit::RateLimiter;
use crate::rewards::RewardEngine;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    rewards: Arc<RewardEngine>,
    rate_limiter: Arc<RateLimiter>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
    sse_connections: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        rewards: Arc<RewardEngine>,
        config: &Config,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            store,
            rewards,
            rate_limiter: Arc::new(RateLimiter::new(
                config.rate_limit.window_secs,
                config.rate_limit.max_requests,
            )),
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
            sse_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn rewards(&self) -> &RewardEngine {
        &self.rewards
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Reserves an SSE slot; `None` once `MAX_SSE_CONNECTIONS` streams are open.
    pub fn try_acquire_sse(&self) -> Option<SseConnectionGuard> {
        let max = self.config.limits.max_sse_connections;
        self.sse_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |open| {
                (open < max).then_some(open + 1)
            })
            .ok()
            .map(|_| SseConnectionGuard {
                counter: self.sse_connections.clone(),
            })
    }

    pub fn sse_connections(&self) -> usize {
        self.sse_connections.load(Ordering::Acquire)
    }
}

/// Releases the SSE slot when the stream is dropped.
pub struct SseConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for SseConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}
