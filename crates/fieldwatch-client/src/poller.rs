//! Fixed-cadence status poller
//!
//! One interval per running poller. Every tick spawns an independent request;
//! requests may overlap and complete out of order, and each outcome is handed
//! to the handler as it lands. There is no backoff: a failing endpoint is
//! retried on the next tick, forever.
//!
//! Teardown cancels the loop token. A request that resolves after teardown is
//! dropped before it reaches the handler.

use crate::source::StatusSource;
use fieldwatch_core::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Receives poll outcomes. `seq` increases by one per request issued.
#[async_trait::async_trait]
pub trait PollHandler: Send + Sync {
    async fn on_success(&self, seq: u64, body: serde_json::Value);
    async fn on_failure(&self, seq: u64, error: Error);
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Start polling immediately on spawn.
    pub enabled: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(3000),
            enabled: true,
        }
    }
}

struct Running {
    token: CancellationToken,
    task: JoinHandle<()>,
}

pub struct Poller {
    source: Arc<dyn StatusSource>,
    handler: Arc<dyn PollHandler>,
    interval: Duration,
    parent: CancellationToken,
    seq: Arc<AtomicU64>,
    running: Option<Running>,
}

impl Poller {
    /// Create a poller and start it if `config.enabled`. Must be called from
    /// inside a tokio runtime.
    pub fn spawn(
        source: Arc<dyn StatusSource>,
        handler: Arc<dyn PollHandler>,
        config: PollerConfig,
        parent: &CancellationToken,
    ) -> Result<Self> {
        if config.interval.is_zero() {
            return Err(Error::config(format!(
                "poll interval for {} must be greater than zero",
                source.endpoint()
            )));
        }
        let mut poller = Self {
            source,
            handler,
            interval: config.interval,
            parent: parent.clone(),
            seq: Arc::new(AtomicU64::new(0)),
            running: None,
        };
        if config.enabled {
            poller.start();
        }
        Ok(poller)
    }

    /// Start polling: one request now, then one per interval. No-op while
    /// already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let token = self.parent.child_token();
        let task = tokio::spawn(run_loop(
            self.source.clone(),
            self.handler.clone(),
            self.interval,
            token.clone(),
            self.seq.clone(),
        ));
        self.running = Some(Running { token, task });
    }

    /// Stop polling without waiting. No new request is issued and in-flight
    /// requests are aborted, but one that is already inside the handler on
    /// another worker thread may still finish its write after this returns.
    /// Use [`Poller::shutdown`] to wait for that, or close the handler
    /// (see `LiveTelemetry::close`) so late writes are dropped.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.token.cancel();
            running.task.abort();
        }
    }

    /// Stop polling and wait until the loop and every in-flight request have
    /// finished.
    pub async fn shutdown(&mut self) {
        if let Some(running) = self.running.take() {
            running.token.cancel();
            let _ = running.task.await;
        }
    }

    /// Follow a UI toggle: flipping to true polls immediately.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.start();
        } else {
            self.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| !r.token.is_cancelled() && !r.task.is_finished())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of requests issued so far.
    pub fn requests_issued(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(
    source: Arc<dyn StatusSource>,
    handler: Arc<dyn PollHandler>,
    interval: Duration,
    token: CancellationToken,
    seq: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight = JoinSet::new();

    info!("poller started: {} every {:?}", source.endpoint(), interval);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let n = seq.fetch_add(1, Ordering::Relaxed) + 1;
                in_flight.spawn(poll_once(source.clone(), handler.clone(), token.clone(), n));
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
        }
    }

    in_flight.shutdown().await;
    info!("poller stopped: {}", source.endpoint());
}

async fn poll_once(
    source: Arc<dyn StatusSource>,
    handler: Arc<dyn PollHandler>,
    token: CancellationToken,
    seq: u64,
) {
    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        r = source.fetch() => r,
    };
    if token.is_cancelled() {
        return;
    }
    match outcome {
        Ok(body) => {
            debug!("poll #{} {} ok", seq, source.endpoint());
            handler.on_success(seq, body).await;
        }
        Err(e) => {
            warn!("poll #{} {} failed ({}): {}", seq, source.endpoint(), e.kind(), e);
            handler.on_failure(seq, e).await;
        }
    }
}
