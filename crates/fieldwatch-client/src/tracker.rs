//! Connection/staleness tracking for a live panel
//!
//! The flag only follows the latest outcome: a value fetched long ago still
//! shows as connected until the next request fails. `stale_after` adds an
//! opt-in age limit on top of that.

use chrono::{DateTime, Utc};
use fieldwatch_core::{ConnectionState, Error};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    state: ConnectionState,
    stale_after: Option<Duration>,
    last_error: Option<String>,
    failures: u64,
}

impl ConnectionTracker {
    pub fn new(stale_after: Option<Duration>) -> Self {
        Self {
            stale_after,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.state.record_success(at);
        self.last_error = None;
    }

    pub fn record_failure(&mut self, error: &Error) {
        self.state.record_failure();
        self.last_error = Some(error.to_string());
        self.failures += 1;
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected
    }

    /// Connected and, when an age limit is configured, recent enough.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        if !self.state.connected {
            return false;
        }
        match (self.stale_after, self.state.last_success_at) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(limit), Some(at)) => match chrono::Duration::from_std(limit) {
                Ok(limit) => now - at <= limit,
                Err(_) => true,
            },
        }
    }

    /// Badge text for renderers.
    pub fn badge(&self, now: DateTime<Utc>) -> &'static str {
        if self.is_live(now) {
            "connected"
        } else if self.state.connected {
            "stale"
        } else {
            "disconnected"
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }
}
