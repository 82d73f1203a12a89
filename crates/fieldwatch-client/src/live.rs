//! Per-panel live state: latest value, passthrough body, history, connection
//!
//! One `LiveTelemetry` exists per attached panel. It is fed by the panel's
//! poller and, optionally, by the field stream; both go through the same
//! success/failure paths.

use crate::poller::PollHandler;
use crate::stream::FieldHandler;
use crate::tracker::ConnectionTracker;
use chrono::{DateTime, Utc};
use fieldwatch_core::{
    merge_json, BoundedHistory, CoherenceUpdate, Error, ErrorNotice, PanelKey, Reading, SampleHistory,
    SystemNotice, TelemetrySample, ACTIVE_MODULE_SLOTS,
};
use std::time::Duration;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{debug, warn};

/// Read-only copy of a panel's state for rendering.
#[derive(Debug, Clone)]
pub struct LiveSnapshot {
    pub key: PanelKey,
    pub current: Option<TelemetrySample>,
    pub extra: serde_json::Value,
    pub history: Vec<TelemetrySample>,
    /// Most recent stream notices, oldest first.
    pub notices: Vec<String>,
    pub connected: bool,
    pub live: bool,
    pub badge: &'static str,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub updates: u64,
}

impl LiveSnapshot {
    pub fn value(&self) -> Option<f64> {
        self.current.as_ref().map(|s| s.value)
    }
}

struct LiveInner {
    current: Option<TelemetrySample>,
    extra: serde_json::Value,
    history: SampleHistory,
    notices: BoundedHistory<String>,
    tracker: ConnectionTracker,
    last_applied_seq: Option<u64>,
    updates: u64,
    closed: bool,
}

pub struct LiveTelemetry {
    key: PanelKey,
    field: String,
    label_field: Option<String>,
    sequenced: bool,
    inner: RwLock<LiveInner>,
}

impl LiveTelemetry {
    pub fn new(key: impl Into<PanelKey>, field: impl Into<String>, history_cap: usize) -> Self {
        Self {
            key: key.into(),
            field: field.into(),
            label_field: None,
            sequenced: false,
            inner: RwLock::new(LiveInner {
                current: None,
                extra: serde_json::Value::Object(Default::default()),
                history: SampleHistory::new(history_cap),
                notices: BoundedHistory::new(ACTIVE_MODULE_SLOTS),
                tracker: ConnectionTracker::new(None),
                last_applied_seq: None,
                updates: 0,
                closed: false,
            }),
        }
    }

    pub fn with_label_field(mut self, label_field: impl Into<String>) -> Self {
        self.label_field = Some(label_field.into());
        self
    }

    /// Drop responses older than the newest one already applied.
    pub fn with_sequencing(mut self, sequenced: bool) -> Self {
        self.sequenced = sequenced;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Option<Duration>) -> Self {
        self.inner.get_mut().tracker = ConnectionTracker::new(stale_after);
        self
    }

    pub fn key(&self) -> &PanelKey {
        &self.key
    }

    /// Stop accepting writes. Once this returns, no poll result, pushed
    /// frame or disconnect changes the state; reads keep working.
    pub async fn close(&self) {
        self.inner.write().await.closed = true;
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.read().await.closed
    }

    /// Apply a status body from request `seq`.
    pub async fn apply_body(&self, seq: u64, body: serde_json::Value) {
        let reading = Reading::extract(body, &self.field, self.label_field.as_deref());
        let Some(mut inner) = self.writable().await else {
            return;
        };
        if !self.accept_seq(&mut inner, seq) {
            return;
        }
        match reading {
            Ok(reading) => {
                let sample = TelemetrySample::observed(reading.value, reading.label);
                merge_json(&mut inner.extra, reading.extra);
                Self::record_sample(&mut inner, sample);
            }
            Err(e) => {
                warn!("[{}] schema mismatch: {}", self.key, e);
                inner.tracker.record_failure(&e);
            }
        }
    }

    /// Apply a failed request `seq`. The last value stays in place.
    pub async fn apply_failure(&self, seq: u64, error: &Error) {
        let Some(mut inner) = self.writable().await else {
            return;
        };
        if !self.accept_seq(&mut inner, seq) {
            return;
        }
        inner.tracker.record_failure(error);
    }

    /// Apply a value pushed over the stream (no sequence number).
    pub async fn apply_pushed(&self, value: f64, extra: serde_json::Value) {
        let Some(mut inner) = self.writable().await else {
            return;
        };
        merge_json(&mut inner.extra, extra);
        Self::record_sample(&mut inner, TelemetrySample::observed(value, None));
    }

    /// Mark the panel disconnected without touching the value.
    pub async fn mark_disconnected(&self, error: &Error) {
        if let Some(mut inner) = self.writable().await {
            inner.tracker.record_failure(error);
        }
    }

    /// Record a stream notice in the fixed slot list.
    pub async fn push_notice(&self, notice: impl Into<String>) {
        if let Some(mut inner) = self.writable().await {
            inner.notices.append(notice.into());
        }
    }

    pub async fn clear_history(&self) {
        self.inner.write().await.history.clear();
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.read().await.tracker.is_connected()
    }

    pub async fn snapshot(&self) -> LiveSnapshot {
        let inner = self.inner.read().await;
        let now = Utc::now();
        LiveSnapshot {
            key: self.key.clone(),
            current: inner.current.clone(),
            extra: inner.extra.clone(),
            history: inner.history.snapshot(),
            notices: inner.notices.snapshot(),
            connected: inner.tracker.is_connected(),
            live: inner.tracker.is_live(now),
            badge: inner.tracker.badge(now),
            last_success_at: inner.tracker.state().last_success_at,
            last_error: inner.tracker.last_error().map(str::to_string),
            updates: inner.updates,
        }
    }

    async fn writable(&self) -> Option<RwLockWriteGuard<'_, LiveInner>> {
        let inner = self.inner.write().await;
        if inner.closed {
            debug!("[{}] closed, dropping write", self.key);
            return None;
        }
        Some(inner)
    }

    fn accept_seq(&self, inner: &mut LiveInner, seq: u64) -> bool {
        if !self.sequenced {
            return true;
        }
        match inner.last_applied_seq {
            Some(last) if seq <= last => {
                debug!("[{}] discarding response #{} (already applied #{})", self.key, seq, last);
                false
            }
            _ => {
                inner.last_applied_seq = Some(seq);
                true
            }
        }
    }

    fn record_sample(inner: &mut LiveInner, sample: TelemetrySample) {
        inner.tracker.record_success(Utc::now());
        inner.history.append(sample.clone());
        inner.current = Some(sample);
        inner.updates += 1;
    }
}

#[async_trait::async_trait]
impl PollHandler for LiveTelemetry {
    async fn on_success(&self, seq: u64, body: serde_json::Value) {
        self.apply_body(seq, body).await;
    }

    async fn on_failure(&self, seq: u64, error: Error) {
        self.apply_failure(seq, &error).await;
    }
}

#[async_trait::async_trait]
impl FieldHandler for LiveTelemetry {
    async fn on_coherence(&self, update: CoherenceUpdate) {
        let extra = serde_json::to_value(&update).unwrap_or_default();
        self.apply_pushed(update.stability, extra).await;
    }

    async fn on_system(&self, notice: SystemNotice) {
        debug!("[{}] system: {}", self.key, notice.message);
        self.push_notice(notice.message.clone()).await;
        if let Some(stability) = notice.stability {
            let extra = serde_json::to_value(&notice).unwrap_or_default();
            self.apply_pushed(stability, extra).await;
        }
    }

    async fn on_error_notice(&self, notice: ErrorNotice) {
        warn!("[{}] field error: {}", self.key, notice.message);
        self.push_notice(format!("error: {}", notice.message)).await;
    }

    async fn on_disconnect(&self, reason: &Error) {
        self.mark_disconnected(reason).await;
    }
}
