//! Connection manager: owns every live panel and the stream subscription
//!
//! Panels are attached (mounted) and detached (unmounted) explicitly. All
//! background work hangs off one root cancellation token, so dropping or
//! shutting down the manager tears everything down.

use crate::live::{LiveSnapshot, LiveTelemetry};
use crate::poller::{Poller, PollerConfig};
use crate::source::StatusSource;
use crate::stream::{FieldHandler, FieldStream, StreamConfig};
use dashmap::DashMap;
use fieldwatch_core::{Error, PanelKey, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Everything needed to mount one panel.
pub struct PanelSpec {
    pub key: PanelKey,
    pub source: Arc<dyn StatusSource>,
    /// Dotted path of the numeric field in the status body.
    pub field: String,
    pub label_field: Option<String>,
    pub interval: Duration,
    pub enabled: bool,
    pub history_cap: usize,
    pub sequenced: bool,
    pub stale_after: Option<Duration>,
}

/// A mounted panel.
pub struct PanelHandle {
    pub live: Arc<LiveTelemetry>,
    poller: Poller,
}

impl PanelHandle {
    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }
}

/// The stream subscription and the panel it feeds, if it feeds one.
struct StreamSlot {
    stream: FieldStream,
    target: Option<PanelKey>,
}

pub struct ConnectionManager {
    id: uuid::Uuid,
    root: CancellationToken,
    panels: DashMap<PanelKey, PanelHandle>,
    stream: Mutex<Option<StreamSlot>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            root: CancellationToken::new(),
            panels: DashMap::new(),
            stream: Mutex::new(None),
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    /// Mount a panel and start its poller (if enabled).
    pub fn attach_panel(&self, spec: PanelSpec) -> Result<Arc<LiveTelemetry>> {
        if self.root.is_cancelled() {
            return Err(Error::ConnectionClosed("connection manager is shut down".into()));
        }
        if self.panels.contains_key(&spec.key) {
            return Err(Error::config(format!("panel '{}' is already attached", spec.key)));
        }

        let mut live = LiveTelemetry::new(spec.key.clone(), spec.field, spec.history_cap)
            .with_sequencing(spec.sequenced)
            .with_stale_after(spec.stale_after);
        if let Some(label_field) = spec.label_field {
            live = live.with_label_field(label_field);
        }
        let live = Arc::new(live);

        let poller = Poller::spawn(
            spec.source,
            live.clone(),
            PollerConfig {
                interval: spec.interval,
                enabled: spec.enabled,
            },
            &self.root,
        )?;

        info!("[{}] panel '{}' attached", self.id, spec.key);
        self.panels.insert(
            spec.key,
            PanelHandle {
                live: live.clone(),
                poller,
            },
        );
        Ok(live)
    }

    /// Unmount a panel. Waits until neither its poller nor a stream routed
    /// into it can touch its state any more. Returns false if the panel was
    /// not attached.
    pub async fn detach_panel(&self, key: &PanelKey) -> bool {
        let Some((_, mut handle)) = self.panels.remove(key) else {
            return false;
        };
        handle.live.close().await;
        handle.poller.shutdown().await;

        let mut slot = self.stream.lock().await;
        if slot.as_ref().is_some_and(|s| s.target.as_ref() == Some(key)) {
            if let Some(mut routed) = slot.take() {
                routed.stream.shutdown().await;
                info!("[{}] stream into '{}' shut down", self.id, key);
            }
        }
        drop(slot);

        info!("[{}] panel '{}' detached", self.id, key);
        true
    }

    pub fn panel(&self, key: &PanelKey) -> Option<Arc<LiveTelemetry>> {
        self.panels.get(key).map(|h| h.live.clone())
    }

    pub fn is_polling(&self, key: &PanelKey) -> bool {
        self.panels.get(key).is_some_and(|h| h.is_polling())
    }

    /// Toggle a panel's polling.
    pub fn set_enabled(&self, key: &PanelKey, enabled: bool) -> Result<()> {
        let mut handle = self
            .panels
            .get_mut(key)
            .ok_or_else(|| Error::config(format!("no panel '{}'", key)))?;
        handle.poller.set_enabled(enabled);
        Ok(())
    }

    pub fn panel_keys(&self) -> Vec<PanelKey> {
        let mut keys: Vec<PanelKey> = self.panels.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Snapshots of every panel, ordered by key.
    pub async fn snapshots(&self) -> Vec<LiveSnapshot> {
        let lives: Vec<Arc<LiveTelemetry>> = self
            .panel_keys()
            .iter()
            .filter_map(|k| self.panel(k))
            .collect();
        let mut out = Vec::with_capacity(lives.len());
        for live in lives {
            out.push(live.snapshot().await);
        }
        out
    }

    /// Subscribe to the field stream, feeding `handler`. Replaces any earlier
    /// subscription.
    pub async fn attach_stream(&self, config: StreamConfig, handler: Arc<dyn FieldHandler>) -> Result<()> {
        self.install_stream(config, handler, None).await
    }

    /// Route the stream into an attached panel. Detaching that panel later
    /// shuts the stream down with it.
    pub async fn attach_stream_to_panel(&self, config: StreamConfig, key: &PanelKey) -> Result<()> {
        let live = self
            .panel(key)
            .ok_or_else(|| Error::config(format!("stream target panel '{}' is not attached", key)))?;
        self.install_stream(config, live, Some(key.clone())).await
    }

    /// Panel the current stream feeds, if any.
    pub async fn stream_target(&self) -> Option<PanelKey> {
        self.stream.lock().await.as_ref().and_then(|s| s.target.clone())
    }

    pub async fn stream_running(&self) -> bool {
        self.stream.lock().await.as_ref().is_some_and(|s| s.stream.is_running())
    }

    async fn install_stream(
        &self,
        config: StreamConfig,
        handler: Arc<dyn FieldHandler>,
        target: Option<PanelKey>,
    ) -> Result<()> {
        if self.root.is_cancelled() {
            return Err(Error::ConnectionClosed("connection manager is shut down".into()));
        }
        let url = config.url.clone();
        let stream = FieldStream::spawn(config, handler, &self.root)?;
        let previous = self.stream.lock().await.replace(StreamSlot { stream, target });
        if let Some(mut previous) = previous {
            previous.stream.shutdown().await;
        }
        info!("[{}] stream attached: {}", self.id, url);
        Ok(())
    }

    /// Tear everything down and wait for it.
    pub async fn shutdown(&self) {
        self.root.cancel();
        for key in self.panel_keys() {
            self.detach_panel(&key).await;
        }
        if let Some(mut slot) = self.stream.lock().await.take() {
            slot.stream.shutdown().await;
        }
        info!("[{}] connection manager shut down", self.id);
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
