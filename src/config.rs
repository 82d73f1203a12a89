//! Watch configuration
//!
//! Loaded from TOML at startup, falls back to defaults if the file is missing
//! or does not parse. Every section carries `serde(default)` so a partial file
//! only overrides what it names.

use fieldwatch_client::{HttpSource, PanelSpec, StreamConfig, DEFAULT_REQUEST_TIMEOUT};
use fieldwatch_core::{Breakpoint, Error, PanelKey, TierSpec, TierTable, VALIDATION_HISTORY_CAP};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Top-level watch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Polled panels, rendered in key order.
    pub panels: Vec<PanelConfig>,
    /// Custom tier tables, referenced by name from `panels[].tiers`.
    pub tables: Vec<TableConfig>,
    pub stream: StreamSection,
    pub action: ActionSection,
    pub tracker: TrackerSection,
    pub poller: PollerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub name: String,
    pub endpoint: String,
    /// Dotted path of the numeric field, e.g. `metrics.stability`.
    pub field: String,
    pub label_field: Option<String>,
    pub interval_ms: u64,
    pub enabled: bool,
    pub history_cap: usize,
    /// Built-in (`coherence`, `balance`) or a `[[tables]]` name.
    pub tiers: String,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            name: "coherence".into(),
            endpoint: "http://127.0.0.1:8000/api/coherence".into(),
            field: "coherence".into(),
            label_field: None,
            interval_ms: 3000,
            enabled: true,
            history_cap: VALIDATION_HISTORY_CAP,
            tiers: "coherence".into(),
        }
    }
}

/// A user-defined tier table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    pub default: TierSpec,
    #[serde(default)]
    pub breakpoints: Vec<Breakpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSection {
    pub enabled: bool,
    pub url: String,
    /// Panel that receives pushed updates.
    pub panel: String,
    pub reconnect_delay_ms: u64,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "ws://127.0.0.1:8000/ws".into(),
            panel: "balance".into(),
            reconnect_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionSection {
    pub endpoint: String,
    pub user_id: String,
    pub timeout_ms: u64,
}

impl Default for ActionSection {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/chat".into(),
            user_id: "default".into(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSection {
    /// Show a panel as stale once its last success is older than this.
    /// Unset means staleness follows poll outcomes only.
    pub stale_after_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerSection {
    /// Discard responses that land after a newer one was applied.
    pub sequenced: bool,
    pub request_timeout_ms: u64,
}

impl Default for PollerSection {
    fn default() -> Self {
        Self {
            sequenced: false,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            panels: vec![
                PanelConfig::default(),
                PanelConfig {
                    name: "balance".into(),
                    endpoint: "http://127.0.0.1:8000/api/quantum/balance".into(),
                    field: "stability".into(),
                    interval_ms: 5000,
                    tiers: "balance".into(),
                    ..PanelConfig::default()
                },
            ],
            tables: Vec::new(),
            stream: StreamSection::default(),
            action: ActionSection::default(),
            tracker: TrackerSection::default(),
            poller: PollerSection::default(),
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl WatchConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Strict parse: syntax errors and unknown tier tables are both rejected.
    pub fn parse(content: &str) -> fieldwatch_core::Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current config as TOML (for `dump-config`).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn validate(&self) -> fieldwatch_core::Result<()> {
        let mut seen = std::collections::HashSet::new();
        for panel in &self.panels {
            if !seen.insert(panel.name.as_str()) {
                return Err(Error::config(format!("duplicate panel '{}'", panel.name)));
            }
            if panel.interval_ms == 0 {
                return Err(Error::config(format!("panel '{}': interval_ms must be > 0", panel.name)));
            }
            self.tier_table(&panel.tiers)?;
        }
        Ok(())
    }

    /// Resolve a tier table by name: custom tables shadow built-ins.
    pub fn tier_table(&self, name: &str) -> fieldwatch_core::Result<TierTable> {
        if let Some(custom) = self.tables.iter().find(|t| t.name == name) {
            return TierTable::new(&custom.name, custom.breakpoints.clone(), custom.default.clone());
        }
        TierTable::builtin(name).ok_or_else(|| Error::config(format!("unknown tier table '{}'", name)))
    }

    pub fn stale_after(&self) -> Option<Duration> {
        self.tracker.stale_after_ms.map(Duration::from_millis)
    }

    /// Build the mount spec for one configured panel.
    pub fn panel_spec(&self, panel: &PanelConfig) -> fieldwatch_core::Result<PanelSpec> {
        let source = HttpSource::with_timeout(
            &panel.endpoint,
            Duration::from_millis(self.poller.request_timeout_ms),
        )?;
        Ok(PanelSpec {
            key: PanelKey::new(&panel.name),
            source: Arc::new(source),
            field: panel.field.clone(),
            label_field: panel.label_field.clone(),
            interval: Duration::from_millis(panel.interval_ms),
            enabled: panel.enabled,
            history_cap: panel.history_cap,
            sequenced: self.poller.sequenced,
            stale_after: self.stale_after(),
        })
    }

    pub fn stream_config(&self) -> Option<StreamConfig> {
        if !self.stream.enabled {
            return None;
        }
        let mut config = StreamConfig::new(&self.stream.url);
        config.reconnect_delay = Duration::from_millis(self.stream.reconnect_delay_ms);
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_both_pages() {
        let config = WatchConfig::default();
        let names: Vec<&str> = config.panels.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["coherence", "balance"]);
        assert!(config.validate().is_ok());
        assert!(config.stream_config().is_none());
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let config = WatchConfig::parse(
            r#"
            [poller]
            sequenced = true

            [[panels]]
            name = "ratio"
            endpoint = "http://localhost:9000/status"
            field = "metrics.ratio"
            tiers = "balance"
            "#,
        )
        .unwrap();
        assert!(config.poller.sequenced);
        assert_eq!(config.poller.request_timeout_ms, 10_000);
        assert_eq!(config.panels.len(), 1);
        assert_eq!(config.panels[0].interval_ms, 3000);
        assert_eq!(config.panels[0].history_cap, VALIDATION_HISTORY_CAP);
    }

    #[test]
    fn unknown_table_is_rejected() {
        let err = WatchConfig::parse(
            r#"
            [[panels]]
            name = "x"
            tiers = "nope"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown tier table"));
    }

    #[test]
    fn custom_table_is_validated_and_shadows_builtin() {
        let ok = WatchConfig::parse(
            r#"
            [[tables]]
            name = "coherence"
            default = { tier = 1, label = "low" }

            [[tables.breakpoints]]
            above = 0.5
            tier = 2
            label = "high"
            "#,
        )
        .unwrap();
        let table = ok.tier_table("coherence").unwrap();
        assert_eq!(table.classify(0.6).label, "high");
        assert_eq!(table.classify(0.96).label, "high");

        let bad = WatchConfig::parse(
            r#"
            [[tables]]
            name = "coherence"
            default = { tier = 1, label = "low" }

            [[tables.breakpoints]]
            above = 0.2
            tier = 2
            label = "a"

            [[tables.breakpoints]]
            above = 0.8
            tier = 3
            label = "b"
            "#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn dump_round_trips() {
        let config = WatchConfig::default();
        let parsed = WatchConfig::parse(&config.to_toml()).unwrap();
        assert_eq!(parsed.panels.len(), 2);
        assert_eq!(parsed.panels[1].field, "stability");
        assert_eq!(parsed.stream.reconnect_delay_ms, 5000);
    }
}
