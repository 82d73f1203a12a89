//! End-to-end tests: mock field server, panels, stream, action client, config

use fieldwatch::config::{PanelConfig, WatchConfig};
use fieldwatch::{mock, watch};
use fieldwatch_client::{ActionClient, ConnectionManager, LiveSnapshot, LiveTelemetry, Speaker};
use fieldwatch_core::{Balance, PanelKey, TierTable};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

async fn wait_for(live: &Arc<LiveTelemetry>, done: impl Fn(&LiveSnapshot) -> bool) -> LiveSnapshot {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snap = live.snapshot().await;
            if done(&snap) {
                return snap;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .expect("condition not reached in time")
}

fn panel(name: &str, url: String, field: &str, interval_ms: u64, tiers: &str) -> PanelConfig {
    PanelConfig {
        name: name.into(),
        endpoint: url,
        field: field.into(),
        interval_ms,
        tiers: tiers.into(),
        ..PanelConfig::default()
    }
}

// ============================================================
// Polling end to end
// ============================================================

#[tokio::test]
async fn coherence_panel_tiers_then_goes_stale_on_500() {
    let (addr, state, _server) = mock::spawn_local().await.unwrap();
    let config = WatchConfig {
        panels: vec![panel(
            "coherence",
            format!("http://{}/api/coherence", addr),
            "coherence",
            100,
            "balance",
        )],
        ..WatchConfig::default()
    };
    let manager = ConnectionManager::new();
    let tables = watch::mount(&config, &manager).await.unwrap();
    let live = manager.panel(&PanelKey::new("coherence")).unwrap();

    let snap = wait_for(&live, |s| s.value() == Some(0.751) && s.connected).await;
    assert_eq!(TierTable::balance().classify(snap.value().unwrap()).label, "stability");
    assert_eq!(snap.extra["phase"], "forming");
    let lines = watch::status_lines(&manager, &tables).await;
    assert!(lines[0].contains("stability"), "{}", lines[0]);

    state.fail_with(Some(500)).await;
    let snap = wait_for(&live, |s| !s.connected).await;
    assert_eq!(snap.value(), Some(0.751));
    assert_eq!(snap.badge, "disconnected");
    assert!(snap.last_error.as_deref().unwrap().contains("500"));

    let lines = watch::status_lines(&manager, &tables).await;
    assert!(lines[0].contains("disconnected"));
    assert!(lines[0].contains("0.751"));

    // Recovery on the next tick.
    state.set_coherence(0.97).await;
    state.fail_with(None).await;
    let snap = wait_for(&live, |s| s.connected && s.value() == Some(0.97)).await;
    assert_eq!(TierTable::coherence().classify(snap.value().unwrap()).label, "transcendent");

    manager.shutdown().await;
}

#[tokio::test]
async fn nested_field_and_schema_mismatch() {
    let (addr, _state, _server) = mock::spawn_local().await.unwrap();
    let config = WatchConfig {
        panels: vec![
            panel("ratio", format!("http://{}/api/quantum/balance", addr), "ratio", 100, "coherence"),
            panel("missing", format!("http://{}/api/coherence", addr), "metrics.value", 100, "coherence"),
        ],
        ..WatchConfig::default()
    };
    let manager = ConnectionManager::new();
    watch::mount(&config, &manager).await.unwrap();

    let ratio = manager.panel(&PanelKey::new("ratio")).unwrap();
    let snap = wait_for(&ratio, |s| s.value().is_some()).await;
    assert!((snap.value().unwrap() - 3.0).abs() < 1e-9);
    assert_eq!(snap.extra["status"], "optimal");

    let missing = manager.panel(&PanelKey::new("missing")).unwrap();
    let snap = wait_for(&missing, |s| s.last_error.is_some()).await;
    assert!(snap.current.is_none());
    assert!(!snap.connected);

    manager.shutdown().await;
}

#[tokio::test]
async fn detached_panel_stops_hitting_server() {
    let (addr, state, _server) = mock::spawn_local().await.unwrap();
    let config = WatchConfig {
        panels: vec![panel("c", format!("http://{}/api/coherence", addr), "coherence", 50, "coherence")],
        ..WatchConfig::default()
    };
    let manager = ConnectionManager::new();
    watch::mount(&config, &manager).await.unwrap();
    let live = manager.panel(&PanelKey::new("c")).unwrap();
    wait_for(&live, |s| s.updates >= 2).await;

    assert!(manager.detach_panel(&PanelKey::new("c")).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let hits = state.hits();
    let updates = live.snapshot().await.updates;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(state.hits(), hits);
    assert_eq!(live.snapshot().await.updates, updates);
}

// ============================================================
// Stream end to end
// ============================================================

#[tokio::test]
async fn stream_pushes_balance_updates_into_panel() {
    let (addr, state, _server) = mock::spawn_local().await.unwrap();
    let mut config = WatchConfig {
        panels: vec![panel(
            "balance",
            format!("http://{}/api/quantum/balance", addr),
            "stability",
            60_000,
            "balance",
        )],
        ..WatchConfig::default()
    };
    config.stream.enabled = true;
    config.stream.url = format!("ws://{}/ws", addr);
    config.stream.panel = "balance".into();
    config.stream.reconnect_delay_ms = 100;

    let manager = ConnectionManager::new();
    watch::mount(&config, &manager).await.unwrap();
    assert!(manager.stream_running().await);
    let live = manager.panel(&PanelKey::new("balance")).unwrap();

    // One poll plus the stream's hello notice.
    wait_for(&live, |s| s.updates >= 2).await;

    state.set_balance(Balance::new(0.55, 0.45)).await;
    let snap = wait_for(&live, |s| s.value() == Some(0.55)).await;
    assert_eq!(TierTable::balance().classify(0.55).label, "exploration");
    assert_eq!(snap.extra["exploration"], 0.45);
    assert_eq!(snap.extra["status"], "critical");

    manager.shutdown().await;
    assert!(!manager.stream_running().await);
}

#[tokio::test]
async fn detached_stream_target_stops_receiving_pushes() {
    let (addr, state, _server) = mock::spawn_local().await.unwrap();
    let mut config = WatchConfig {
        panels: vec![panel(
            "balance",
            format!("http://{}/api/quantum/balance", addr),
            "stability",
            60_000,
            "balance",
        )],
        ..WatchConfig::default()
    };
    config.stream.enabled = true;
    config.stream.url = format!("ws://{}/ws", addr);
    config.stream.panel = "balance".into();
    config.stream.reconnect_delay_ms = 100;

    let manager = ConnectionManager::new();
    watch::mount(&config, &manager).await.unwrap();
    let live = manager.panel(&PanelKey::new("balance")).unwrap();
    let before = wait_for(&live, |s| s.updates >= 2).await;

    assert!(manager.detach_panel(&PanelKey::new("balance")).await);
    assert!(!manager.stream_running().await);

    state.set_balance(Balance::new(0.55, 0.45)).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let after = live.snapshot().await;
    assert_eq!(after.updates, before.updates);
    assert_eq!(after.value(), before.value());
    assert_eq!(after.connected, before.connected);
    assert_eq!(after.notices, before.notices);
}

#[tokio::test]
async fn stream_to_unknown_panel_fails_mount() {
    let mut config = WatchConfig {
        panels: vec![],
        ..WatchConfig::default()
    };
    config.stream.enabled = true;
    config.stream.panel = "nowhere".into();
    let manager = ConnectionManager::new();
    assert!(watch::mount(&config, &manager).await.is_err());
}

// ============================================================
// Action client
// ============================================================

#[tokio::test]
async fn action_round_trip_logs_both_sides() {
    let (addr, _state, _server) = mock::spawn_local().await.unwrap();
    let client = ActionClient::new(format!("http://{}/chat", addr), "tester", Duration::from_secs(2)).unwrap();

    let reply = client.send("  hello field ", Some(0.8)).await.unwrap();
    assert!(reply.response.contains("hello field"));
    assert!(reply.response.contains("tester"));
    assert_eq!(reply.stability, Some(0.75));

    let log = client.conversation().await;
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].speaker, Speaker::User);
    assert_eq!(log[0].text, "hello field");
    assert_eq!(log[1].speaker, Speaker::Field);
    assert_eq!(log[1].balance.unwrap().ratio_label(), "3.00:1");
}

#[tokio::test]
async fn action_http_error_is_logged() {
    let (addr, _state, _server) = mock::spawn_local().await.unwrap();
    let client = ActionClient::new(format!("http://{}/nope", addr), "tester", Duration::from_secs(2)).unwrap();

    let err = client.send("hi", None).await.unwrap_err();
    assert_eq!(err.kind(), "http");
    let log = client.conversation().await;
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].speaker, Speaker::System);
    assert!(log[1].text.starts_with("send failed"));
}

#[tokio::test]
async fn mock_health_and_admin_hooks() {
    let (addr, _state, _server) = mock::spawn_local().await.unwrap();
    let http = reqwest::Client::new();

    let health: serde_json::Value = http
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");

    let status = http
        .post(format!("http://{}/admin/fail", addr))
        .json(&serde_json::json!({ "status": 503 }))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status.as_u16(), 204);

    let status = http
        .get(format!("http://{}/api/coherence", addr))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status.as_u16(), 503);
}

// ============================================================
// Config files
// ============================================================

#[test]
fn missing_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = WatchConfig::load(&dir.path().join("absent.toml"));
    assert_eq!(config.panels.len(), 2);
}

#[test]
fn invalid_config_falls_back_to_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[[panels]\nname = ").unwrap();
    let config = WatchConfig::load(file.path());
    assert_eq!(config.panels[0].name, "coherence");
    assert_eq!(config.panels[1].name, "balance");
}

#[test]
fn config_file_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[tracker]
stale_after_ms = 6000

[[panels]]
name = "ratio"
endpoint = "http://127.0.0.1:8000/api/quantum/balance"
field = "ratio"
interval_ms = 2000
enabled = false
history_cap = 5
"#
    )
    .unwrap();
    let config = WatchConfig::load(file.path());
    assert_eq!(config.panels.len(), 1);
    assert_eq!(config.panels[0].history_cap, 5);
    assert!(!config.panels[0].enabled);
    assert_eq!(config.stale_after(), Some(Duration::from_secs(6)));
}
