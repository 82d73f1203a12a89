//! Mount configured panels onto a connection manager and print their status

use crate::config::WatchConfig;
use crate::render::status_line;
use fieldwatch_client::ConnectionManager;
use fieldwatch_core::{PanelKey, TierTable};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// Attach every configured panel (and the stream, if enabled). Returns the
/// tier table resolved for each panel.
pub async fn mount(
    config: &WatchConfig,
    manager: &ConnectionManager,
) -> fieldwatch_core::Result<HashMap<PanelKey, TierTable>> {
    let mut tables = HashMap::new();
    for panel in &config.panels {
        let table = config.tier_table(&panel.tiers)?;
        let spec = config.panel_spec(panel)?;
        let key = spec.key.clone();
        manager.attach_panel(spec)?;
        tables.insert(key, table);
    }
    if let Some(stream) = config.stream_config() {
        manager
            .attach_stream_to_panel(stream, &PanelKey::new(&config.stream.panel))
            .await?;
    }
    info!("mounted {} panel(s)", tables.len());
    Ok(tables)
}

/// Current status lines, one per panel in key order.
pub async fn status_lines(manager: &ConnectionManager, tables: &HashMap<PanelKey, TierTable>) -> Vec<String> {
    let fallback = TierTable::coherence();
    manager
        .snapshots()
        .await
        .iter()
        .map(|snap| status_line(snap, tables.get(&snap.key).unwrap_or(&fallback)))
        .collect()
}

/// Print status lines every `refresh` until ctrl-c.
pub async fn run_plain(
    manager: &ConnectionManager,
    tables: &HashMap<PanelKey, TierTable>,
    refresh: Duration,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(refresh);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                for line in status_lines(manager, tables).await {
                    println!("{}", line);
                }
            }
        }
    }
    Ok(())
}
