//! Plain-text rendering of panel snapshots

use fieldwatch_client::LiveSnapshot;
use fieldwatch_core::{Balance, TierTable};

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Badge glyph for a tracker badge string.
pub fn badge_glyph(badge: &str) -> &'static str {
    match badge {
        "connected" => "●",
        "stale" => "◐",
        _ => "○",
    }
}

/// Sparkline over `[0, 1]`. Out-of-range values are clamped.
pub fn sparkline(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| {
            if v.is_nan() {
                return ' ';
            }
            let idx = (v.clamp(0.0, 1.0) * (SPARK.len() - 1) as f64).round() as usize;
            SPARK[idx]
        })
        .collect()
}

/// Stability/exploration balance carried in the passthrough body, if any.
pub fn balance_of(snapshot: &LiveSnapshot) -> Option<Balance> {
    Balance::from_json(&snapshot.extra)
}

/// One status line per panel.
pub fn status_line(snapshot: &LiveSnapshot, table: &TierTable) -> String {
    let mut line = format!("[{}] {} {:<12}", snapshot.key, badge_glyph(snapshot.badge), snapshot.badge);

    match &snapshot.current {
        Some(sample) => {
            let tier = table.classify(sample.value);
            line.push_str(&format!(" {:.3} {} {}", sample.value, tier.emoji, tier.label));
            if let Some(label) = &sample.label {
                line.push_str(&format!(" ({})", label));
            }
        }
        None => line.push_str(" --"),
    }

    if let Some(balance) = balance_of(snapshot) {
        line.push_str(&format!(" ratio {} {}", balance.ratio_label(), balance.status()));
    }

    let values: Vec<f64> = snapshot.history.iter().map(|s| s.value).collect();
    if !values.is_empty() {
        line.push_str(&format!(" {}", sparkline(&values)));
    }

    if !snapshot.connected {
        if let Some(err) = &snapshot.last_error {
            line.push_str(&format!(" | {}", err));
        }
    }
    line
}
