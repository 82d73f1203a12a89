//! Stability/exploration balance as reported by the field backend
//!
//! The backend targets a 3:1 split (0.75 stability, 0.25 exploration) and
//! reports both halves alongside a rounded ratio.

use serde::{Deserialize, Serialize};

pub const DEFAULT_STABILITY: f64 = 0.75;
pub const DEFAULT_EXPLORATION: f64 = 0.25;

/// Stability distance from target that still counts as optimal.
const OPTIMAL_BAND: f64 = 0.05;
/// Stability distance from target that still counts as suboptimal.
const SUBOPTIMAL_BAND: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub stability: f64,
    pub exploration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceStatus {
    Critical,
    Suboptimal,
    Optimal,
}

impl std::fmt::Display for BalanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::Suboptimal => write!(f, "suboptimal"),
            Self::Optimal => write!(f, "optimal"),
        }
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self {
            stability: DEFAULT_STABILITY,
            exploration: DEFAULT_EXPLORATION,
        }
    }
}

impl Balance {
    pub fn new(stability: f64, exploration: f64) -> Self {
        Self { stability, exploration }
    }

    /// Read `stability`/`exploration` from a payload. Either half may be
    /// missing (the default fills in), but not both.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let stability = value.get("stability").and_then(|v| v.as_f64());
        let exploration = value.get("exploration").and_then(|v| v.as_f64());
        if stability.is_none() && exploration.is_none() {
            return None;
        }
        Some(Self {
            stability: stability.unwrap_or(DEFAULT_STABILITY),
            exploration: exploration.unwrap_or(DEFAULT_EXPLORATION),
        })
    }

    /// `stability / exploration`, or None when exploration is zero.
    pub fn ratio(&self) -> Option<f64> {
        if self.exploration == 0.0 || !self.exploration.is_finite() {
            None
        } else {
            Some(self.stability / self.exploration)
        }
    }

    /// `"3.00:1"`, or `"∞:1"` when the ratio is undefined.
    pub fn ratio_label(&self) -> String {
        match self.ratio() {
            Some(r) if r.is_finite() => format!("{:.2}:1", r),
            _ => "∞:1".to_string(),
        }
    }

    pub fn status(&self) -> BalanceStatus {
        if self.ratio().is_none() || !self.stability.is_finite() {
            return BalanceStatus::Critical;
        }
        let drift = (self.stability - DEFAULT_STABILITY).abs();
        if drift <= OPTIMAL_BAND {
            BalanceStatus::Optimal
        } else if drift <= SUBOPTIMAL_BAND {
            BalanceStatus::Suboptimal
        } else {
            BalanceStatus::Critical
        }
    }
}
