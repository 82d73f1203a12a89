//! Threshold bucketing of telemetry values into display tiers
//!
//! A table is checked from the highest threshold down; the first threshold the
//! value strictly exceeds wins. Anything that qualifies for nothing, including
//! NaN and values outside `[0, 1]`, lands in the table's default tier.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Ordinal rank of a tier. Higher values mean a higher bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tier(pub u8);

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tier{}", self.0)
    }
}

/// Display attributes for one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSpec {
    pub tier: Tier,
    pub label: String,
    #[serde(default)]
    pub emoji: String,
    /// Colour name understood by the renderers (`green`, `yellow`, ...).
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    "gray".into()
}

impl TierSpec {
    pub fn new(tier: u8, label: &str, emoji: &str, color: &str) -> Self {
        Self {
            tier: Tier(tier),
            label: label.into(),
            emoji: emoji.into(),
            color: color.into(),
        }
    }
}

/// One breakpoint of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// The value must be strictly greater than this to qualify.
    pub above: f64,
    #[serde(flatten)]
    pub spec: TierSpec,
}

/// An ordered breakpoint table. Only built through [`TierTable::new`] or the
/// built-ins, so every table in use has been validated.
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    pub name: String,
    breakpoints: Vec<Breakpoint>,
    default: TierSpec,
}

impl TierTable {
    /// Build a table. Breakpoints must be finite, strictly descending, and
    /// their tiers must not decrease as thresholds rise.
    pub fn new(name: impl Into<String>, breakpoints: Vec<Breakpoint>, default: TierSpec) -> Result<Self> {
        let name = name.into();
        for bp in &breakpoints {
            if !bp.above.is_finite() {
                return Err(Error::config(format!("tier table '{}': non-finite threshold", name)));
            }
            if bp.spec.tier < default.tier {
                return Err(Error::config(format!(
                    "tier table '{}': {} ranks below the default tier",
                    name, bp.spec.label
                )));
            }
        }
        for pair in breakpoints.windows(2) {
            if pair[0].above <= pair[1].above {
                return Err(Error::config(format!(
                    "tier table '{}': thresholds must be strictly descending ({} then {})",
                    name, pair[0].above, pair[1].above
                )));
            }
            if pair[0].spec.tier < pair[1].spec.tier {
                return Err(Error::config(format!(
                    "tier table '{}': tier order does not follow thresholds",
                    name
                )));
            }
        }
        Ok(Self {
            name,
            breakpoints,
            default,
        })
    }

    /// The coherence badge table used by the validation pages.
    pub fn coherence() -> Self {
        Self {
            name: "coherence".into(),
            breakpoints: vec![
                bp(0.95, TierSpec::new(4, "transcendent", "🌟", "magenta")),
                bp(0.90, TierSpec::new(3, "harmonic", "✨", "green")),
                bp(0.85, TierSpec::new(2, "aligned", "🔆", "yellow")),
            ],
            default: TierSpec::new(1, "forming", "🌀", "red"),
        }
    }

    /// The 0.75-centred stability/exploration table.
    pub fn balance() -> Self {
        Self {
            name: "balance".into(),
            breakpoints: vec![
                bp(0.85, TierSpec::new(4, "rigidity", "🧊", "cyan")),
                bp(0.70, TierSpec::new(3, "stability", "⚖️", "green")),
                bp(0.50, TierSpec::new(2, "exploration", "🔭", "yellow")),
            ],
            default: TierSpec::new(1, "dissonance", "⚠️", "red"),
        }
    }

    /// Look up a built-in table by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "coherence" => Some(Self::coherence()),
            "balance" => Some(Self::balance()),
            _ => None,
        }
    }

    pub fn classify(&self, value: f64) -> &TierSpec {
        if !(0.0..=1.0).contains(&value) {
            return &self.default;
        }
        self.breakpoints
            .iter()
            .find(|bp| value > bp.above)
            .map(|bp| &bp.spec)
            .unwrap_or(&self.default)
    }

    pub fn tier(&self, value: f64) -> Tier {
        self.classify(value).tier
    }

    pub fn default_spec(&self) -> &TierSpec {
        &self.default
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }
}

fn bp(above: f64, spec: TierSpec) -> Breakpoint {
    Breakpoint { above, spec }
}
