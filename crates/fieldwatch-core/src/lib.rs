//! Fieldwatch Core - telemetry types, formatting, history and wire protocol

pub mod balance;
pub mod error;
pub mod history;
pub mod protocol;
pub mod tier;
pub mod types;

pub use balance::{Balance, BalanceStatus};
pub use error::{Error, Result};
pub use history::{BoundedHistory, SampleHistory, ACTIVE_MODULE_SLOTS, VALIDATION_HISTORY_CAP};
pub use protocol::*;
pub use tier::{Breakpoint, Tier, TierSpec, TierTable};
pub use types::*;
