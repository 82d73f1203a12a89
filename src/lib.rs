//! Fieldwatch - live telemetry panels over a field backend

pub mod config;
pub mod dashboard;
pub mod logging;
pub mod mock;
pub mod render;
pub mod watch;

pub use config::WatchConfig;
