//! Fieldwatch Client - polling, streaming and action plumbing for live panels

pub mod action;
pub mod live;
pub mod manager;
pub mod poller;
pub mod source;
pub mod stream;
pub mod tracker;

pub use action::{ActionClient, ConversationEntry, Speaker};
pub use live::{LiveSnapshot, LiveTelemetry};
pub use manager::{ConnectionManager, PanelHandle, PanelSpec};
pub use poller::{PollHandler, Poller, PollerConfig};
pub use source::{HttpSource, StatusSource, DEFAULT_REQUEST_TIMEOUT};
pub use stream::{FieldHandler, FieldStream, StreamConfig};
pub use tracker::ConnectionTracker;
