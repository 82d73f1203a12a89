//! Error types for Fieldwatch

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("network error: {0}")]
    Network(String),

    #[error("http error: {status} - {body}")]
    Http { status: u16, body: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid input: {0}")]
    UserInput(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn user_input(message: impl Into<String>) -> Self {
        Self::UserInput(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Short machine-readable kind, used in log fields and status badges.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Http { .. } => "http",
            Self::Parse(_) | Self::Json(_) => "parse",
            Self::UserInput(_) => "user_input",
            Self::Config(_) => "config",
            Self::ConnectionClosed(_) => "closed",
            Self::Io(_) => "io",
        }
    }

    /// Whether the error came from the transport/server side rather than from
    /// local input or configuration.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Http { .. } | Self::Parse(_) | Self::Json(_) | Self::ConnectionClosed(_)
        )
    }
}
