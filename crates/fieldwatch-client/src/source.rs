//! Status sources: where a poller gets its JSON from

use fieldwatch_core::{Error, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Something that can be asked for the current status body.
#[async_trait::async_trait]
pub trait StatusSource: Send + Sync {
    /// Human-readable endpoint, for logs.
    fn endpoint(&self) -> &str;

    /// Fetch and parse one status body.
    async fn fetch(&self) -> Result<serde_json::Value>;
}

/// Per-request timeout used by [`HttpSource::new`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// GET-over-HTTP status source.
pub struct HttpSource {
    client: Client,
    url: String,
    timeout: Option<Duration>,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Source with a per-request timeout. A timed-out request counts as a
    /// network error.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("http client: {}", e)))?;
        let mut source = Self::with_client(client, url)?;
        source.timeout = Some(timeout);
        Ok(source)
    }

    /// Source over a caller-built client. Its timeout settings are the
    /// caller's business.
    pub fn with_client(client: Client, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let parsed = url::Url::parse(&url).map_err(|e| Error::config(format!("invalid endpoint '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::config(format!("endpoint '{}' is not http(s)", url)));
        }
        Ok(Self {
            client,
            url,
            timeout: None,
        })
    }

    /// Per-request timeout, when this source set one.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait::async_trait]
impl StatusSource for HttpSource {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(&self.url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::network(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| Error::network(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::http(status.as_u16(), truncate(&body, 200)));
        }

        debug!("GET {} -> {} ({} bytes)", self.url, status, body.len());
        serde_json::from_str(&body).map_err(|e| Error::parse(format!("{}: {}", self.url, e)))
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
