//! Action endpoint client: user messages posted to the field backend
//!
//! Input is validated before anything touches the network. Replies (and
//! failures) land in a bounded conversation log that renderers read.

use chrono::{DateTime, Utc};
use fieldwatch_core::{Balance, BoundedHistory, ChatReply, ChatRequest, Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Conversation entries kept for display.
pub const CONVERSATION_CAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Field,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Balance>,
}

impl ConversationEntry {
    fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            at: Utc::now(),
            balance: None,
        }
    }
}

pub struct ActionClient {
    client: Client,
    url: String,
    user_id: String,
    log: RwLock<BoundedHistory<ConversationEntry>>,
}

impl ActionClient {
    pub fn new(url: impl Into<String>, user_id: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        let parsed = url::Url::parse(&url).map_err(|e| Error::config(format!("invalid action endpoint '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::config(format!("action endpoint '{}' is not http(s)", url)));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            url,
            user_id: user_id.into(),
            log: RwLock::new(BoundedHistory::new(CONVERSATION_CAP)),
        })
    }

    /// Check a message before it is sent.
    pub fn validate(message: &str, user_resonance: Option<f64>) -> Result<()> {
        if message.trim().is_empty() {
            return Err(Error::user_input("message must not be empty"));
        }
        if let Some(r) = user_resonance {
            if !(0.0..=1.0).contains(&r) {
                return Err(Error::user_input(format!("resonance {} is outside 0..=1", r)));
            }
        }
        Ok(())
    }

    /// Post a message. On success both sides of the exchange are logged; on a
    /// remote failure a system entry records the error.
    pub async fn send(&self, message: &str, user_resonance: Option<f64>) -> Result<ChatReply> {
        Self::validate(message, user_resonance)?;

        let request = ChatRequest {
            message: message.trim().to_string(),
            user_id: self.user_id.clone(),
            user_resonance,
        };
        self.push(ConversationEntry::new(Speaker::User, request.message.clone())).await;

        match self.post(&request).await {
            Ok(reply) => {
                let mut entry = ConversationEntry::new(Speaker::Field, reply.response.clone());
                entry.balance = reply.stability.map(|s| Balance::new(s, reply.exploration.unwrap_or(1.0 - s)));
                self.push(entry).await;
                Ok(reply)
            }
            Err(e) => {
                warn!("action {} failed: {}", self.url, e);
                self.push(ConversationEntry::new(Speaker::System, format!("send failed: {}", e))).await;
                Err(e)
            }
        }
    }

    pub async fn conversation(&self) -> Vec<ConversationEntry> {
        self.log.read().await.snapshot()
    }

    pub async fn clear(&self) {
        self.log.write().await.clear();
    }

    async fn post(&self, request: &ChatRequest) -> Result<ChatReply> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let response = self
            .client
            .post(&self.url)
            .header("x-request-id", &request_id)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::network(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| Error::network(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::http(status.as_u16(), body));
        }
        info!("action {} -> {} ({})", self.url, status, request_id);
        serde_json::from_str(&body).map_err(|e| Error::parse(format!("action reply: {}", e)))
    }

    async fn push(&self, entry: ConversationEntry) {
        self.log.write().await.append(entry);
    }
}
