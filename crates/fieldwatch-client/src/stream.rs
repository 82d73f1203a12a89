//! Field stream subscription over WebSocket
//!
//! Frames are decoded into `FieldMessage` and dispatched through an exhaustive
//! match. Unknown kinds are logged and dropped. When the socket closes or
//! errors, the handler is told and the subscription reconnects after a fixed
//! delay until it is shut down.

use fieldwatch_core::{CoherenceUpdate, Error, ErrorNotice, FieldMessage, Result, SystemNotice};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMsg};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Callbacks for decoded stream messages.
#[async_trait::async_trait]
pub trait FieldHandler: Send + Sync {
    async fn on_coherence(&self, update: CoherenceUpdate);
    async fn on_system(&self, notice: SystemNotice);
    async fn on_error_notice(&self, notice: ErrorNotice);
    async fn on_disconnect(&self, reason: &Error);
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    pub reconnect_delay: Duration,
}

impl StreamConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Route one message to the matching callback.
pub async fn dispatch(handler: &dyn FieldHandler, message: FieldMessage) {
    match message {
        FieldMessage::CoherenceUpdate(update) => handler.on_coherence(update).await,
        FieldMessage::System(notice) => handler.on_system(notice).await,
        FieldMessage::Error(notice) => handler.on_error_notice(notice).await,
        FieldMessage::Unknown { kind, .. } => {
            warn!("dropping field message of unknown type '{}'", kind);
        }
    }
}

/// Turn raw socket frames into decoded messages.
///
/// Ends on a close frame or when the socket ends. Socket errors are yielded
/// once and end the stream; undecodable text frames are yielded as parse
/// errors and the stream continues.
pub fn decode_frames<S, E>(frames: S) -> impl Stream<Item = Result<FieldMessage>> + Send
where
    S: Stream<Item = std::result::Result<WsMsg, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        tokio::pin!(frames);
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(WsMsg::Text(text)) => yield FieldMessage::decode(&text),
                Ok(WsMsg::Close(_)) => {
                    yield Err(Error::ConnectionClosed("closed by server".into()));
                    break;
                }
                Ok(_) => {} // Binary, Ping, Pong
                Err(e) => {
                    yield Err(Error::network(e.to_string()));
                    break;
                }
            }
        }
    }
}

/// A running subscription.
pub struct FieldStream {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl FieldStream {
    pub fn spawn(config: StreamConfig, handler: Arc<dyn FieldHandler>, parent: &CancellationToken) -> Result<Self> {
        let parsed = url::Url::parse(&config.url)
            .map_err(|e| Error::config(format!("invalid stream url '{}': {}", config.url, e)))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(Error::config(format!("stream url '{}' is not ws(s)", config.url)));
        }
        if config.reconnect_delay.is_zero() {
            return Err(Error::config("stream reconnect delay must be greater than zero"));
        }
        let token = parent.child_token();
        let task = tokio::spawn(run(config, handler, token.clone()));
        Ok(Self { token, task })
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }

    pub async fn shutdown(&mut self) {
        self.token.cancel();
        if !self.task.is_finished() {
            let _ = (&mut self.task).await;
        }
    }
}

impl Drop for FieldStream {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run(config: StreamConfig, handler: Arc<dyn FieldHandler>, token: CancellationToken) {
    loop {
        let reason = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            r = session(&config.url, handler.as_ref()) => r,
        };
        if token.is_cancelled() {
            break;
        }
        warn!("field stream {} lost: {}", config.url, reason);
        handler.on_disconnect(&reason).await;

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }
    info!("field stream {} stopped", config.url);
}

/// One connection's lifetime. Returns why it ended.
async fn session(url: &str, handler: &dyn FieldHandler) -> Error {
    let (socket, _) = match connect_async(url).await {
        Ok(conn) => conn,
        Err(e) => return Error::network(format!("connect {}: {}", url, e)),
    };
    info!("field stream connected: {}", url);

    let messages = decode_frames(socket);
    tokio::pin!(messages);
    while let Some(item) = messages.next().await {
        match item {
            Ok(message) => {
                debug!("field message: {}", message.kind());
                dispatch(handler, message).await;
            }
            Err(e @ Error::Parse(_)) => warn!("skipping bad frame: {}", e),
            Err(e) => return e,
        }
    }
    Error::ConnectionClosed("stream ended".into())
}
