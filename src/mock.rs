//! Mock field server for local runs and end-to-end tests
//!
//! Serves the status, balance, chat and stream endpoints a field backend
//! exposes, plus `/admin/*` hooks to move the values and force failures.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fieldwatch_core::{Balance, ChatReply, ChatRequest, CoherenceUpdate, FieldMessage, SystemNotice};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

struct Field {
    coherence: f64,
    balance: Balance,
    /// When set, status endpoints answer with this code.
    fail_status: Option<u16>,
}

pub struct MockState {
    field: RwLock<Field>,
    hits: AtomicU64,
    stream_tx: broadcast::Sender<String>,
    started_at: std::time::Instant,
}

impl MockState {
    pub fn new() -> Self {
        let (stream_tx, _) = broadcast::channel(256);
        Self {
            field: RwLock::new(Field {
                coherence: 0.751,
                balance: Balance::default(),
                fail_status: None,
            }),
            hits: AtomicU64::new(0),
            stream_tx,
            started_at: std::time::Instant::now(),
        }
    }

    pub async fn set_coherence(&self, value: f64) {
        self.field.write().await.coherence = value;
    }

    /// Update the balance and push a `coherence_update` to stream clients.
    pub async fn set_balance(&self, balance: Balance) {
        self.field.write().await.balance = balance;
        self.broadcast(FieldMessage::CoherenceUpdate(update_for(&balance)));
    }

    /// Make status endpoints fail with `status` (None restores them).
    pub async fn fail_with(&self, status: Option<u16>) {
        self.field.write().await.fail_status = status;
    }

    /// Status requests served so far, failed ones included.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn broadcast(&self, message: FieldMessage) {
        match message.encode(Some(chrono::Utc::now().to_rfc3339())) {
            Ok(text) => {
                let _ = self.stream_tx.send(text);
            }
            Err(e) => warn!("mock: cannot encode {}: {}", message.kind(), e),
        }
    }

    async fn forced_failure(&self) -> Option<Response> {
        self.hits.fetch_add(1, Ordering::Relaxed);
        let status = self.field.read().await.fail_status?;
        let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Some((code, "forced failure").into_response())
    }
}

impl Default for MockState {
    fn default() -> Self {
        Self::new()
    }
}

fn update_for(balance: &Balance) -> CoherenceUpdate {
    CoherenceUpdate {
        status: Some(balance.status().to_string()),
        stability: balance.stability,
        exploration: Some(balance.exploration),
        ratio: balance.ratio(),
        timestamp: Some(chrono::Utc::now().to_rfc3339()),
    }
}

pub fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/api/coherence", get(coherence_handler))
        .route("/api/quantum/balance", get(balance_handler))
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/ws", get(ws_handler))
        .route("/admin/coherence", post(admin_coherence_handler))
        .route("/admin/balance", post(admin_balance_handler))
        .route("/admin/fail", post(admin_fail_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let state = Arc::new(MockState::new());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("fieldwatch mock v{} listening on {}", env!("CARGO_PKG_VERSION"), listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Serve on an ephemeral loopback port in the background.
pub async fn spawn_local() -> anyhow::Result<(SocketAddr, Arc<MockState>, JoinHandle<()>)> {
    let state = Arc::new(MockState::new());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = router(state.clone());
    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!("mock server stopped: {}", e);
        }
    });
    Ok((addr, state, task))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn coherence_handler(State(state): State<Arc<MockState>>) -> Response {
    if let Some(failure) = state.forced_failure().await {
        return failure;
    }
    let field = state.field.read().await;
    Json(serde_json::json!({
        "coherence": field.coherence,
        "phase": if field.coherence > 0.85 { "aligned" } else { "forming" },
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
    .into_response()
}

async fn balance_handler(State(state): State<Arc<MockState>>) -> Response {
    if let Some(failure) = state.forced_failure().await {
        return failure;
    }
    let balance = state.field.read().await.balance;
    Json(serde_json::json!({
        "stability": balance.stability,
        "exploration": balance.exploration,
        "ratio": balance.ratio(),
        "status": balance.status(),
    }))
    .into_response()
}

async fn health_handler(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "status_requests": state.hits(),
    }))
}

async fn chat_handler(State(state): State<Arc<MockState>>, Json(request): Json<ChatRequest>) -> Response {
    if request.message.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "message must not be empty").into_response();
    }
    let balance = state.field.read().await.balance;
    let reply = ChatReply {
        response: format!("Field received from {}: {}", request.user_id, request.message),
        stability: Some(balance.stability),
        exploration: Some(balance.exploration),
        ratio: balance.ratio(),
        extra: Default::default(),
    };
    Json(reply).into_response()
}

#[derive(Deserialize)]
struct CoherenceBody {
    value: f64,
}

async fn admin_coherence_handler(State(state): State<Arc<MockState>>, Json(body): Json<CoherenceBody>) -> StatusCode {
    state.set_coherence(body.value).await;
    StatusCode::NO_CONTENT
}

async fn admin_balance_handler(State(state): State<Arc<MockState>>, Json(balance): Json<Balance>) -> StatusCode {
    state.set_balance(balance).await;
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct FailBody {
    status: Option<u16>,
}

async fn admin_fail_handler(State(state): State<Arc<MockState>>, Json(body): Json<FailBody>) -> StatusCode {
    state.fail_with(body.status).await;
    StatusCode::NO_CONTENT
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<MockState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<MockState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut stream_rx = state.stream_tx.subscribe();

    let balance = state.field.read().await.balance;
    let hello = FieldMessage::System(SystemNotice {
        message: "Connected to field".into(),
        status: Some("connected".into()),
        stability: Some(balance.stability),
        exploration: Some(balance.exploration),
        ratio: balance.ratio(),
    });
    if let Ok(text) = hello.encode(Some(chrono::Utc::now().to_rfc3339())) {
        if ws_tx.send(WsMessage::Text(text)).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(WsMessage::Close(_))) | None => return,
                    Some(Err(e)) => {
                        warn!("mock ws error: {}", e);
                        return;
                    }
                    _ => {} // clients only listen
                }
            }
            event = stream_rx.recv() => {
                match event {
                    Ok(text) => {
                        if ws_tx.send(WsMessage::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => warn!("mock ws client lagged, dropped {}", n),
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }
    }
}
