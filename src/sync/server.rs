//! HTTP sync service.
//!
//! ## Endpoints
//!
//! - `POST /api/sync`: apply an owner-tagged [`SyncPayload`]
//!   - `200 {"status": "synced", "data": {...}}`
//!   - `403 {"error": "Unauthorized"}` when `userId` is not the owner
//!   - `500 {"error": "..."}` when the document cannot be persisted
//! - `POST /api/ai`: placeholder reply generator

use crate::config::ServerConfig;
use crate::error::{Result, ScarError};
use crate::responder::{AiRequest, AiResponse, spoken_time};
use crate::sync::{ErrorResponse, SyncPayload, SyncResponse, SyncStore};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use chrono::Local;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Shared state for axum handlers.
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SyncStore>>,
}

/// Build the service router around `store`.
pub fn router(store: SyncStore) -> Router {
    let state = AppState {
        store: Arc::new(Mutex::new(store)),
    };
    Router::new()
        .route("/api/sync", post(handle_sync))
        .route("/api/ai", post(handle_ai))
        .with_state(state)
}

/// Background HTTP server task.
pub struct SyncServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl SyncServer {
    /// Bind `{config.host}:{config.port}` (port `0` auto-assigns) and serve
    /// in a background tokio task.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(config: &ServerConfig, store: SyncStore) -> Result<Self> {
        let app = router(store);

        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| ScarError::Sync(format!("sync server bind failed: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| ScarError::Sync(format!("failed to get local addr: {e}")))?;

        info!("SCAR backend running on http://{addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("sync server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// The address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The port the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Whether the server task has stopped.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for SyncServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// `POST /api/sync`.
async fn handle_sync(State(state): State<AppState>, Json(payload): Json<SyncPayload>) -> Response {
    let mut store = match state.store.lock() {
        Ok(store) => store,
        Err(e) => return error_body(StatusCode::INTERNAL_SERVER_ERROR, format!("{e}")),
    };
    match store.apply_sync(payload) {
        Ok(data) => Json(SyncResponse {
            status: "synced".to_owned(),
            data: data.clone(),
        })
        .into_response(),
        Err(ScarError::Unauthorized) => {
            warn!("rejected sync from unrecognized identity");
            error_body(StatusCode::FORBIDDEN, "Unauthorized")
        }
        Err(e) => {
            warn!("sync failed: {e}");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Placeholder reply: the server time when asked for it, otherwise an echo.
pub fn server_reply(text: &str) -> String {
    if text.contains("time") {
        format!("Current server time is {}", spoken_time(&Local::now()))
    } else {
        format!("You said: {text}")
    }
}

/// `POST /api/ai`.
async fn handle_ai(Json(request): Json<AiRequest>) -> Json<AiResponse> {
    Json(AiResponse {
        response: server_reply(&request.text),
    })
}
