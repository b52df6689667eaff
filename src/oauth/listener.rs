//! Usage: Process-wide OAuth callback listener, bound once and shared by all attempts.
//!
//! The listener only hands redirects to the registry; it never talks to the
//! provider or the credential store. Unknown and already-used state tokens get
//! the same generic response so a probing client cannot tell them apart.

use crate::oauth::registry::{PendingAuthRegistry, ResolveOutcome};
use crate::shared::error::AppResult;
use crate::shared::security::mask_token;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;

const SUCCESS_HTML: &str = "<html><body><h1>Авторизация прошла успешно</h1><p>Можете вернуться в Telegram.</p></body></html>";
const PROVIDER_ERROR_HTML: &str = "<html><body><h1>Авторизация отклонена</h1><p>Можете закрыть это окно и вернуться в Telegram.</p></body></html>";
const INVALID_STATE_HTML: &str = "<html><body><h1>Ссылка недействительна или устарела</h1><p>Запросите авторизацию в боте ещё раз.</p></body></html>";
const BAD_REQUEST_HTML: &str =
    "<html><body><h1>Некорректный запрос</h1></body></html>";

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug)]
pub struct BoundCallbackListener {
    listener: std::net::TcpListener,
    local_addr: SocketAddr,
}

impl BoundCallbackListener {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Bind the callback address. Done once at startup; the same bound socket
/// serves every authorization attempt for the process lifetime.
pub fn bind(host: &str, port: u16) -> AppResult<BoundCallbackListener> {
    let listener = std::net::TcpListener::bind((host, port))
        .map_err(|e| format!("SYSTEM_ERROR: oauth callback bind failed on {host}:{port}: {e}"))?;
    listener
        .set_nonblocking(true)
        .map_err(|e| format!("SYSTEM_ERROR: oauth callback listener setup failed: {e}"))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("SYSTEM_ERROR: oauth callback local_addr failed: {e}"))?;
    Ok(BoundCallbackListener {
        listener,
        local_addr,
    })
}

pub struct CallbackServerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl CallbackServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Graceful teardown: release the bound address and wait for the serve task.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(err) = (&mut self.task).await {
            if !err.is_cancelled() {
                tracing::warn!("oauth callback server task ended abnormally: {err}");
            }
        }
    }
}

/// Start serving redirects on the bound listener.
pub fn serve(
    bound: BoundCallbackListener,
    callback_path: &str,
    registry: Arc<PendingAuthRegistry>,
) -> AppResult<CallbackServerHandle> {
    let local_addr = bound.local_addr;
    let app = Router::new()
        .route(callback_path, get(handle_callback))
        .fallback(handle_unknown_path)
        .with_state(registry);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::from_std(bound.listener) {
            Ok(l) => l,
            Err(err) => {
                tracing::error!(addr = %local_addr, "oauth callback listener init failed: {err}");
                return;
            }
        };

        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        if let Err(err) = serve.await {
            tracing::error!(addr = %local_addr, "oauth callback server error: {err}");
        }
    });

    tracing::info!(addr = %local_addr, "oauth callback listener started");

    Ok(CallbackServerHandle {
        local_addr,
        shutdown: Some(shutdown_tx),
        task,
    })
}

async fn handle_callback(
    State(registry): State<Arc<PendingAuthRegistry>>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<&'static str>) {
    let Some(state) = params.state.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        tracing::debug!("oauth callback without state parameter");
        return (StatusCode::BAD_REQUEST, Html(BAD_REQUEST_HTML));
    };

    if let Some(error) = params.error.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let reason = match params
            .error_description
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(description) => format!("{error}: {description}"),
            None => error.to_string(),
        };
        return match registry.fail(state, &reason) {
            ResolveOutcome::Resolved => {
                tracing::info!(token = %mask_token(state), error, "provider denied authorization");
                (StatusCode::OK, Html(PROVIDER_ERROR_HTML))
            }
            // Generic response: do not reveal whether the token ever existed.
            ResolveOutcome::NotFound | ResolveOutcome::AlreadyResolved => {
                tracing::debug!(token = %mask_token(state), "error redirect for invalid or expired state");
                (StatusCode::BAD_REQUEST, Html(INVALID_STATE_HTML))
            }
        };
    }

    if let Some(code) = params.code.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        return match registry.resolve(state, code) {
            ResolveOutcome::Resolved => {
                tracing::info!(token = %mask_token(state), "authorization code received");
                (StatusCode::OK, Html(SUCCESS_HTML))
            }
            ResolveOutcome::NotFound | ResolveOutcome::AlreadyResolved => {
                tracing::debug!(token = %mask_token(state), "code redirect for invalid or expired state");
                (StatusCode::BAD_REQUEST, Html(INVALID_STATE_HTML))
            }
        };
    }

    tracing::debug!(token = %mask_token(state), "oauth callback missing code and error");
    (StatusCode::BAD_REQUEST, Html(BAD_REQUEST_HTML))
}

async fn handle_unknown_path() -> (StatusCode, Html<&'static str>) {
    (StatusCode::NOT_FOUND, Html(BAD_REQUEST_HTML))
}
