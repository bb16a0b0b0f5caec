//! HTTP receiver for GitHub webhook deliveries
//!
//! # Routes
//!
//! - `POST /webhook` - Verify, reconcile and store one delivery
//! - `GET /health` - Liveness check
//! - `GET /metrics` - Prometheus text exposition

use super::reconciler::{apply, Reconciler, WebhookEvent};
use super::signature::{verify_signature, SIGNATURE_HEADER};
use crate::config::MirrorConfig;
use crate::github::{GitHubApi, GitHubClient};
use crate::store::MirrorStore;
use crate::{metrics, MirrorError};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

const EVENT_HEADER: &str = "x-github-event";
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Signature doesn't match.")]
    SignatureMismatch,

    #[error("Missing X-GitHub-Event header")]
    MissingEvent,

    #[error("Invalid JSON payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error(transparent)]
    Mirror(#[from] MirrorError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::SignatureMismatch => StatusCode::FORBIDDEN,
            WebhookError::MissingEvent | WebhookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            WebhookError::Mirror(
                MirrorError::Api { .. }
                | MirrorError::Http(_)
                | MirrorError::RateLimited(_),
            ) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Webhook delivery failed");
        }

        (
            status,
            Json(json!({ "status": "error", "error": self.to_string() })),
        )
            .into_response()
    }
}

struct AppState {
    api: Arc<dyn GitHubApi>,
    store: Mutex<MirrorStore>,
    secret: Vec<u8>,
}

pub struct WebhookServer {
    state: Arc<AppState>,
}

impl WebhookServer {
    pub fn new(api: Arc<dyn GitHubApi>, store: MirrorStore, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            state: Arc::new(AppState {
                api,
                store: Mutex::new(store),
                secret: secret.into(),
            }),
        }
    }

    /// GitHub client, store and secret from configuration
    pub fn from_config(config: &MirrorConfig) -> crate::Result<Self> {
        let secret = config
            .webhook
            .secret
            .clone()
            .ok_or_else(|| MirrorError::Config("webhook.secret is not set".to_string()))?;
        let api: Arc<dyn GitHubApi> = Arc::new(GitHubClient::new(&config.github)?);
        let store = MirrorStore::open(&config.store)?;
        Ok(Self::new(api, store, secret))
    }

    fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/webhook", post(receive_delivery))
            .route("/health", get(health))
            .route("/metrics", get(prometheus_metrics))
            .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
            .with_state(state)
    }

    /// Serve until Ctrl-C
    pub async fn run(self, addr: &str) -> Result<(), WebhookError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| WebhookError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        tracing::info!(addr, "Webhook server listening");

        axum::serve(listener, Self::router(self.state))
            .with_graceful_shutdown(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Shutting down webhook server");
                }
            })
            .await?;
        Ok(())
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn prometheus_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::encode_metrics(),
    )
}

async fn receive_delivery(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !verify_signature(&body, signature, &state.secret) {
        tracing::warn!("Rejected delivery with bad signature");
        metrics::record_delivery("unknown", "rejected");
        return Err(WebhookError::SignatureMismatch);
    }

    let event = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(WebhookEvent::parse)
        .ok_or(WebhookError::MissingEvent)?;
    let payload: Value = serde_json::from_slice(&body)?;

    let action = payload.get("action").and_then(Value::as_str).unwrap_or("-");
    tracing::debug!(event = event.as_str(), action, "Received delivery");

    let delivery = match Reconciler::new(state.api.as_ref())
        .resolve_delivery(&event, &payload)
        .await
    {
        Ok(delivery) => delivery,
        Err(e) => {
            metrics::record_delivery(event.as_str(), "failed");
            return Err(e.into());
        }
    };

    let outcome = {
        let store = state.store.lock().await;
        apply(&store, &event, delivery)?
    };

    let mut response = json!({ "status": "ok", "outcome": outcome.as_str() });
    if let Some(key) = outcome.key() {
        response["key"] = Value::String(key.to_string());
    }
    Ok(Json(response))
}
