//! ChatKit relay HTTP API
//!
//! Axum-based HTTP server that hands out ChatKit client secrets to the web
//! frontend.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function. The inner functions take a `SessionBackend` directly and are
//! testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET  /                     liveness check, plain "OK"
//! - POST /api/chatkit/start    create a session, returns `client_secret`
//! - POST /api/chatkit/refresh  refresh a session, returns `client_secret`

use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use relay_core::{resolve_user, RelayConfig, SessionBackend, SessionError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub backend: Arc<dyn SessionBackend>,
    pub config: RelayConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let cors = build_cors_layer(&state.config.http.allowed_origins);

    Router::new()
        .route("/", get(health_handler))
        .route("/api/chatkit/start", post(start_handler))
        .route("/api/chatkit/refresh", post(refresh_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    config: RelayConfig,
    backend: Arc<dyn SessionBackend>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState { backend, config });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("ChatKit relay listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

/// CORS for the browser frontend. Only the configured origins are allowed;
/// with none configured, no cross-origin request is allowed.
pub fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("CORS: Invalid origin in config: {}", origin);
                None
            })
        })
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS: No valid origins configured, cross-origin requests are denied");
        return CorsLayer::new();
    }

    tracing::info!("CORS: Allowing {} origin(s)", origins.len());
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct StartRequest {
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub current_client_secret: Option<String>,
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner start resolves the user id and creates an upstream session.
pub async fn start_inner(
    backend: &dyn SessionBackend,
    req: StartRequest,
) -> (StatusCode, serde_json::Value) {
    let anonymous = req.user.as_deref().map_or(true, str::is_empty);
    let user = resolve_user(req.user.as_deref());
    tracing::debug!(backend = backend.name(), anonymous, "Creating session");

    let result = backend.create_session(&user).await;
    session_result_to_http(result)
}

/// Inner refresh requires `currentClientSecret`, otherwise 400 without an
/// upstream call.
pub async fn refresh_inner(
    backend: &dyn SessionBackend,
    req: RefreshRequest,
) -> (StatusCode, serde_json::Value) {
    let current = match req.current_client_secret {
        Some(secret) if !secret.is_empty() => secret,
        _ => return session_result_to_http(Err(SessionError::MissingCurrentSecret)),
    };
    tracing::debug!(backend = backend.name(), "Refreshing session");

    let result = backend.refresh_session(&current).await;
    session_result_to_http(result)
}

// ============================================================================
// Axum handler wrappers (thin: delegate to inner functions)
// ============================================================================

pub async fn health_handler() -> &'static str {
    "OK"
}

pub async fn start_handler(State(state): State<Arc<HttpState>>, body: Bytes) -> impl IntoResponse {
    let (status, body) = start_inner(state.backend.as_ref(), parse_lenient(&body)).await;
    (status, Json(body))
}

pub async fn refresh_handler(
    State(state): State<Arc<HttpState>>,
    body: Bytes,
) -> impl IntoResponse {
    let (status, body) = refresh_inner(state.backend.as_ref(), parse_lenient(&body)).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// Parse a JSON body, treating an empty, malformed, or mis-shaped body as `{}`.
pub fn parse_lenient<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    if body.is_empty() {
        return T::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Ignoring unparseable request body");
        T::default()
    })
}

/// Map a session outcome to `{"client_secret"}` or the `{"error"}` envelope.
pub fn session_result_to_http(
    result: std::result::Result<String, SessionError>,
) -> (StatusCode, serde_json::Value) {
    match result {
        Ok(client_secret) => (
            StatusCode::OK,
            serde_json::json!({ "client_secret": client_secret }),
        ),
        Err(e) if e.is_client_error() => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": e.caller_message() }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Session request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": e.caller_message() }),
            )
        }
    }
}

// ============================================================================
// Unit Tests: call inner functions directly against an in-memory backend
// ============================================================================
