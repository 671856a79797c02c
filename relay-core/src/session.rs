//! ChatKit session client.
//!
//! Provides a `SessionBackend` trait for issuing and refreshing ChatKit client
//! secrets, and `ChatKitClient`, which calls the hosted sessions API over HTTPS.
//! Each operation is exactly one upstream request with no retry.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::UpstreamConfig;

/// Public sessions API endpoint, used unless `OPENAI_BASE` overrides it.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const SESSIONS_PATH: &str = "/v1/chatkit/sessions";
const REFRESH_PATH: &str = "/v1/chatkit/sessions/refresh";

const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_HEADER_VALUE: &str = "chatkit_beta=v1";

// ============================================================================
// SessionBackend trait
// ============================================================================

/// Abstraction over whatever issues session credentials.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Start a session for `user` and return its client secret.
    async fn create_session(&self, user: &str) -> Result<String, SessionError>;

    /// Exchange an expiring client secret for a new one.
    async fn refresh_session(&self, client_secret: &str) -> Result<String, SessionError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum SessionError {
    /// Network failure, timeout, or an unreadable response body.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Upstream response did not contain a client_secret")]
    MissingClientSecret,

    #[error("Missing 'currentClientSecret'")]
    MissingCurrentSecret,

    #[error("Missing API key")]
    MissingApiKey,
}

impl SessionError {
    /// True when the caller sent an incomplete request; everything else is a
    /// server-side failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, SessionError::MissingCurrentSecret)
    }

    /// Text relayed to the caller. Upstream bodies pass through verbatim.
    pub fn caller_message(&self) -> String {
        match self {
            SessionError::Upstream { body, .. } => body.clone(),
            other => error_chain(other),
        }
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

// ============================================================================
// Wire types (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    workflow: WorkflowRef<'a>,
    user: &'a str,
}

#[derive(Debug, Serialize)]
struct WorkflowRef<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshSessionRequest<'a> {
    client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(default)]
    client_secret: Option<String>,
}

// ============================================================================
// ChatKitClient
// ============================================================================

/// Calls the ChatKit sessions API with the service credential.
#[derive(Clone)]
pub struct ChatKitClient {
    client: Client,
    api_key: String,
    workflow_id: String,
    base_url: String,
}

impl std::fmt::Debug for ChatKitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatKitClient")
            .field("workflow_id", &self.workflow_id)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ChatKitClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, SessionError> {
        if config.api_key.is_empty() {
            return Err(SessionError::MissingApiKey);
        }

        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            workflow_id: config.workflow_id.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_for_secret<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<String, SessionError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER, BETA_HEADER_VALUE)
            .json(body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), path, "ChatKit API error");
            return Err(SessionError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let session: SessionResponse = response.json().await?;

        match session.client_secret {
            Some(secret) if !secret.is_empty() => Ok(secret),
            _ => {
                tracing::error!(path, "ChatKit API response missing client_secret");
                Err(SessionError::MissingClientSecret)
            }
        }
    }
}

#[async_trait]
impl SessionBackend for ChatKitClient {
    async fn create_session(&self, user: &str) -> Result<String, SessionError> {
        let request = CreateSessionRequest {
            workflow: WorkflowRef {
                id: &self.workflow_id,
            },
            user,
        };
        self.post_for_secret(SESSIONS_PATH, &request).await
    }

    async fn refresh_session(&self, client_secret: &str) -> Result<String, SessionError> {
        if client_secret.is_empty() {
            return Err(SessionError::MissingCurrentSecret);
        }
        let request = RefreshSessionRequest { client_secret };
        self.post_for_secret(REFRESH_PATH, &request).await
    }

    fn name(&self) -> &str {
        "chatkit"
    }
}

// ============================================================================
// TESTS
// ============================================================================
