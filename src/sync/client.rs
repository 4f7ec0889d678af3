//! Remote sync backend.
//!
//! The engine only sees [`SyncClient`] and the classified [`ClientError`].
//! Retries, backoff, auth headers and timeouts live in [`HttpSyncClient`].

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::types::{
    EventRequest, InitRequest, InitResponse, SummaryUpdate, UploadChunkRequest,
    UploadChunkResponse,
};
use crate::config::ClientConfig;

/// Base delay before the first retry.
pub const BASE_DELAY_MS: u64 = 1000;

/// Longest error body kept in a `ClientError`.
const MAX_MESSAGE_CHARS: usize = 300;

/// Classified outcome of a failed remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// 401 or 403.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// 409.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other 4xx.
    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// 5xx after retries.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection-level failure after retries.
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Classify a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = truncate_message(body);
        match status {
            401 | 403 => Self::Unauthorized(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            500..=599 => Self::Server { status, message },
            _ => Self::Rejected { status, message },
        }
    }

    fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }

    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Whether the request may or may not have taken effect on the backend.
    ///
    /// Everything except unauthorized and not-found leaves the remote cursor
    /// in doubt.
    #[must_use]
    pub const fn is_ambiguous(&self) -> bool {
        !matches!(self, Self::Unauthorized(_) | Self::NotFound(_))
    }

    /// Whether the transport should try the same request again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) => true,
            Self::Server { status, message } | Self::Rejected { status, message } => {
                is_retryable_http_error(*status, message)
            }
            Self::Unauthorized(_) | Self::NotFound(_) | Self::Conflict(_) | Self::Decode(_) => false,
        }
    }
}

/// Result type for remote calls.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

fn truncate_message(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

fn retryable_status_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)rate.?limit|overloaded|service.?unavailable|upstream.?connect|connection.?refused")
            .expect("retry regex must compile")
    })
}

/// Status and error text retry policy.
#[must_use]
pub fn is_retryable_http_error(status: u16, error_text: &str) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504) || retryable_status_regex().is_match(error_text)
}

/// Exponential backoff delay for a retry attempt (0-based).
#[must_use]
pub fn retry_delay(attempt: u32) -> Duration {
    let exponent = attempt.min(30);
    Duration::from_millis(BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(exponent)))
}

/// Remote operations consumed by the sync engine.
///
/// Every call blocks until it completes or the transport gives up.
pub trait SyncClient {
    /// Open (or resume) the session for `external_id`.
    fn init(&self, request: &InitRequest) -> ClientResult<InitResponse>;

    /// Append lines to one file of the session.
    fn upload_chunk(&self, request: &UploadChunkRequest) -> ClientResult<UploadChunkResponse>;

    fn send_event(&self, request: &EventRequest) -> ClientResult<()>;

    /// Set the summary of a session, addressed by backend or external id.
    fn update_session_summary(&self, session_id: &str, summary: &str) -> ClientResult<()>;
}

/// JSON-over-HTTP implementation of [`SyncClient`].
pub struct HttpSyncClient {
    config: ClientConfig,
    base: Url,
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl HttpSyncClient {
    /// Build the client and its runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP stack cannot
    /// be initialized.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let base = Url::parse(&config.backend_url)
            .map_err(|e| ClientError::Transport(format!("invalid backend URL '{}': {e}", config.backend_url)))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Transport(format!(
                "backend URL '{}' cannot carry a path",
                config.backend_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to build HTTP client: {e}")))?;

        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| ClientError::Transport(format!("failed to create runtime: {e}")))?;

        Ok(Self {
            config,
            base,
            http,
            runtime,
        })
    }

    /// Build an endpoint URL below the base path. Segments are escaped.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send one logical request, retrying transient failures.
    ///
    /// The idempotency key is shared by every attempt so the backend can
    /// drop duplicates of a request that landed before the connection broke.
    fn call<B: Serialize>(&self, method: Method, url: Url, body: &B) -> ClientResult<String> {
        let idempotency_key = uuid::Uuid::new_v4().to_string();

        self.runtime.block_on(async {
            let mut attempt = 0;
            loop {
                match self.attempt(method.clone(), url.clone(), body, &idempotency_key).await {
                    Ok(text) => return Ok(text),
                    Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                        let delay = retry_delay(attempt);
                        warn!(
                            %url,
                            attempt = attempt + 1,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %err,
                            "Retrying request"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(err) => return Err(err),
                }
            }
        })
    }

    async fn attempt<B: Serialize>(
        &self,
        method: Method,
        url: Url,
        body: &B,
        idempotency_key: &str,
    ) -> ClientResult<String> {
        let mut request = self
            .http
            .request(method, url)
            .header("Idempotency-Key", idempotency_key)
            .json(body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| ClientError::from_reqwest(&e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| ClientError::from_reqwest(&e))?;

        if status.is_success() {
            debug!(status = status.as_u16(), bytes = text.len(), "Request succeeded");
            Ok(text)
        } else {
            Err(ClientError::from_status(status.as_u16(), &text))
        }
    }

    fn call_json<B: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> ClientResult<R> {
        let text = self.call(method, url, body)?;
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

impl SyncClient for HttpSyncClient {
    fn init(&self, request: &InitRequest) -> ClientResult<InitResponse> {
        let url = self.endpoint(&["api", "v1", "sync", "init"]);
        self.call_json(Method::POST, url, request)
    }

    fn upload_chunk(&self, request: &UploadChunkRequest) -> ClientResult<UploadChunkResponse> {
        let url = self.endpoint(&["api", "v1", "sync", "chunk"]);
        self.call_json(Method::POST, url, request)
    }

    fn send_event(&self, request: &EventRequest) -> ClientResult<()> {
        let url = self.endpoint(&["api", "v1", "sync", "event"]);
        self.call(Method::POST, url, request).map(|_| ())
    }

    fn update_session_summary(&self, session_id: &str, summary: &str) -> ClientResult<()> {
        let url = self.endpoint(&["api", "v1", "sessions", session_id, "summary"]);
        let body = SummaryUpdate {
            summary: summary.to_string(),
        };
        self.call(Method::PATCH, url, &body).map(|_| ())
    }
}
