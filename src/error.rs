//! Error types for the transcript sync CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=session, 3=not_found, 6=sync, 7=config, etc.)
//! - Retryability flags so wrappers know whether to schedule another pass
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::redact::RedactError;
use crate::sync::{ClientError, SyncError};

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Session (exit 2)
    NotInitialized,
    Unauthorized,

    // Not Found (exit 3)
    TranscriptNotFound,
    RemoteNotFound,

    // Validation (exit 4)
    InvalidArgument,
    LineTooLarge,

    // Sync (exit 6)
    SyncError,
    RemoteUnavailable,

    // Config (exit 7)
    ConfigError,
    InvalidPattern,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::TranscriptNotFound => "TRANSCRIPT_NOT_FOUND",
            Self::RemoteNotFound => "REMOTE_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::LineTooLarge => "LINE_TOO_LARGE",
            Self::SyncError => "SYNC_ERROR",
            Self::RemoteUnavailable => "REMOTE_UNAVAILABLE",
            Self::ConfigError => "CONFIG_ERROR",
            Self::InvalidPattern => "INVALID_PATTERN",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::Unauthorized => 2,
            Self::TranscriptNotFound | Self::RemoteNotFound => 3,
            Self::InvalidArgument | Self::LineTooLarge => 4,
            Self::SyncError | Self::RemoteUnavailable => 6,
            Self::ConfigError | Self::InvalidPattern => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether running the same command again later can succeed unchanged.
    ///
    /// True for transient remote conditions and partial sync passes. False for
    /// configuration problems, rejected credentials, and oversize lines.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SyncError | Self::RemoteUnavailable | Self::IoError | Self::NotInitialized
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in CLI operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transcript not found: {path}")]
    TranscriptNotFound { path: PathBuf },

    #[error("Backend URL not configured")]
    BackendNotConfigured,

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Redaction error: {0}")]
    Redaction(#[from] RedactError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<ClientError> for Error {
    fn from(err: ClientError) -> Self {
        Self::Sync(SyncError::Client(err))
    }
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::TranscriptNotFound { .. } => ErrorCode::TranscriptNotFound,
            Self::BackendNotConfigured | Self::Config(_) => ErrorCode::ConfigError,
            Self::Redaction(_) => ErrorCode::InvalidPattern,
            Self::Sync(err) => match err {
                SyncError::NotInitialized => ErrorCode::NotInitialized,
                SyncError::LineTooLarge { .. } => ErrorCode::LineTooLarge,
                SyncError::Io(_) => ErrorCode::IoError,
                SyncError::Client(ClientError::Unauthorized(_)) => ErrorCode::Unauthorized,
                SyncError::Client(ClientError::NotFound(_)) => ErrorCode::RemoteNotFound,
                SyncError::Client(
                    ClientError::Timeout(_) | ClientError::Transport(_) | ClientError::Server { .. },
                ) => ErrorCode::RemoteUnavailable,
                SyncError::Client(_) => ErrorCode::SyncError,
            },
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::TranscriptNotFound { path } => Some(format!(
                "No transcript at {}. Pass the path of the session's .jsonl file.",
                path.display()
            )),

            Self::BackendNotConfigured => Some(
                "Set TSYNC_BACKEND_URL or add \"backend_url\" to ~/.tsync/config.json".to_string(),
            ),

            Self::Redaction(_) => Some(
                "Each redaction pattern needs a valid \"pattern\" or \"field_pattern\" regex"
                    .to_string(),
            ),

            Self::Sync(SyncError::Client(ClientError::Unauthorized(_))) => Some(
                "The backend rejected the API key. Check TSYNC_API_KEY or \"api_key\" in the config file."
                    .to_string(),
            ),

            Self::Sync(SyncError::LineTooLarge { max, .. }) => Some(format!(
                "Raise \"max_chunk_bytes\" above {max} or pass --max-chunk-bytes."
            )),

            Self::Sync(SyncError::Client(
                ClientError::Timeout(_) | ClientError::Transport(_) | ClientError::Server { .. },
            )) => Some("The backend is unreachable. Progress is kept; run the sync again later.".to_string()),

            Self::Sync(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_maps_to_session_exit_code() {
        let err = Error::from(ClientError::Unauthorized("bad key".to_string()));
        assert_eq!(err.error_code(), ErrorCode::Unauthorized);
        assert_eq!(err.exit_code(), 2);
        assert!(err.hint().is_some());
        assert!(!err.error_code().is_retryable());
    }

    #[test]
    fn test_line_too_large_is_not_retryable() {
        let err = Error::Sync(SyncError::LineTooLarge {
            file: "root.jsonl".to_string(),
            line: 7,
            size: 900,
            max: 100,
        });
        assert_eq!(err.error_code(), ErrorCode::LineTooLarge);
        assert!(!err.error_code().is_retryable());
        assert!(err.hint().unwrap().contains("100"));
    }

    #[test]
    fn test_structured_json_shape() {
        let err = Error::Sync(SyncError::Client(ClientError::Timeout("upload".to_string())));
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "REMOTE_UNAVAILABLE");
        assert_eq!(json["error"]["retryable"], true);
        assert_eq!(json["error"]["exit_code"], 6);
        assert!(json["error"]["hint"].is_string());
    }
}
