//! Configuration management.
//!
//! Settings live in `~/.tsync/config.json`:
//!
//! ```json
//! {
//!   "backend_url": "https://sync.example.com",
//!   "api_key": "…",
//!   "max_chunk_bytes": 1048576,
//!   "redaction": {
//!     "enabled": true,
//!     "use_default_patterns": true,
//!     "patterns": [
//!       {"name": "internal_host", "pattern": "corp-[a-z0-9]+\\.internal", "type": "hostname"}
//!     ]
//!   }
//! }
//! ```
//!
//! Environment variables take precedence over the file:
//! - `TSYNC_CONFIG` - Alternate config file path
//! - `TSYNC_BACKEND_URL` - Backend base URL
//! - `TSYNC_API_KEY` - API key sent as a bearer token
//! - `TSYNC_REDACTION_ENABLED` - `false`/`0` disables redaction

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::redact::RedactionPattern;

/// Default byte budget for one uploaded chunk.
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 1024 * 1024;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of transport retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Redaction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionSettings {
    /// Scrub lines before upload.
    pub enabled: bool,
    /// Run the built-in patterns ahead of the user patterns.
    pub use_default_patterns: bool,
    /// User-supplied patterns.
    pub patterns: Vec<RedactionPattern>,
}

impl Default for RedactionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            use_default_patterns: true,
            patterns: Vec::new(),
        }
    }
}

/// The config file structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend_url: Option<String>,
    pub api_key: Option<String>,
    pub max_chunk_bytes: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub redaction: RedactionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: None,
            api_key: None,
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            redaction: RedactionSettings::default(),
        }
    }
}

impl Settings {
    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// Taking the lookup as a parameter keeps tests away from the process
    /// environment.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("TSYNC_BACKEND_URL") {
            self.backend_url = Some(url);
        }
        if let Some(key) = non_empty("TSYNC_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(enabled) = non_empty("TSYNC_REDACTION_ENABLED") {
            self.redaction.enabled = is_truthy(&enabled);
        }
        self
    }
}

/// Explicit transport configuration, built once and handed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL without trailing slash.
    pub backend_url: String,
    pub api_key: Option<String>,
    /// Outbound `User-Agent`.
    pub user_agent: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl ClientConfig {
    /// Build the transport configuration from settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendNotConfigured`] if no backend URL is set.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let backend_url = settings
            .backend_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(Error::BackendNotConfigured)?;

        if !backend_url.starts_with("http://") && !backend_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "backend_url must start with http:// or https://, got '{backend_url}'"
            )));
        }

        Ok(Self {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            user_agent: user_agent(),
            timeout: Duration::from_secs(settings.timeout_secs.max(1)),
            max_retries: settings.max_retries,
        })
    }
}

/// The outbound identifier string.
#[must_use]
pub fn user_agent() -> String {
    format!("tsync/{}", env!("CARGO_PKG_VERSION"))
}

/// Get the global tsync directory location (`~/.tsync/`).
#[must_use]
pub fn global_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".tsync"))
}

/// Resolve the config file path.
///
/// Priority:
/// 1. Explicit path from the `--config` flag
/// 2. `TSYNC_CONFIG` environment variable
/// 3. `~/.tsync/config.json`
#[must_use]
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var("TSYNC_CONFIG") {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    global_dir().map(|dir| dir.join("config.json"))
}

/// Load settings from a file. A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {}: {e}", path.display())))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file {}: {e}", path.display())))
}

/// Load settings with environment overrides applied.
///
/// # Errors
///
/// Returns an error if the config file exists but is invalid.
pub fn load_settings(explicit_path: Option<&Path>) -> Result<Settings> {
    let settings = match resolve_config_path(explicit_path) {
        Some(path) => load_settings_from(&path)?,
        None => Settings::default(),
    };
    Ok(settings.with_overrides(|key| std::env::var(key).ok()))
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    value != "0" && !value.eq_ignore_ascii_case("false") && !value.eq_ignore_ascii_case("no")
}

/// Get the local user name.
///
/// Priority:
/// 1. `USER` environment variable
/// 2. `USERNAME` environment variable (Windows)
/// 3. "unknown"
#[must_use]
pub fn default_user() -> String {
    ["USER", "USERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Get the machine's host name.
///
/// Returns `None` if neither `HOSTNAME` nor the `hostname` command yields one.
#[must_use]
pub fn hostname() -> Option<String> {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return Some(name.trim().to_string());
        }
    }

    std::process::Command::new("hostname")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|name| !name.is_empty())
}
