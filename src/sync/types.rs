//! Sync types: tracked files, chunks, wire payloads and errors.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::client::ClientError;
use crate::vcs::VcsInfo;

/// How a file entered the tracked set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// The session's primary transcript.
    Root,
    /// A sub-agent transcript discovered through a reference id.
    Transitive,
}

impl FileKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Transitive => "transitive",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Modification time and size as last observed.
///
/// Only used to decide whether a file is worth reading again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSnapshot {
    pub modified: Option<SystemTime>,
    pub size: u64,
}

impl FileSnapshot {
    /// Capture the snapshot of file metadata.
    #[must_use]
    pub fn of(metadata: &std::fs::Metadata) -> Self {
        Self {
            modified: metadata.modified().ok(),
            size: metadata.len(),
        }
    }
}

/// A file whose content is shipped incrementally.
///
/// `last_synced_line` and `byte_offset` form the cursor and always move
/// together. An offset of 0 with a nonzero line means the offset is unknown
/// and the reader has to skip-count lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    pub path: PathBuf,
    pub name: String,
    pub kind: FileKind,
    /// 1-based; 0 means nothing synced yet.
    pub last_synced_line: u64,
    pub byte_offset: u64,
    pub snapshot: Option<FileSnapshot>,
}

impl TrackedFile {
    /// A tracked file with an empty cursor.
    #[must_use]
    pub fn new(path: PathBuf, kind: FileKind) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            kind,
            last_synced_line: 0,
            byte_offset: 0,
            snapshot: None,
        }
    }

    /// A tracked file positioned at a line whose byte offset is unknown.
    #[must_use]
    pub fn at_line(path: PathBuf, kind: FileKind, last_synced_line: u64) -> Self {
        Self {
            last_synced_line,
            ..Self::new(path, kind)
        }
    }
}

/// Context attached to chunks of the root file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Version of the tool that wrote the transcript.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_user_message: Option<String>,
}

impl ChunkMetadata {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// One byte-budgeted, line-exact upload unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub file_name: String,
    pub kind: FileKind,
    /// Line number of `lines[0]`, 1-based.
    pub first_line: u64,
    /// Lines without terminators, already redacted.
    pub lines: Vec<String>,
    /// Byte offset immediately after the last included line.
    pub end_offset: u64,
    pub metadata: Option<ChunkMetadata>,
    /// Reference ids first seen in this chunk. Never uploaded.
    pub new_references: Vec<String>,
}

impl Chunk {
    /// Line number of the last included line.
    #[must_use]
    pub fn last_line(&self) -> u64 {
        self.first_line + self.lines.len() as u64 - 1
    }
}

// ── Wire payloads ─────────────────────────────────────────────

/// Environment context sent once per session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcs: Option<VcsInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub user: String,
    pub client_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitRequest {
    pub external_id: String,
    pub root_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SessionMetadata>,
}

/// Backend cursor for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFileState {
    pub last_synced_line: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitResponse {
    pub session_id: String,
    #[serde(default)]
    pub files: BTreeMap<String, ServerFileState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadChunkRequest {
    pub session_id: String,
    pub file_name: String,
    pub file_kind: FileKind,
    pub first_line: u64,
    pub lines: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ChunkMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadChunkResponse {
    pub last_synced_line: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRequest {
    pub session_id: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryUpdate {
    pub summary: String,
}

// ── Results ───────────────────────────────────────────────────

/// Outcome of one `sync_all` call.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Chunks the backend accepted.
    pub chunks_uploaded: usize,
    /// Files with at least one accepted chunk, in upload order.
    pub files_touched: Vec<String>,
    /// Files discovered through reference ids during this call.
    pub files_discovered: usize,
    /// BFS passes run.
    pub passes: usize,
    /// First failure; later ones are only logged.
    pub first_error: Option<SyncError>,
}

impl SyncReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.first_error.is_none()
    }

    pub(crate) fn record_error(&mut self, err: SyncError) {
        if self.first_error.is_none() {
            self.first_error = Some(err);
        } else {
            tracing::debug!(error = %err, "Additional sync error");
        }
    }

    pub(crate) fn record_upload(&mut self, file_name: &str) {
        self.chunks_uploaded += 1;
        if !self.files_touched.iter().any(|f| f == file_name) {
            self.files_touched.push(file_name.to_string());
        }
    }

    /// Whether the pass ended on rejected credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self.first_error,
            Some(SyncError::Client(ClientError::Unauthorized(_)))
        )
    }
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// `sync_all` or `send_event` before a successful `init`.
    #[error("sync session is not initialized")]
    NotInitialized,

    /// A single line does not fit in one chunk.
    #[error("{file}: line {line} exceeds max chunk size ({size} > {max} bytes)")]
    LineTooLarge {
        file: String,
        line: u64,
        size: usize,
        max: usize,
    },

    /// IO error while reading a tracked file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote call failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_file_name_from_path() {
        let file = TrackedFile::at_line(PathBuf::from("/tmp/s/agent-x.jsonl"), FileKind::Transitive, 4);
        assert_eq!(file.name, "agent-x.jsonl");
        assert_eq!(file.last_synced_line, 4);
        assert_eq!(file.byte_offset, 0);
        assert!(file.snapshot.is_none());
    }

    #[test]
    fn test_chunk_last_line() {
        let chunk = Chunk {
            file_name: "a.jsonl".to_string(),
            kind: FileKind::Root,
            first_line: 5,
            lines: vec!["{}".to_string(), "{}".to_string(), "{}".to_string()],
            end_offset: 9,
            metadata: None,
            new_references: Vec::new(),
        };
        assert_eq!(chunk.last_line(), 7);
    }

    #[test]
    fn test_upload_request_wire_shape() {
        let request = UploadChunkRequest {
            session_id: "s1".to_string(),
            file_name: "agent-a.jsonl".to_string(),
            file_kind: FileKind::Transitive,
            first_line: 1,
            lines: vec!["{}".to_string()],
            metadata: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["file_kind"], "transitive");
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn test_init_response_tolerates_missing_files() {
        let response: InitResponse = serde_json::from_str(r#"{"session_id":"abc"}"#).unwrap();
        assert!(response.files.is_empty());

        let response: InitResponse = serde_json::from_str(
            r#"{"session_id":"abc","files":{"root.jsonl":{"last_synced_line":12}}}"#,
        )
        .unwrap();
        assert_eq!(response.files["root.jsonl"].last_synced_line, 12);
    }

    #[test]
    fn test_report_keeps_first_error() {
        let mut report = SyncReport::default();
        report.record_error(SyncError::NotInitialized);
        report.record_error(SyncError::Client(ClientError::Unauthorized("x".to_string())));
        assert!(matches!(report.first_error, Some(SyncError::NotInitialized)));
        assert!(!report.is_unauthorized());

        report.record_upload("a");
        report.record_upload("a");
        assert_eq!(report.chunks_uploaded, 2);
        assert_eq!(report.files_touched, vec!["a".to_string()]);
    }
}
