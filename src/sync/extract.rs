//! Best-effort facts pulled out of transcript lines.
//!
//! Nothing here fails: a line that does not have the expected shape simply
//! contributes nothing.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;

use super::types::ChunkMetadata;

/// Longest first user message attached to a chunk, in characters.
pub const MAX_FIRST_MESSAGE_CHARS: usize = 500;

const TRANSITIVE_PREFIX: &str = "agent-";
const TRANSCRIPT_SUFFIX: &str = ".jsonl";

/// Whether `id` may name a transitive file.
///
/// Ids come from file content, so they are limited to `[A-Za-z0-9_-]{1,128}`
/// and can never form a path outside the transcript directory.
#[must_use]
pub fn is_valid_reference_id(id: &str) -> bool {
    (1..=128).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// File name of the transcript for reference id `id`.
#[must_use]
pub fn transitive_file_name(id: &str) -> String {
    format!("{TRANSITIVE_PREFIX}{id}{TRANSCRIPT_SUFFIX}")
}

/// Reference id encoded in a transitive file name, if it is one.
#[must_use]
pub fn reference_id_from_file_name(name: &str) -> Option<&str> {
    name.strip_prefix(TRANSITIVE_PREFIX)?
        .strip_suffix(TRANSCRIPT_SUFFIX)
        .filter(|id| is_valid_reference_id(id))
}

/// Reference ids carried by one parsed line.
///
/// Looks at a top-level `agentId` and at `toolUseResult.agentId`.
#[must_use]
pub fn reference_ids(line: &Value) -> Vec<&str> {
    [
        line.get("agentId"),
        line.get("toolUseResult").and_then(|r| r.get("agentId")),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_str)
    .filter(|id| is_valid_reference_id(id))
    .collect()
}

/// Fill unset environment fields of `meta` from one parsed line.
pub fn absorb_line_metadata(meta: &mut ChunkMetadata, line: &Value) {
    let field = |key: &str| {
        line.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    if meta.git_branch.is_none() {
        meta.git_branch = field("gitBranch");
    }
    if meta.cwd.is_none() {
        meta.cwd = field("cwd");
    }
    if meta.tool_version.is_none() {
        meta.tool_version = field("version");
    }
}

/// A `summary` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub text: String,
    /// Uuid of the last message the summary covers.
    pub leaf_uuid: Option<String>,
}

/// All summary lines in order of appearance.
#[must_use]
pub fn session_summaries(lines: &[String]) -> Vec<SessionSummary> {
    lines
        .iter()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(|value| value.get("type").and_then(Value::as_str) == Some("summary"))
        .filter_map(|value| {
            let text = value.get("summary")?.as_str()?.trim();
            if text.is_empty() {
                return None;
            }
            Some(SessionSummary {
                text: text.to_string(),
                leaf_uuid: value
                    .get("leafUuid")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        })
        .collect()
}

/// Text of the first real user prompt among `lines`.
///
/// Meta lines and command wrappers (text starting with `<`) are skipped. The
/// result is truncated to [`MAX_FIRST_MESSAGE_CHARS`].
#[must_use]
pub fn first_user_message(lines: &[String]) -> Option<String> {
    lines
        .iter()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(|value| value.get("type").and_then(Value::as_str) == Some("user"))
        .filter(|value| !value.get("isMeta").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|value| message_text(&value))
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty() && !text.starts_with('<'))
        .map(|text| text.chars().take(MAX_FIRST_MESSAGE_CHARS).collect())
}

fn message_text(line: &Value) -> Option<String> {
    match line.get("message")?.get("content")? {
        Value::String(text) => Some(text.clone()),
        Value::Array(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect();
            (!parts.is_empty()).then(|| parts.join("\n"))
        }
        _ => None,
    }
}

/// Find the sibling transcript holding the message `uuid`.
///
/// Returns the file stem, which is the session's external id. `exclude` and
/// transitive files are never considered.
#[must_use]
pub fn find_sibling_transcript(dir: &Path, exclude: &str, uuid: &str) -> Option<String> {
    let mut candidates: Vec<_> = fs::read_dir(dir)
        .ok()?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| {
                    name != exclude
                        && name.ends_with(TRANSCRIPT_SUFFIX)
                        && reference_id_from_file_name(name).is_none()
                })
        })
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .find(|path| transcript_contains_uuid(path, uuid))
        .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
}

fn transcript_contains_uuid(path: &Path, uuid: &str) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    BufReader::new(file)
        .lines()
        .map_while(std::result::Result::ok)
        .filter(|line| line.contains(uuid))
        .filter_map(|line| serde_json::from_str::<Value>(&line).ok())
        .any(|value| value.get("uuid").and_then(Value::as_str) == Some(uuid))
}
