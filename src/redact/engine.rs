//! The redaction pipeline.

use std::borrow::Cow;

use serde_json::Value;
use tracing::debug;

use super::pattern::{CompiledPattern, RedactionPattern};
use super::{default_patterns, RedactResult};
use crate::config::RedactionSettings;

/// An ordered, immutable set of compiled patterns.
///
/// Cheap to share: wrap in an `Arc` or pass by reference across threads.
#[derive(Debug, Clone, Default)]
pub struct RedactionEngine {
    patterns: Vec<CompiledPattern>,
}

impl RedactionEngine {
    /// Compile a pattern set. Patterns apply in the given order.
    ///
    /// # Errors
    ///
    /// Fails on the first pattern that lacks a matcher, carries an invalid
    /// regex, or names an impossible capture group.
    pub fn compile(patterns: &[RedactionPattern]) -> RedactResult<Self> {
        let patterns = patterns
            .iter()
            .map(RedactionPattern::compile)
            .collect::<RedactResult<Vec<_>>>()?;
        debug!(count = patterns.len(), "Compiled redaction patterns");
        Ok(Self { patterns })
    }

    /// Build the engine described by the settings.
    ///
    /// Returns `Ok(None)` when redaction is disabled. Built-in patterns run
    /// before user patterns when both are in use.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern fails to compile.
    pub fn from_settings(settings: &RedactionSettings) -> RedactResult<Option<Self>> {
        if !settings.enabled {
            return Ok(None);
        }

        let mut patterns = if settings.use_default_patterns {
            default_patterns()
        } else {
            Vec::new()
        };
        patterns.extend(settings.patterns.iter().cloned());

        Self::compile(&patterns).map(Some)
    }

    /// Number of compiled patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True when no pattern is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The compiled patterns, in application order.
    #[must_use]
    pub fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }

    /// Redact free text using value patterns only.
    ///
    /// Field patterns need JSON structure and are skipped.
    #[must_use]
    pub fn redact_text(&self, text: &str) -> String {
        let mut current = Cow::Borrowed(text);
        for pattern in self.patterns.iter().filter(|p| !p.is_field_based()) {
            if let Some(next) = pattern.apply(&current) {
                current = Cow::Owned(next);
            }
        }
        current.into_owned()
    }

    /// Redact a single JSON Lines record.
    ///
    /// Valid JSON is walked with field context; anything else is treated as
    /// opaque text. A record that needs no change comes back byte-identical.
    #[must_use]
    pub fn redact_line(&self, line: &str) -> String {
        let (body, cr) = match line.strip_suffix('\r') {
            Some(body) => (body, "\r"),
            None => (line, ""),
        };

        if body.trim().is_empty() {
            return line.to_string();
        }

        match serde_json::from_str::<Value>(body) {
            Ok(mut value) => {
                if !self.redact_value(&mut value, "") {
                    return line.to_string();
                }
                match serde_json::to_string(&value) {
                    Ok(serialized) => format!("{serialized}{cr}"),
                    // Serializing a parsed Value does not fail; fall back to text mode anyway.
                    Err(_) => format!("{}{cr}", self.redact_text(body)),
                }
            }
            Err(_) => format!("{}{cr}", self.redact_text(body)),
        }
    }

    /// Redact a JSON Lines document.
    ///
    /// Line count, blank-line positions and the presence of a trailing
    /// newline are preserved. Invalid UTF-8 is replaced before matching.
    #[must_use]
    pub fn redact_lines(&self, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(input.len());
        let mut lines = input.split(|&b| b == b'\n').peekable();

        while let Some(raw) = lines.next() {
            let text = String::from_utf8_lossy(raw);
            out.extend_from_slice(self.redact_line(&text).as_bytes());
            if lines.peek().is_some() {
                out.push(b'\n');
            }
        }

        out
    }

    /// Walk a JSON value in place. Returns whether anything changed.
    ///
    /// Objects hand each child its own key as field context; arrays hand
    /// their elements the field context they were found under.
    pub fn redact_value(&self, value: &mut Value, field: &str) -> bool {
        match value {
            Value::String(s) => match self.redact_string(s, field) {
                Some(redacted) => {
                    *s = redacted;
                    true
                }
                None => false,
            },
            Value::Array(items) => items
                .iter_mut()
                .fold(false, |changed, item| self.redact_value(item, field) | changed),
            Value::Object(map) => map
                .iter_mut()
                .fold(false, |changed, (key, child)| self.redact_value(child, key) | changed),
            Value::Null | Value::Bool(_) | Value::Number(_) => false,
        }
    }

    fn redact_string(&self, s: &str, field: &str) -> Option<String> {
        let mut current: Option<String> = None;
        for pattern in &self.patterns {
            if !pattern.applies_to_field(field) {
                continue;
            }
            if let Some(next) = pattern.apply(current.as_deref().unwrap_or(s)) {
                current = Some(next);
            }
        }
        current
    }
}
