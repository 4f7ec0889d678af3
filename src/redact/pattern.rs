//! Pattern definitions and compilation.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{marker, RedactError, RedactResult};

/// A declarative redaction pattern as it appears in the config file.
///
/// ```json
/// {"name": "db_url", "pattern": "://[^:/@\\s]+:([^@\\s]+)@", "type": "password", "capture_group": 1}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionPattern {
    /// Human-readable label, used in error messages and logs.
    pub name: String,
    /// Regex matched against string contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Regex matched against the enclosing JSON field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_pattern: Option<String>,
    /// Type label rendered into the marker (`[REDACTED:<TYPE>]`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Replace only this capture group of the value match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_group: Option<usize>,
}

impl RedactionPattern {
    /// A value-only pattern.
    #[must_use]
    pub fn value(name: &str, pattern: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: Some(pattern.to_string()),
            field_pattern: None,
            kind: kind.to_string(),
            capture_group: None,
        }
    }

    /// A field-only pattern: every string under a matching field is replaced.
    #[must_use]
    pub fn field(name: &str, field_pattern: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: None,
            field_pattern: Some(field_pattern.to_string()),
            kind: kind.to_string(),
            capture_group: None,
        }
    }

    /// Restrict a field pattern to matches of `pattern`.
    #[must_use]
    pub fn with_value(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }

    /// Replace only the given capture group.
    #[must_use]
    pub fn with_capture_group(mut self, group: usize) -> Self {
        self.capture_group = Some(group);
        self
    }

    /// Compile into an immutable matcher.
    ///
    /// # Errors
    ///
    /// Returns an error if neither matcher is present, if a regex is invalid,
    /// or if the capture group cannot exist in the value matcher.
    pub fn compile(&self) -> RedactResult<CompiledPattern> {
        if self.pattern.is_none() && self.field_pattern.is_none() {
            return Err(RedactError::NoMatcher {
                name: self.name.clone(),
            });
        }

        let value = self
            .pattern
            .as_deref()
            .map(|p| {
                Regex::new(p).map_err(|source| RedactError::InvalidRegex {
                    name: self.name.clone(),
                    which: "value",
                    source,
                })
            })
            .transpose()?;

        let field = self
            .field_pattern
            .as_deref()
            .map(|p| {
                Regex::new(p).map_err(|source| RedactError::InvalidRegex {
                    name: self.name.clone(),
                    which: "field",
                    source,
                })
            })
            .transpose()?;

        if let Some(group) = self.capture_group {
            match &value {
                None => {
                    return Err(RedactError::InvalidCaptureGroup {
                        name: self.name.clone(),
                        group,
                        reason: "the pattern has no value regex".to_string(),
                    });
                }
                Some(re) if group >= re.captures_len() => {
                    return Err(RedactError::InvalidCaptureGroup {
                        name: self.name.clone(),
                        group,
                        reason: format!("the value regex has {} group(s)", re.captures_len() - 1),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(CompiledPattern {
            name: self.name.clone(),
            value,
            field,
            capture_group: self.capture_group,
            marker: marker(&self.kind),
        })
    }
}

/// A compiled, immutable pattern.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    name: String,
    value: Option<Regex>,
    field: Option<Regex>,
    capture_group: Option<usize>,
    marker: String,
}

impl CompiledPattern {
    /// Pattern label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Marker text inserted in place of matches.
    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Whether the pattern needs JSON field context to apply.
    #[must_use]
    pub fn is_field_based(&self) -> bool {
        self.field.is_some()
    }

    /// Whether this pattern applies to a string found under `field`.
    pub(crate) fn applies_to_field(&self, field: &str) -> bool {
        self.field.as_ref().is_none_or(|re| re.is_match(field))
    }

    /// Apply the pattern to `input`, returning `None` when nothing changed.
    ///
    /// A pattern with no value matcher replaces the whole input.
    pub(crate) fn apply(&self, input: &str) -> Option<String> {
        let Some(re) = &self.value else {
            return (input != self.marker).then(|| self.marker.clone());
        };

        let mut out = String::with_capacity(input.len());
        let mut last = 0;
        let mut changed = false;

        for caps in re.captures_iter(input) {
            let span = match self.capture_group {
                Some(group) => caps.get(group),
                None => caps.get(0),
            };
            // Non-participating group: leave the whole match as is.
            let Some(span) = span else { continue };
            if span.is_empty() {
                continue;
            }
            out.push_str(&input[last..span.start()]);
            out.push_str(&self.marker);
            last = span.end();
            changed = true;
        }

        if !changed {
            return None;
        }
        out.push_str(&input[last..]);
        Some(out)
    }
}
