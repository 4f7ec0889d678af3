//! Built-in pattern set.
//!
//! Ordered so that specific token shapes are replaced before the generic ones
//! can see them.

use super::RedactionPattern;

/// Patterns applied when `use_default_patterns` is enabled.
#[must_use]
pub fn default_patterns() -> Vec<RedactionPattern> {
    vec![
        RedactionPattern::value(
            "private_key",
            r"-----BEGIN [A-Z ]*PRIVATE KEY-----[\s\S]*?-----END [A-Z ]*PRIVATE KEY-----",
            "private_key",
        ),
        RedactionPattern::value("aws_access_key", r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b", "aws_key"),
        RedactionPattern::value(
            "github_token",
            r"\b(?:gh[pousr]_[A-Za-z0-9]{36,}|github_pat_[A-Za-z0-9_]{40,})\b",
            "github_token",
        ),
        RedactionPattern::value("anthropic_key", r"\bsk-ant-[A-Za-z0-9_-]{20,}", "api_key"),
        RedactionPattern::value("openai_key", r"\bsk-(?:proj-)?[A-Za-z0-9_-]{20,}", "api_key"),
        RedactionPattern::value("slack_token", r"\bxox[abposr]-[A-Za-z0-9-]{10,}", "slack_token"),
        RedactionPattern::value(
            "jwt",
            r"\beyJ[A-Za-z0-9_-]{5,}\.eyJ[A-Za-z0-9_-]{5,}\.[A-Za-z0-9_-]{5,}",
            "jwt",
        ),
        RedactionPattern::value(
            "bearer_token",
            r"(?i)\bbearer\s+([A-Za-z0-9._~+/-]{8,}=*)",
            "token",
        )
        .with_capture_group(1),
        RedactionPattern::value("url_credentials", r"://[^:/@\s]+:([^@\s]+)@", "password")
            .with_capture_group(1),
        RedactionPattern::field(
            "secret_fields",
            r"(?i)^(?:password|passwd|secret|api[_-]?key|access[_-]?token|auth[_-]?token|refresh[_-]?token|client[_-]?secret|private[_-]?key)$",
            "secret",
        ),
    ]
}
