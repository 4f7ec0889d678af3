//! Redact command implementation.
//!
//! Runs the configured redaction engine locally, the same one applied to
//! uploads, so patterns can be checked without touching the backend.

use crate::cli::RedactArgs;
use crate::config::load_settings;
use crate::error::{Error, Result};
use crate::redact::RedactionEngine;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

/// Execute the redact command.
pub fn execute(args: &RedactArgs, config_path: Option<&Path>, json: bool) -> Result<()> {
    let settings = load_settings(config_path)?;

    // Redaction runs here even when disabled for uploads.
    let mut redaction = settings.redaction;
    redaction.enabled = true;
    let engine = RedactionEngine::from_settings(&redaction)?
        .ok_or_else(|| Error::Other("redaction engine unavailable".to_string()))?;

    if let Some(text) = &args.text {
        let redacted = engine.redact_text(text);
        if json {
            let output = serde_json::json!({
                "success": true,
                "changed": redacted != *text,
                "text": redacted,
            });
            println!("{}", serde_json::to_string(&output)?);
        } else {
            println!("{redacted}");
        }
        return Ok(());
    }

    let input = match &args.file {
        Some(path) => {
            if !path.is_file() {
                return Err(Error::TranscriptNotFound { path: path.clone() });
            }
            fs::read(path)?
        }
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    // JSONL in, JSONL out: the output is already machine-readable.
    let mut stdout = io::stdout().lock();
    stdout.write_all(&engine.redact_lines(&input))?;
    stdout.flush()?;
    Ok(())
}
