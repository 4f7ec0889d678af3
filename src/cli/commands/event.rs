//! Event command implementation.

use crate::cli::commands::sync::open_engine;
use crate::cli::EventArgs;
use crate::config::load_settings;
use crate::error::{Error, Result};
use colored::Colorize;
use serde_json::Value;
use std::path::Path;

/// Execute the event command.
pub fn execute(args: &EventArgs, config_path: Option<&Path>, json: bool) -> Result<()> {
    let event_type = args.event_type.trim();
    if event_type.is_empty() {
        return Err(Error::InvalidArgument(
            "event type must not be empty".to_string(),
        ));
    }

    let payload: Value = serde_json::from_str(&args.payload)
        .map_err(|e| Error::InvalidArgument(format!("--payload is not valid JSON: {e}")))?;
    if !payload.is_object() {
        return Err(Error::InvalidArgument(
            "--payload must be a JSON object".to_string(),
        ));
    }

    let settings = load_settings(config_path)?;
    let mut engine = open_engine(&args.transcript, args.session_id.as_deref(), &settings)?;
    engine.init()?;
    engine.send_event(event_type, payload)?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "session_id": engine.session_id(),
            "event_type": event_type,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "Sent {} event to session {}",
            event_type.bold(),
            engine.session_id().unwrap_or("-")
        );
    }

    Ok(())
}
