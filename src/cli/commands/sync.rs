//! Sync command implementation.
//!
//! One invocation opens (or resumes) the backend session for a transcript,
//! runs a pass and prints what was shipped. With `--watch` it keeps running
//! passes on an interval, re-opening the session when the backend rejects
//! the credentials mid-run.

use crate::cli::SyncArgs;
use crate::config::{load_settings, ClientConfig, Settings};
use crate::error::{Error, Result};
use crate::redact::RedactionEngine;
use crate::sync::{HttpSyncClient, SyncClient, SyncEngine, SyncReport, SyncResult};
use colored::Colorize;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Execute the sync command.
pub fn execute(args: &SyncArgs, config_path: Option<&Path>, json: bool) -> Result<()> {
    let mut settings = load_settings(config_path)?;
    if let Some(max) = args.max_chunk_bytes {
        settings.max_chunk_bytes = max;
    }
    if args.no_redact {
        settings.redaction.enabled = false;
    }

    let mut engine = open_engine(&args.transcript, args.session_id.as_deref(), &settings)?;
    engine.init()?;

    if let Some(secs) = args.watch {
        if secs == 0 {
            return Err(Error::InvalidArgument(
                "--watch interval must be at least 1 second".to_string(),
            ));
        }
        return watch(&mut engine, Duration::from_secs(secs), json);
    }

    let mut report = engine.sync_all()?;
    print_report(&engine, &report, json)?;

    match report.first_error.take() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Build an engine for `transcript` from resolved settings.
///
/// The external session id defaults to the transcript's file stem.
pub(crate) fn open_engine(
    transcript: &Path,
    session_id: Option<&str>,
    settings: &Settings,
) -> Result<SyncEngine<HttpSyncClient>> {
    if !transcript.is_file() {
        return Err(Error::TranscriptNotFound {
            path: transcript.to_path_buf(),
        });
    }
    if settings.max_chunk_bytes == 0 {
        return Err(Error::InvalidArgument(
            "max chunk size must be greater than 0".to_string(),
        ));
    }

    let transcript = transcript.canonicalize()?;
    let external_id = match session_id {
        Some(id) => id.trim().to_string(),
        None => transcript
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    if external_id.is_empty() {
        return Err(Error::InvalidArgument(
            "session id must not be empty".to_string(),
        ));
    }

    let client = HttpSyncClient::new(ClientConfig::from_settings(settings)?)?;
    let redactor = RedactionEngine::from_settings(&settings.redaction)?;
    if redactor.is_none() {
        warn!("Redaction is disabled; lines are uploaded verbatim");
    }

    Ok(SyncEngine::new(client, transcript, external_id)
        .with_redactor(redactor)
        .with_max_chunk_bytes(settings.max_chunk_bytes))
}

fn watch(engine: &mut SyncEngine<HttpSyncClient>, interval: Duration, json: bool) -> Result<()> {
    info!(interval_secs = interval.as_secs(), "Watching transcript");

    loop {
        if let Some(report) = watch_pass(engine)? {
            if report.chunks_uploaded > 0 {
                print_report(engine, &report, json)?;
            }
        }
        thread::sleep(interval);
    }
}

/// One iteration of the watch loop.
///
/// Failures confined to a file (oversize line, unreadable file, rejected
/// chunk) are logged and retried on the next interval. Rejected credentials
/// re-open the session. Returns `None` when no session could be opened.
fn watch_pass<C: SyncClient>(engine: &mut SyncEngine<C>) -> SyncResult<Option<SyncReport>> {
    if !engine.is_initialized() {
        if let Err(err) = engine.init() {
            warn!(error = %err, "Session init failed; retrying next interval");
            return Ok(None);
        }
    }

    let report = engine.sync_all()?;
    if report.is_unauthorized() {
        warn!("Backend rejected credentials; re-opening session");
        engine.reset();
        if let Err(err) = engine.init() {
            warn!(error = %err, "Session re-init failed; retrying next interval");
        }
    } else if let Some(err) = &report.first_error {
        warn!(error = %err, "Sync pass incomplete; retrying next interval");
    }
    Ok(Some(report))
}

fn print_report<C: SyncClient>(
    engine: &SyncEngine<C>,
    report: &SyncReport,
    json: bool,
) -> Result<()> {
    let stats = engine.stats();

    if json {
        let output = serde_json::json!({
            "success": report.is_clean(),
            "session_id": engine.session_id(),
            "external_id": engine.external_id(),
            "chunks_uploaded": report.chunks_uploaded,
            "files_touched": report.files_touched,
            "files_discovered": report.files_discovered,
            "passes": report.passes,
            "files": stats,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if report.is_clean() {
        println!("{}", "Sync Complete".bold().underline());
    } else {
        println!("{}", "Sync Incomplete".yellow().bold());
    }
    println!();
    println!("  Session:  {}", engine.session_id().unwrap_or("-"));
    println!("  External: {}", engine.external_id());
    println!();

    if report.chunks_uploaded == 0 {
        println!("{}", "Nothing new to upload.".dimmed());
    } else {
        println!(
            "  {}: {} chunk(s) across {} file(s)",
            "Uploaded".green(),
            report.chunks_uploaded,
            report.files_touched.len()
        );
        if report.files_discovered > 0 {
            println!("  Discovered: {} sub-agent transcript(s)", report.files_discovered);
        }
    }
    println!();

    println!("{}", "Files:".blue().bold());
    for (name, line) in &stats {
        println!("  {name:<48} line {line}");
    }

    Ok(())
}
