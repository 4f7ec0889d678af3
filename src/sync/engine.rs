//! Session lifecycle and the breadth-first sync pass.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::client::SyncClient;
use super::extract;
use super::tracker::FileTracker;
use super::types::{
    ChunkMetadata, EventRequest, FileKind, InitRequest, SessionMetadata, SyncError, SyncReport,
    SyncResult, UploadChunkRequest,
};
use crate::config::{self, DEFAULT_MAX_CHUNK_BYTES};
use crate::redact::RedactionEngine;
use crate::vcs::{GitCli, VcsDetector};

/// Upper bound on discovery passes per `sync_all` call.
pub const MAX_PASSES: usize = 10;

/// What the caller of a drain should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Move on to the next file.
    Next,
    /// End the whole pass.
    Stop,
}

/// Whether uploads may proceed after checking for pending reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Open,
    /// Reconciliation failed; nothing more is uploaded in this call.
    Closed,
}

/// Ships one session's transcripts to the backend.
///
/// ```ignore
/// let client = HttpSyncClient::new(ClientConfig::from_settings(&settings)?)?;
/// let mut engine = SyncEngine::new(client, "/path/to/session.jsonl", "session")
///     .with_redactor(RedactionEngine::from_settings(&settings.redaction)?);
/// engine.init()?;
/// let report = engine.sync_all()?;
/// ```
pub struct SyncEngine<C: SyncClient> {
    client: C,
    tracker: FileTracker,
    redactor: Option<RedactionEngine>,
    vcs: Box<dyn VcsDetector>,
    external_id: String,
    session_id: Option<String>,
    max_chunk_bytes: usize,
    needs_reconcile: bool,
    session_metadata: Option<SessionMetadata>,
    /// Set once a root chunk starting at line 1 was accepted.
    root_from_start: bool,
    first_user_message: Option<String>,
    forwarded_summaries: HashSet<String>,
}

impl<C: SyncClient> SyncEngine<C> {
    pub fn new(client: C, root_path: impl Into<PathBuf>, external_id: impl Into<String>) -> Self {
        Self {
            client,
            tracker: FileTracker::new(root_path),
            redactor: None,
            vcs: Box::new(GitCli),
            external_id: external_id.into(),
            session_id: None,
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            needs_reconcile: false,
            session_metadata: None,
            root_from_start: false,
            first_user_message: None,
            forwarded_summaries: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_redactor(mut self, redactor: Option<RedactionEngine>) -> Self {
        self.redactor = redactor;
        self
    }

    #[must_use]
    pub fn with_vcs(mut self, vcs: impl VcsDetector + 'static) -> Self {
        self.vcs = Box::new(vcs);
        self
    }

    #[must_use]
    pub fn with_max_chunk_bytes(mut self, max_chunk_bytes: usize) -> Self {
        self.max_chunk_bytes = max_chunk_bytes;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn tracker(&self) -> &FileTracker {
        &self.tracker
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.session_id.is_some()
    }

    /// Whether an ambiguous failure still awaits cursor reconciliation.
    pub fn needs_reconcile(&self) -> bool {
        self.needs_reconcile
    }

    /// Open the backend session and take over its cursors.
    ///
    /// # Errors
    ///
    /// Returns the classified client error if the backend call fails.
    pub fn init(&mut self) -> SyncResult<()> {
        let metadata = self
            .session_metadata
            .get_or_insert_with(|| {
                collect_session_metadata(self.vcs.as_ref(), self.redactor.as_ref())
            })
            .clone();

        let request = InitRequest {
            external_id: self.external_id.clone(),
            root_path: self.tracker.root().path.display().to_string(),
            metadata: Some(metadata),
        };
        let response = self.client.init(&request)?;

        info!(
            session_id = %response.session_id,
            files = response.files.len(),
            "Sync session initialized"
        );
        self.tracker.seed(&response.files);
        self.session_id = Some(response.session_id);
        self.needs_reconcile = false;
        Ok(())
    }

    /// Forget the backend session. Cursors are kept.
    pub fn reset(&mut self) {
        debug!(external_id = %self.external_id, "Resetting sync session");
        self.session_id = None;
    }

    /// Last synced line per tracked file.
    pub fn stats(&self) -> BTreeMap<String, u64> {
        self.tracker.stats()
    }

    /// Send a session event stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotInitialized`] before `init`, or the client error.
    pub fn send_event(&self, event_type: &str, payload: serde_json::Value) -> SyncResult<()> {
        let session_id = self.session_id.clone().ok_or(SyncError::NotInitialized)?;
        let request = EventRequest {
            session_id,
            event_type: event_type.to_string(),
            timestamp: Utc::now(),
            payload,
        };
        self.client.send_event(&request)?;
        debug!(event_type, "Sent session event");
        Ok(())
    }

    /// Upload everything new in the root and every reachable transitive file.
    ///
    /// Per-file failures do not stop other files; the first one is returned
    /// in the report.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotInitialized`] before `init`.
    pub fn sync_all(&mut self) -> SyncResult<SyncReport> {
        if !self.is_initialized() {
            return Err(SyncError::NotInitialized);
        }

        let mut report = SyncReport::default();
        let mut frontier: Vec<String> = self.tracker.files().iter().map(|f| f.name.clone()).collect();
        let mut queued: HashSet<String> = frontier.iter().cloned().collect();

        'passes: while !frontier.is_empty() {
            if report.passes == MAX_PASSES {
                warn!(pending = frontier.len(), "Pass limit reached, remaining files wait for the next sync");
                break;
            }
            report.passes += 1;
            debug!(pass = report.passes, files = frontier.len(), "Sync pass");

            let mut collected = Vec::new();
            for name in &frontier {
                if self.drain_file(name, &mut report, &mut collected) == Flow::Stop {
                    break 'passes;
                }
            }

            frontier = self
                .tracker
                .discover_new_files(collected)
                .into_iter()
                .map(|file| file.name)
                .filter(|name| queued.insert(name.clone()))
                .collect();
            report.files_discovered += frontier.len();
        }

        info!(
            chunks = report.chunks_uploaded,
            files = report.files_touched.len(),
            passes = report.passes,
            ok = report.is_clean(),
            "Sync finished"
        );
        Ok(report)
    }

    /// Upload chunks of one file until it is exhausted or something fails.
    fn drain_file(&mut self, name: &str, report: &mut SyncReport, collected: &mut Vec<String>) -> Flow {
        match self.tracker.get(name) {
            Some(file) if self.tracker.has_file_changed(file) => {}
            Some(_) => {
                debug!(file = name, "Unchanged");
                return Flow::Next;
            }
            None => return Flow::Next,
        }

        loop {
            match self.reconcile_if_pending(report) {
                Gate::Open => {}
                Gate::Closed => return Flow::Stop,
            }
            // Reconciliation may have dropped the file.
            if self.tracker.get(name).is_none() {
                return Flow::Next;
            }
            let Some(session_id) = self.session_id.clone() else {
                return Flow::Stop;
            };

            let mut chunk = match self
                .tracker
                .read_chunk(name, self.redactor.as_ref(), self.max_chunk_bytes)
            {
                Ok(Some(chunk)) => chunk,
                Ok(None) => return Flow::Next,
                Err(err) => {
                    warn!(file = name, error = %err, "Failed to read chunk");
                    report.record_error(err);
                    return Flow::Next;
                }
            };
            collected.append(&mut chunk.new_references);

            let first_line = chunk.first_line;
            let last_line = chunk.last_line();
            let end_offset = chunk.end_offset;
            let mut first_message = None;
            let metadata = if chunk.kind == FileKind::Root {
                let mut metadata = chunk.metadata.take().unwrap_or_default();
                self.attach_summary(&mut metadata, &chunk.lines);
                if self.first_user_message.is_none() && (first_line == 1 || self.root_from_start) {
                    first_message = extract::first_user_message(&chunk.lines);
                    metadata.first_user_message.clone_from(&first_message);
                }
                Some(metadata).filter(|m| !m.is_empty())
            } else {
                None
            };

            let request = UploadChunkRequest {
                session_id,
                file_name: chunk.file_name,
                file_kind: chunk.kind,
                first_line,
                lines: chunk.lines,
                metadata,
            };

            match self.client.upload_chunk(&request) {
                Ok(response) => {
                    report.record_upload(name);
                    if request.file_kind == FileKind::Root {
                        self.root_from_start |= first_line == 1;
                        if first_message.is_some() {
                            self.first_user_message = first_message;
                        }
                    }

                    if response.last_synced_line != last_line {
                        warn!(
                            file = name,
                            expected = last_line,
                            server = response.last_synced_line,
                            "Backend cursor disagrees, resuming from the backend's line"
                        );
                        self.tracker.reset_cursor(name, response.last_synced_line);
                        return Flow::Next;
                    }
                    self.tracker.update_after_sync(name, last_line, end_offset);
                    debug!(file = name, first_line, last_line, "Uploaded chunk");
                }
                // Other files would be rejected too; the caller has to Reset and Init.
                Err(err) if err.is_unauthorized() => {
                    warn!(file = name, error = %err, "Backend rejected credentials");
                    report.first_error = Some(err.into());
                    return Flow::Stop;
                }
                Err(err) if err.is_ambiguous() => {
                    warn!(file = name, first_line, error = %err, "Upload failed, reconciling cursors");
                    report.record_error(err.into());
                    self.needs_reconcile = true;
                    return match self.reconcile_if_pending(report) {
                        Gate::Closed => Flow::Stop,
                        Gate::Open => Flow::Next,
                    };
                }
                Err(err) => {
                    warn!(file = name, error = %err, "Upload failed");
                    report.record_error(err.into());
                    return Flow::Next;
                }
            }
        }
    }

    /// Re-run `init` if an earlier failure left the cursors in doubt.
    fn reconcile_if_pending(&mut self, report: &mut SyncReport) -> Gate {
        if !self.needs_reconcile {
            return Gate::Open;
        }

        match self.init() {
            Ok(()) => {
                info!("Reconciled cursors with backend");
                Gate::Open
            }
            Err(SyncError::Client(err)) if err.is_unauthorized() => {
                warn!(error = %err, "Reconciliation rejected credentials");
                report.first_error = Some(SyncError::Client(err));
                Gate::Closed
            }
            Err(err) => {
                // Still pending; the next call tries again.
                warn!(error = %err, "Reconciliation failed, uploads paused");
                report.record_error(err);
                Gate::Closed
            }
        }
    }

    /// Attach summaries that belong to this session and forward the rest.
    ///
    /// A summary whose leaf message lives in a sibling transcript describes
    /// that other session.
    fn attach_summary(&mut self, metadata: &mut ChunkMetadata, lines: &[String]) {
        let root_name = self.tracker.root().name.clone();
        for summary in extract::session_summaries(lines) {
            let owner = summary
                .leaf_uuid
                .as_deref()
                .and_then(|uuid| extract::find_sibling_transcript(self.tracker.dir(), &root_name, uuid));

            let Some(owner) = owner else {
                metadata.summary = Some(summary.text);
                continue;
            };

            if !self.forwarded_summaries.insert(format!("{owner}\n{}", summary.text)) {
                continue;
            }
            match self.client.update_session_summary(&owner, &summary.text) {
                Ok(()) => debug!(session = %owner, "Forwarded summary to its session"),
                Err(err) => warn!(session = %owner, error = %err, "Failed to forward summary"),
            }
        }
    }
}

/// Remote URLs can carry credentials, so they go through the redactor too.
fn collect_session_metadata(
    vcs: &dyn VcsDetector,
    redactor: Option<&RedactionEngine>,
) -> SessionMetadata {
    let cwd = std::env::current_dir().ok();
    let mut vcs_info = cwd.as_deref().and_then(|dir| vcs.detect(dir));
    if let (Some(info), Some(engine)) = (vcs_info.as_mut(), redactor) {
        info.remote_url = info.remote_url.take().map(|url| engine.redact_text(&url));
    }
    SessionMetadata {
        vcs: vcs_info,
        cwd: cwd.map(|dir| dir.display().to_string()),
        hostname: config::hostname(),
        user: config::default_user(),
        client_version: env!("CARGO_PKG_VERSION").to_string(),
    }
}
