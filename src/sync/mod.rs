//! Resumable, chunked transcript shipping.
//!
//! - **Tracker**: per-file cursors, change detection, byte-budgeted chunks
//! - **Engine**: session lifecycle, breadth-first pass over the root and every
//!   transitively referenced sub-agent transcript, cursor reconciliation
//! - **Client**: the remote backend (`SyncClient`) and its HTTP implementation
//! - **Extract**: reference ids and session facts pulled from transcript lines
//!
//! # Cursors
//!
//! Every tracked file has a cursor `(last_synced_line, byte_offset)`. The
//! backend is the source of truth: `init` replaces the local table with the
//! backend's lines, and an upload response that disagrees moves the cursor to
//! the backend's line. A byte offset of 0 with a nonzero line means "count
//! lines from the start".
//!
//! # Example
//!
//! ```ignore
//! use tsync::sync::{HttpSyncClient, SyncEngine};
//!
//! let client = HttpSyncClient::new(client_config)?;
//! let mut engine = SyncEngine::new(client, transcript_path, session_id);
//! engine.init()?;
//! let report = engine.sync_all()?;
//! println!("{} chunks", report.chunks_uploaded);
//! ```

mod client;
mod engine;
pub mod extract;
mod tracker;
mod types;

pub use client::{
    is_retryable_http_error, retry_delay, ClientError, ClientResult, HttpSyncClient, SyncClient,
};
pub use engine::{SyncEngine, MAX_PASSES};
pub use tracker::{FileTracker, LINE_OVERHEAD_BYTES};
pub use types::{
    Chunk, ChunkMetadata, EventRequest, FileKind, FileSnapshot, InitRequest, InitResponse,
    ServerFileState, SessionMetadata, SummaryUpdate, SyncError, SyncReport, SyncResult,
    TrackedFile, UploadChunkRequest, UploadChunkResponse,
};
