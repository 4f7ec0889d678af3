//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Transcript Sync - ship agent session transcripts to a remote backend
#[derive(Parser, Debug)]
#[command(name = "tsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (default: ~/.tsync/config.json)
    #[arg(long, global = true, env = "TSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON (for agent integration)
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload new transcript lines to the backend
    Sync(SyncArgs),

    /// Redact secrets from a file, stdin, or a string
    Redact(RedactArgs),

    /// Send a session event
    Event(EventArgs),

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Root transcript (.jsonl)
    pub transcript: PathBuf,

    /// External session id (default: transcript file stem)
    #[arg(long)]
    pub session_id: Option<String>,

    /// Byte budget per uploaded chunk
    #[arg(long)]
    pub max_chunk_bytes: Option<usize>,

    /// Keep syncing, one pass every N seconds
    #[arg(long, value_name = "SECS")]
    pub watch: Option<u64>,

    /// Upload lines without redaction
    #[arg(long)]
    pub no_redact: bool,
}

#[derive(Args, Debug)]
pub struct RedactArgs {
    /// JSONL file to redact (default: stdin)
    #[arg(conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// Redact a single string instead of JSONL input
    #[arg(long)]
    pub text: Option<String>,
}

#[derive(Args, Debug)]
pub struct EventArgs {
    /// Root transcript of the session
    pub transcript: PathBuf,

    /// Event type (e.g. session_end, compaction)
    pub event_type: String,

    /// Event payload as a JSON object
    #[arg(long, default_value = "{}")]
    pub payload: String,

    /// External session id (default: transcript file stem)
    #[arg(long)]
    pub session_id: Option<String>,
}
