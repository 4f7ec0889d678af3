//! Transcript Sync - ship AI agent session transcripts to a remote backend
//!
//! This crate provides the core functionality for the `tsync` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`sync`] - Cursor tracking, chunking and the sync engine
//! - [`redact`] - Secret redaction applied to every outgoing line
//! - [`config`] - Configuration management
//! - [`vcs`] - Best-effort version-control metadata
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod redact;
pub mod sync;
pub mod vcs;

pub use error::{Error, Result};
