//! Command implementations.

pub mod completions;
pub mod event;
pub mod redact;
pub mod sync;
pub mod version;
