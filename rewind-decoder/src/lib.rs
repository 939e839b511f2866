//! Rewind Decoder Library
//!
//! Loads a replay capture file into frozen, queryable in-memory structures
//! and exposes the read-only query surface every view consumes: time↔frame
//! conversion, per-entity transform/lifetime/parameter lookups, log and
//! draw range queries, and distinct-value sets for filter UIs.
//!
//! Loading is a single synchronous pass; after it completes the reader is
//! immutable and safe to query from any number of threads.

pub mod query;
pub mod reader;

pub use reader::{DrawShape, DynamicParamEntry, EntityDrawCommand, LogEntry, ReplayReader};

/// Result type for rewind-decoder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for rewind-decoder operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("rewind core error: {0}")]
    Core(#[from] rewind_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
