//! Rewind Encoder Library
//!
//! The recording side of the capture format: turns mutation calls keyed by
//! opaque handles into the deflate-compressed block stream the decoder
//! reads. Redundant position/transform/numeric-parameter updates are
//! coalesced before they reach the wire.

pub mod writer;

pub use writer::ReplayWriter;

/// Result type for rewind-encoder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for rewind-encoder operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("rewind core error: {0}")]
    Core(#[from] rewind_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("mesh draws are only supported at entity creation (category must be empty)")]
    MeshWithCategory,
}
