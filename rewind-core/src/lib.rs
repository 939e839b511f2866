//! Rewind Core Library
//!
//! This library provides the wire codec, block protocol and time-indexed
//! data structures shared by the rewind replay capture decoder and encoder.
//!
//! A capture is a compact, streaming binary file: a sequence of
//! varint-tagged records stamped with a frame number. The decoder turns the
//! record stream into frozen, queryable per-entity series; the encoder is
//! the mirror path from recording calls to the byte stream.

pub mod block;
pub mod codec;
pub mod entity;
pub mod series;
pub mod types;

pub use block::{Block, BlockType};
pub use entity::{Entity, EntityGraph, EntityId};
pub use series::FrameStampedSeries;
pub use types::{Color, FrameIndex, FrameRange, Point, Quaternion, Transform};

/// Result type for rewind-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for rewind-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("varint too large")]
    VarIntTooLarge,

    #[error("invalid block tag: {0}")]
    InvalidBlockTag(i32),

    #[error("invalid color index: {0}")]
    InvalidColorIndex(i32),

    #[error("invalid string payload: {0}")]
    InvalidString(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Whether this error is the expected end-of-capture condition.
    ///
    /// Capture files carry no end marker; the stream simply stops, possibly
    /// mid-record. Decoders treat this as normal termination, not failure.
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}
