//! Error types for the G3D cache codecs.
//!
//! The taxonomy follows the batch-compile contract: format validation and
//! buffer overlap are fatal to the single asset, truncation is fatal only
//! for the first mip/frame of a payload, and missing-name lookups are not
//! errors at all (they produce placeholder references with a warning).

use thiserror::Error;

/// Result type for all codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised by the G3D codecs.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Unsupported format, out-of-range dimension, or bad enum value.
    #[error("format validation: {0}")]
    FormatValidation(String),

    /// Cache envelope signature or version mismatch.
    #[error("bad cache envelope: expected {expected}, got {actual}")]
    BadEnvelope { expected: String, actual: String },

    /// Stream or buffer shorter than its header declares.
    #[error("truncated data: needed {needed} bytes, had {available}")]
    Truncated { needed: usize, available: usize },

    /// Two texture-buffer regions claim the same block.
    #[error("texture buffer overlap at block {block} ({region_a} vs {region_b})")]
    BufferOverlap {
        block: u32,
        region_a: String,
        region_b: String,
    },

    /// Malformed source asset (OBJ syntax, bad index, etc).
    #[error("invalid source asset: {0}")]
    InvalidSource(String),

    /// I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Format-validation error from anything displayable.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::FormatValidation(msg.into())
    }

    /// Truncation error, capturing how much data was needed vs present.
    pub fn truncated(needed: usize, available: usize) -> Self {
        Self::Truncated { needed, available }
    }

    /// Truncation errors on mip levels past the first are recoverable:
    /// the texture decoder keeps the mips it already has.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}
