//! Error taxonomy shared by every pipeline stage.
//!
//! Propagation policy:
//! - `DeviceUnavailable` aborts the whole session.
//! - `StreamExhausted` is the normal end of a tracking loop.
//! - `IoWriteFailure` is local to one cycle; the event is lost and the loop continues.
//!
//! Two events of the same kind within one wall-clock second resolve to the same
//! filename. The later write replaces the earlier one and no error is raised.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Capture device or file could not be opened.
    #[error("capture source {source_uri} unavailable: {reason}")]
    DeviceUnavailable { source_uri: String, reason: String },

    /// No more frames (end of file, device disconnected, frame limit reached).
    #[error("frame stream exhausted")]
    StreamExhausted,

    /// An event image could not be persisted.
    #[error("failed to write {}: {reason}", path.display())]
    IoWriteFailure { path: PathBuf, reason: String },

    /// Two frames that must share geometry do not.
    #[error("frame geometry mismatch: {left_width}x{left_height} vs {right_width}x{right_height}")]
    FrameMismatch {
        left_width: u32,
        left_height: u32,
        right_width: u32,
        right_height: u32,
    },

    /// Pixel buffer or image input that cannot become a frame.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

impl PipelineError {
    pub(crate) fn device(source_uri: impl Into<String>, reason: impl ToString) -> Self {
        Self::DeviceUnavailable {
            source_uri: source_uri.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::IoWriteFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the clean end-of-stream condition.
    pub fn is_stream_exhausted(&self) -> bool {
        matches!(self, Self::StreamExhausted)
    }
}
