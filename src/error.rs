//! Error types for the segmentation pipeline.
//!
//! Numeric stages guard their own preconditions and degrade to no-ops, so only
//! structural problems (mismatched buffers, bad configuration), inference
//! failures and cancellation surface here. A full event list is not an error;
//! see [`Append::Dropped`](crate::Append::Dropped).

use thiserror::Error;

use crate::schedule::Stage;

/// Failure reported by an [`InferenceEngine`](crate::InferenceEngine).
///
/// Always scoped to a single window: the adapter stays usable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InferenceError {
    /// The engine could not provide its input tensor (arena exhausted).
    #[error("tensor allocation failed")]
    Allocation,

    /// The engine ran but reported a failed invocation.
    #[error("model invocation failed")]
    Invocation,
}

/// Errors that can occur while conditioning, filtering, detecting or
/// dispatching a sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Two buffers that must have equal length do not.
    #[error("buffer length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Length the stage was set up for.
        expected: usize,
        /// Length it was handed.
        actual: usize,
    },

    /// The first scanned sample is invalid and nothing precedes it.
    #[error("sample {index} is invalid and has no predecessor to hold")]
    MissingSeed {
        /// Index of the unseeded sample.
        index: usize,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The trimmed event span does not fit inside the sample buffer.
    #[error("event window {left}..{right} does not fit a buffer of {len} samples")]
    WindowOutOfBounds {
        /// Left bound of the event window.
        left: usize,
        /// Right bound of the event window.
        right: usize,
        /// Length of the sample buffer.
        len: usize,
    },

    /// The trimmed event span does not match the engine's input size.
    #[error("inference window holds {actual} samples, engine expects {expected}")]
    WindowLengthMismatch {
        /// Engine input length.
        expected: usize,
        /// Samples available in the trimmed span.
        actual: usize,
    },

    /// The inference engine failed for this window.
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),

    /// The scheduler asked a long-running stage to stop.
    #[error("{stage} cancelled at sample {position}")]
    Cancelled {
        /// Stage that was running.
        stage: Stage,
        /// First sample not yet processed.
        position: usize,
    },
}

impl Error {
    /// Creates a length mismatch error.
    #[must_use]
    pub const fn length_mismatch(expected: usize, actual: usize) -> Self {
        Self::LengthMismatch { expected, actual }
    }

    /// Returns true for failures confined to one inference window.
    #[must_use]
    pub const fn is_per_window(&self) -> bool {
        matches!(
            self,
            Self::Inference(_) | Self::WindowOutOfBounds { .. } | Self::WindowLengthMismatch { .. }
        )
    }
}
