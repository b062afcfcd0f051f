//! # Decoder Error Types
//!
//! Error types for native decoder lifecycle, streaming decode and worker
//! offload operations.

use crate::native_error::NativeError;
use thiserror::Error;

/// Errors that can occur while driving a native decoder.
#[derive(Error, Debug)]
pub enum DecoderError {
    // ========================================================================
    // Input Errors
    // ========================================================================
    /// Request was malformed (missing payload, frame larger than the input
    /// buffer, inconsistent channel data).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // Native Errors
    // ========================================================================
    /// The native module refused a chunk of input.
    #[error(
        "Could not enqueue {len} bytes at input offset {offset} for decoding. \
         The stream may be invalid."
    )]
    EnqueueFailed { offset: usize, len: usize },

    /// The native decoder returned a negative status code.
    #[error(transparent)]
    Decode(#[from] NativeError),

    /// The native allocator returned a null pointer.
    #[error("Native allocation of {bytes} bytes failed")]
    AllocationFailed { bytes: usize },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Operation requires a ready decoder; await `ready()` first.
    #[error("Decoder is not ready")]
    NotReady,

    /// Decoder has been freed and can no longer be used.
    #[error("Decoder has been freed")]
    Freed,

    /// Native module could not be instantiated or no loader is registered.
    #[error("Native module unavailable: {0}")]
    ModuleUnavailable(String),

    // ========================================================================
    // Worker Errors
    // ========================================================================
    /// Worker thread could not be started or stopped before replying.
    #[error("Decoder worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// A response did not match any outstanding request.
    #[error("Worker protocol violation: {0}")]
    ProtocolViolation(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Configuration failed validation.
    #[error("Invalid decoder configuration: {0}")]
    Config(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DecoderError {
    /// Returns `true` if the error originated in the native module.
    pub fn is_native(&self) -> bool {
        matches!(
            self,
            DecoderError::EnqueueFailed { .. }
                | DecoderError::Decode(_)
                | DecoderError::AllocationFailed { .. }
        )
    }

    /// Returns `true` if the instance must be reset (or replaced) before it
    /// can decode again.
    ///
    /// Native decode failures leave the codec state mid-stream; a freed or
    /// dead worker never recovers.
    pub fn is_fatal_for_instance(&self) -> bool {
        matches!(
            self,
            DecoderError::EnqueueFailed { .. }
                | DecoderError::Decode(_)
                | DecoderError::Freed
                | DecoderError::WorkerUnavailable(_)
        )
    }

    /// The native error carried by a [`DecoderError::Decode`].
    pub fn native_error(&self) -> Option<&NativeError> {
        match self {
            DecoderError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for decoder operations.
pub type Result<T> = std::result::Result<T, DecoderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native_error::NativeErrorCategory;

    #[test]
    fn test_decode_error_is_transparent() {
        let err = DecoderError::from(NativeError::new("libopusfile", -3));
        assert_eq!(
            err.to_string(),
            "libopusfile -3: There was a hole in the page sequence numbers \
             (e.g., a page was corrupt or missing)."
        );
        assert_eq!(
            err.native_error().map(NativeError::category),
            Some(NativeErrorCategory::PageSequenceHole)
        );
    }

    #[test]
    fn test_classification() {
        assert!(DecoderError::EnqueueFailed { offset: 0, len: 1 }.is_native());
        assert!(DecoderError::AllocationFailed { bytes: 8 }.is_native());
        assert!(!DecoderError::NotReady.is_native());

        assert!(DecoderError::Freed.is_fatal_for_instance());
        assert!(!DecoderError::NotReady.is_fatal_for_instance());
        assert!(!DecoderError::InvalidInput("x".into()).is_fatal_for_instance());
    }
}
