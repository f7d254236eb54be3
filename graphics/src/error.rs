//! Graphics error types.

use std::fmt::Display;

/// Errors that can occur in the graphics system.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphicsError {
    /// Failed to initialize the graphics system.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Abort on an unrecoverable pipeline condition.
///
/// Resource creation inside a frame has no degraded fallback: the error is
/// logged and the thread panics.
#[track_caller]
pub fn fatal(context: &str, err: impl Display) -> ! {
    log::error!("{context}: {err}");
    panic!("{context}: {err}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = GraphicsError::InitializationFailed("no GPU found".to_string());
        assert_eq!(err.to_string(), "initialization failed: no GPU found");
    }

    #[test]
    #[should_panic(expected = "gbuffer albedo: invalid parameter: zero size")]
    fn test_fatal_panics_with_context() {
        fatal(
            "gbuffer albedo",
            GraphicsError::InvalidParameter("zero size".into()),
        );
    }
}
