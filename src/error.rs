/*
 * Error taxonomy for the control core.
 *
 * Usage errors (`InvalidArgument`, `InvalidOperation`, `ObjectDisposed`) abort
 * the offending call and are never retried. Native failures surface as
 * `Platform`; callers that can tolerate them (geometry adjustment, positioning)
 * log and fall back instead of propagating.
 */
use crate::types::ControlId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("invalid native handle: {0}")]
    InvalidHandle(String),
    #[error("platform operation failed: {0}")]
    OperationFailed(String),
    #[error("platform initialization failed: {0}")]
    InitializationFailed(String),
}

#[cfg(target_os = "windows")]
impl From<windows::core::Error> for PlatformError {
    fn from(err: windows::core::Error) -> Self {
        PlatformError::OperationFailed(format!("{err}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("control {0:?} has been disposed")]
    ObjectDisposed(ControlId),
    #[error("marshaled call panicked: {0}")]
    InvocationPanicked(String),
    #[error("event handler failed: {0}")]
    HandlerFailed(String),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

pub type Result<T> = std::result::Result<T, ControlError>;
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Error type returned by fallible event handlers (drag-and-drop callbacks).
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
