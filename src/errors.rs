// SPDX-License-Identifier: MPL-2.0

//! Error types for the photo booth
//!
//! Each subsystem has its own error enum; [`AppError`] aggregates them for
//! the CLI and the kiosk driver. Every variant carries enough context to
//! build the single user-facing message the error screen shows.

use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// Camera acquisition errors
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
    /// Still capture errors
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
    /// Generation pipeline errors
    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),
    /// Result retrieval errors
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
    /// Storage/filesystem errors
    #[error("Storage error: {0}")]
    Storage(String),
    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Camera acquisition errors (surfaced to the visitor as "camera unavailable")
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    /// No camera devices found
    #[error("No camera devices found")]
    NoCameraFound,
    /// The visitor (or the platform) refused camera access
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),
    /// The device exists but could not be opened
    #[error("Camera unavailable: {0}")]
    Unavailable(String),
    /// The stream never reported usable dimensions
    #[error("Camera stream not ready")]
    NotReady,
}

/// Still capture errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// Video source or drawing surface unavailable (not ready, zero size, released)
    #[error("Capture resources unavailable: {0}")]
    ResourceUnavailable(String),
    /// Encoding the still failed
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
}

/// Generation pipeline errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessingError {
    /// No image was provided for processing
    #[error("No image to process")]
    NoImage,
    /// Liveness probe failed
    #[error("Generation service unavailable: {0}")]
    ServiceUnavailable(String),
    /// The service rejected the job
    #[error("Job submission failed ({status:?}): {body}")]
    SubmissionFailed {
        /// HTTP status returned by the service, if any
        status: Option<u16>,
        /// Response body or transport error text
        body: String,
    },
    /// The service reported an explicit execution failure
    #[error("Generation failed: {0}")]
    ExecutionError(String),
    /// No stable result within the polling budget
    #[error("No stable result after {attempts} polls")]
    Timeout {
        /// Polls performed before giving up
        attempts: u32,
    },
    /// Network failure outside the poll loop
    #[error("Transport error: {0}")]
    Transport(String),
    /// Service answered with something we could not interpret
    #[error("Malformed service response: {0}")]
    MalformedResponse(String),
    /// Persisting the result failed
    #[error("Storage failed: {0}")]
    Storage(String),
    /// Anything else, including a crashed processing task
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProcessingError {
    /// HTTP status used when this error crosses the local HTTP surface
    pub fn status_code(&self) -> u16 {
        match self {
            ProcessingError::NoImage => 400,
            ProcessingError::ServiceUnavailable(_) => 503,
            ProcessingError::ExecutionError(_) => 422,
            ProcessingError::SubmissionFailed { .. }
            | ProcessingError::Timeout { .. }
            | ProcessingError::Transport(_)
            | ProcessingError::MalformedResponse(_)
            | ProcessingError::Storage(_)
            | ProcessingError::Internal(_) => 500,
        }
    }

    /// Message shown on the error screen
    pub fn user_message(&self) -> String {
        match self {
            ProcessingError::NoImage => "No image to process".to_string(),
            ProcessingError::ServiceUnavailable(_) => {
                "Cannot reach the processing server. Please check it is running.".to_string()
            }
            ProcessingError::SubmissionFailed { .. } => {
                "The processing server rejected the photo".to_string()
            }
            ProcessingError::ExecutionError(_) => "Processing failed on the server".to_string(),
            ProcessingError::Timeout { .. } => {
                "Timed out waiting for the processed photo. Please try again.".to_string()
            }
            ProcessingError::Storage(_) => "Could not save the processed photo".to_string(),
            ProcessingError::Transport(_)
            | ProcessingError::MalformedResponse(_)
            | ProcessingError::Internal(_) => {
                "Something went wrong while processing the photo".to_string()
            }
        }
    }

    /// Machine-readable detail accompanying [`Self::user_message`]
    pub fn details(&self) -> Option<String> {
        match self {
            ProcessingError::NoImage | ProcessingError::Timeout { .. } => None,
            ProcessingError::ServiceUnavailable(detail)
            | ProcessingError::ExecutionError(detail)
            | ProcessingError::Transport(detail)
            | ProcessingError::MalformedResponse(detail)
            | ProcessingError::Storage(detail)
            | ProcessingError::Internal(detail) => Some(detail.clone()),
            ProcessingError::SubmissionFailed { body, .. } => Some(body.clone()),
        }
    }
}

/// Result retrieval errors at the proxy/redirect boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    /// Request did not carry an identifier
    #[error("missing id")]
    MissingId,
    /// Identifier contains characters that cannot be part of a storage key
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    /// Storage answered with a non-success status
    #[error("fetch failed with status {0}")]
    NotFound(u16),
    /// Unexpected failure (transport, URL composition, ...)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Object storage errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Key is empty or contains path tricks
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
    /// No object under that key
    #[error("object not found: {0}")]
    NotFound(String),
    /// Store answered the upload with a non-success status
    #[error("upload rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status returned by the store
        status: u16,
        /// Response body
        body: String,
    },
    /// Network failure talking to the store
    #[error("transport error: {0}")]
    Transport(String),
    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<StorageError> for ProcessingError {
    fn from(err: StorageError) -> Self {
        ProcessingError::Storage(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl AppError {
    /// Single message for the error screen
    pub fn user_message(&self) -> String {
        match self {
            AppError::Camera(_) => {
                "The camera is not available. Check permissions and reload.".to_string()
            }
            AppError::Capture(_) => "The photo could not be taken. Please try again.".to_string(),
            AppError::Processing(e) => e.user_message(),
            AppError::Retrieval(_) => "The photo could not be retrieved".to_string(),
            AppError::Config(msg) | AppError::Storage(msg) | AppError::Other(msg) => msg.clone(),
        }
    }
}

// Conversion from String for ad-hoc errors
impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

// Conversions for I/O errors
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_status_codes() {
        assert_eq!(
            ProcessingError::ServiceUnavailable("down".into()).status_code(),
            503
        );
        assert_eq!(ProcessingError::ExecutionError("oom".into()).status_code(), 422);
        assert_eq!(ProcessingError::Timeout { attempts: 180 }.status_code(), 500);
        assert_eq!(ProcessingError::NoImage.status_code(), 400);
    }

    #[test]
    fn test_submission_failure_keeps_body_as_detail() {
        let err = ProcessingError::SubmissionFailed {
            status: Some(400),
            body: "{\"error\":\"bad graph\"}".into(),
        };
        assert_eq!(err.details().as_deref(), Some("{\"error\":\"bad graph\"}"));
    }

    #[test]
    fn test_camera_errors_share_one_message() {
        let denied: AppError = CameraError::PermissionDenied("user said no".into()).into();
        let missing: AppError = CameraError::NoCameraFound.into();
        assert_eq!(denied.user_message(), missing.user_message());
    }
}
