// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use crate::errors::CameraError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CameraBackendType {
    /// Still images dropped on disk by an external capture device
    #[default]
    File,
    /// Generated test pattern
    Synthetic,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::File => write!(f, "file"),
            CameraBackendType::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// A single frame from the live stream
///
/// Pixels are tightly packed RGBA unless `stride` says otherwise. The data is
/// reference counted so a frame can be handed to the blocking pool without
/// copying.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// RGBA pixels
    pub data: Arc<[u8]>,
    /// Bytes per row, may include padding
    pub stride: u32,
    /// When the frame was read from the source
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Build a frame from tightly packed RGBA pixels
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(pixels.into_boxed_slice()),
            stride: width * 4,
            captured_at: Instant::now(),
        }
    }

    /// Native aspect ratio (width / height), `None` for an empty frame
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some(self.width as f64 / self.height as f64)
        }
    }

    /// Whether the frame has usable dimensions and enough data for them
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.stride >= self.width * 4
            && self.data.len() >= (self.stride as usize) * (self.height as usize)
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur in camera backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Access to the device was refused
    PermissionDenied(String),
    /// Failed to open the device
    InitializationFailed(String),
    /// Stream has no usable frame yet
    NotReady,
    /// Stream was already released
    StreamStopped,
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::NotReady => write!(f, "Stream not ready"),
            BackendError::StreamStopped => write!(f, "Stream stopped"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => BackendError::DeviceNotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => BackendError::PermissionDenied(err.to_string()),
            _ => BackendError::IoError(err.to_string()),
        }
    }
}

impl From<BackendError> for CameraError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotAvailable(_) | BackendError::DeviceNotFound(_) => {
                CameraError::NoCameraFound
            }
            BackendError::PermissionDenied(msg) => CameraError::PermissionDenied(msg),
            BackendError::NotReady => CameraError::NotReady,
            other => CameraError::Unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_validity() {
        let frame = CameraFrame::from_rgba(2, 2, vec![0; 16]);
        assert!(frame.is_valid());
        assert_eq!(frame.aspect_ratio(), Some(1.0));

        let short = CameraFrame::from_rgba(2, 2, vec![0; 8]);
        assert!(!short.is_valid());

        let empty = CameraFrame::from_rgba(0, 0, Vec::new());
        assert!(!empty.is_valid());
        assert_eq!(empty.aspect_ratio(), None);
    }

    #[test]
    fn test_backend_error_maps_to_camera_error() {
        assert_eq!(
            CameraError::from(BackendError::DeviceNotFound("/dev/video0".into())),
            CameraError::NoCameraFound
        );
        assert_eq!(
            CameraError::from(BackendError::PermissionDenied("denied".into())),
            CameraError::PermissionDenied("denied".into())
        );
        assert!(matches!(
            CameraError::from(BackendError::StreamStopped),
            CameraError::Unavailable(_)
        ));
    }
}
