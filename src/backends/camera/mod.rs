// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! A [`CameraBackend`] opens a [`CameraStream`]. The stream is the only
//! handle to the device: whoever holds it owns the camera, and dropping or
//! releasing it stops every track.
//!
//! Streams report readiness through [`CameraStream::dimensions`]. A stream
//! that is still warming up returns `None` and must not be captured from.

pub mod file_source;
pub mod synthetic;
pub mod types;

pub use file_source::FileCameraBackend;
pub use synthetic::{SyntheticCameraBackend, SyntheticOptions, SyntheticStats};
pub use types::*;

use tracing::{debug, info};

/// Source of live frames behind a [`CameraStream`]
pub trait FrameSource: Send {
    /// Native frame size, `None` until the source delivers frames
    fn dimensions(&mut self) -> Option<(u32, u32)>;

    /// Read the current frame
    fn read_frame(&mut self) -> BackendResult<CameraFrame>;

    /// Stop all tracks. Called exactly once.
    fn stop(&mut self);
}

/// Camera backend trait
///
/// Backends are cheap to clone into an `Arc` and shared by the kiosk and the
/// CLI; opening a stream is the point where the device is actually acquired.
pub trait CameraBackend: Send + Sync {
    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Check if this backend can currently open a stream
    fn is_available(&self) -> bool;

    /// Acquire the device and start streaming
    ///
    /// # Returns
    /// * `Ok(CameraStream)` - exclusively owned stream handle
    /// * `Err(BackendError)` - device missing, access refused, or open failed
    fn open(&self) -> BackendResult<CameraStream>;
}

/// Exclusively owned live stream
pub struct CameraStream {
    backend: CameraBackendType,
    source: Option<Box<dyn FrameSource>>,
}

impl CameraStream {
    pub fn new(backend: CameraBackendType, source: Box<dyn FrameSource>) -> Self {
        Self {
            backend,
            source: Some(source),
        }
    }

    /// Backend that produced this stream
    pub fn backend_type(&self) -> CameraBackendType {
        self.backend
    }

    /// Whether tracks are still running
    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    /// Native frame size, `None` while warming up or after release
    pub fn dimensions(&mut self) -> Option<(u32, u32)> {
        self.source
            .as_mut()
            .and_then(|s| s.dimensions())
            .filter(|(w, h)| *w > 0 && *h > 0)
    }

    /// Whether the stream delivers frames with usable dimensions
    pub fn is_ready(&mut self) -> bool {
        self.dimensions().is_some()
    }

    /// Read the current frame from the live source
    pub fn read_frame(&mut self) -> BackendResult<CameraFrame> {
        let source = self.source.as_mut().ok_or(BackendError::StreamStopped)?;
        source.read_frame()
    }

    /// Stop all tracks. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
            info!(backend = %self.backend, "Camera stream released");
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        if self.source.is_some() {
            debug!(backend = %self.backend, "Releasing camera stream on drop");
            self.release();
        }
    }
}

impl std::fmt::Debug for CameraStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStream")
            .field("backend", &self.backend)
            .field("active", &self.is_active())
            .finish()
    }
}
