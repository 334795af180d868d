// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic test-pattern camera
//!
//! Produces a deterministic gradient so mirroring and cropping can be
//! checked pixel by pixel. Used by the `booth --synthetic` command and the
//! test suite; it can simulate a slow warm-up and a refused device.

use super::{
    BackendError, BackendResult, CameraBackend, CameraBackendType, CameraFrame, CameraStream,
    FrameSource,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Behaviour of the synthetic camera
#[derive(Debug, Clone)]
pub struct SyntheticOptions {
    pub width: u32,
    pub height: u32,
    /// Number of readiness checks answered with "not ready"
    pub warmup_checks: u32,
    /// Error returned from `open()` instead of a stream
    pub open_error: Option<BackendError>,
}

impl Default for SyntheticOptions {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            warmup_checks: 0,
            open_error: None,
        }
    }
}

/// Stream bookkeeping shared with the backend
#[derive(Debug, Default)]
pub struct SyntheticStats {
    opened: AtomicUsize,
    stopped: AtomicUsize,
}

impl SyntheticStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Streams opened and not yet stopped
    pub fn active(&self) -> usize {
        self.opened().saturating_sub(self.stopped())
    }
}

/// Camera backend producing a generated gradient
#[derive(Debug, Clone, Default)]
pub struct SyntheticCameraBackend {
    options: SyntheticOptions,
    stats: Arc<SyntheticStats>,
}

impl SyntheticCameraBackend {
    pub fn new(options: SyntheticOptions) -> Self {
        Self {
            options,
            stats: Arc::new(SyntheticStats::default()),
        }
    }

    /// Shared counters for opened and stopped streams
    pub fn stats(&self) -> Arc<SyntheticStats> {
        Arc::clone(&self.stats)
    }
}

impl CameraBackend for SyntheticCameraBackend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Synthetic
    }

    fn is_available(&self) -> bool {
        self.options.open_error.is_none()
    }

    fn open(&self) -> BackendResult<CameraStream> {
        if let Some(err) = &self.options.open_error {
            return Err(err.clone());
        }
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        debug!(
            width = self.options.width,
            height = self.options.height,
            "Synthetic stream opened"
        );
        let source = SyntheticSource {
            width: self.options.width,
            height: self.options.height,
            warmup_remaining: self.options.warmup_checks,
            stats: Arc::clone(&self.stats),
        };
        Ok(CameraStream::new(CameraBackendType::Synthetic, Box::new(source)))
    }
}

struct SyntheticSource {
    width: u32,
    height: u32,
    warmup_remaining: u32,
    stats: Arc<SyntheticStats>,
}

impl FrameSource for SyntheticSource {
    fn dimensions(&mut self) -> Option<(u32, u32)> {
        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            return None;
        }
        Some((self.width, self.height))
    }

    fn read_frame(&mut self) -> BackendResult<CameraFrame> {
        if self.warmup_remaining > 0 {
            return Err(BackendError::NotReady);
        }
        Ok(gradient_frame(self.width, self.height))
    }

    fn stop(&mut self) {
        self.stats.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Horizontal red ramp, vertical green ramp, constant blue
pub fn gradient_frame(width: u32, height: u32) -> CameraFrame {
    let mut pixels = Vec::with_capacity((width as usize) * (height as usize) * 4);
    for y in 0..height {
        for x in 0..width {
            pixels.push(((x as u64 * 255) / width.max(1) as u64) as u8);
            pixels.push(((y as u64 * 255) / height.max(1) as u64) as u8);
            pixels.push(128);
            pixels.push(255);
        }
    }
    CameraFrame::from_rgba(width, height, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warmup_delays_readiness() {
        let backend = SyntheticCameraBackend::new(SyntheticOptions {
            width: 8,
            height: 4,
            warmup_checks: 2,
            open_error: None,
        });
        let mut stream = backend.open().unwrap();
        assert!(!stream.is_ready());
        assert!(!stream.is_ready());
        assert_eq!(stream.dimensions(), Some((8, 4)));
        assert!(stream.read_frame().unwrap().is_valid());
    }

    #[test]
    fn test_release_and_drop_stop_tracks_once() {
        let backend = SyntheticCameraBackend::default();
        let stats = backend.stats();

        let mut stream = backend.open().unwrap();
        stream.release();
        stream.release();
        assert_eq!(stats.stopped(), 1);
        assert!(matches!(stream.read_frame(), Err(BackendError::StreamStopped)));

        {
            let _stream = backend.open().unwrap();
            assert_eq!(stats.active(), 1);
        }
        assert_eq!(stats.active(), 0);
        assert_eq!(stats.opened(), 2);
    }

    #[test]
    fn test_open_error_is_returned() {
        let backend = SyntheticCameraBackend::new(SyntheticOptions {
            open_error: Some(BackendError::PermissionDenied("kiosk policy".into())),
            ..Default::default()
        });
        assert!(!backend.is_available());
        assert!(matches!(
            backend.open(),
            Err(BackendError::PermissionDenied(_))
        ));
    }
}
