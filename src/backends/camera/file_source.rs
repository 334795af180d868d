// SPDX-License-Identifier: GPL-3.0-only

//! File-backed camera
//!
//! Streams frames from still images on disk. The path may name a single
//! image, or a directory an external capture device keeps dropping frames
//! into; in that case every read picks the most recently modified image.

use super::{
    BackendError, BackendResult, CameraBackend, CameraBackendType, CameraFrame, CameraStream,
    FrameSource,
};
use crate::constants::file_formats;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Camera backend reading still images from disk
#[derive(Debug, Clone)]
pub struct FileCameraBackend {
    path: PathBuf,
}

impl FileCameraBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CameraBackend for FileCameraBackend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::File
    }

    fn is_available(&self) -> bool {
        resolve_image(&self.path).is_ok()
    }

    fn open(&self) -> BackendResult<CameraStream> {
        let current = resolve_image(&self.path)?;
        info!(path = %current.display(), "File camera stream opened");
        Ok(CameraStream::new(
            CameraBackendType::File,
            Box::new(FileSource {
                root: self.path.clone(),
            }),
        ))
    }
}

struct FileSource {
    root: PathBuf,
}

impl FrameSource for FileSource {
    fn dimensions(&mut self) -> Option<(u32, u32)> {
        let path = resolve_image(&self.root).ok()?;
        image::image_dimensions(&path).ok()
    }

    fn read_frame(&mut self) -> BackendResult<CameraFrame> {
        let path = resolve_image(&self.root)?;
        load_image_as_frame(&path)
    }

    fn stop(&mut self) {
        debug!(path = %self.root.display(), "File camera stream stopped");
    }
}

/// Resolve the image a read should use
///
/// A file path is used as-is; a directory yields its newest image file.
pub fn resolve_image(path: &Path) -> BackendResult<PathBuf> {
    let metadata = std::fs::metadata(path)?;
    if metadata.is_file() {
        return if has_image_extension(path) {
            Ok(path.to_path_buf())
        } else {
            Err(BackendError::Other(format!(
                "Unsupported file format: {}",
                path.display()
            )))
        };
    }

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let candidate = entry.path();
        if !candidate.is_file() || !has_image_extension(&candidate) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::UNIX_EPOCH);
        let is_newer = newest.as_ref().is_none_or(|(best, best_path)| {
            modified > *best || (modified == *best && candidate > *best_path)
        });
        if is_newer {
            newest = Some((modified, candidate));
        }
    }

    newest.map(|(_, p)| p).ok_or_else(|| {
        BackendError::DeviceNotFound(format!("no image frames in {}", path.display()))
    })
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| file_formats::is_image_extension(&e.to_lowercase()))
        .unwrap_or(false)
}

/// Load an image file as an RGBA frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<CameraFrame> {
    debug!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        BackendError::Other(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();
    let data: Vec<u8> = rgba.into_raw();

    debug!(width, height, "Image loaded successfully");

    Ok(CameraFrame {
        data: Arc::from(data.into_boxed_slice()),
        width,
        height,
        stride: width * 4,
        captured_at: Instant::now(),
    })
}
