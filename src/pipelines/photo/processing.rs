// SPDX-License-Identifier: MPL-2.0

//! Post-processing for captured frames
//!
//! - Center crop to the target aspect ratio (never letterbox, never stretch)
//! - RGBA to RGB conversion (drop alpha channel)
//! - Scale to the fixed output size
//! - Horizontal mirror (selfie orientation)
//!
//! Every step is a pure function of the input frame, so the same frame
//! always produces the same pixels.

use crate::backends::camera::types::CameraFrame;
use crate::constants;
use crate::errors::CaptureError;
use image::RgbImage;
use image::imageops::{self, FilterType};
use tracing::debug;

/// Region of the source frame that survives the crop
///
/// Kept in fractional source pixels so the ratio is exact; use
/// [`CropRect::to_pixels`] for the sampled region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    /// Integer region (x, y, width, height) clamped to the source bounds
    pub fn to_pixels(&self, src_width: u32, src_height: u32) -> (u32, u32, u32, u32) {
        let width = (self.width.round() as u32).clamp(1, src_width.max(1));
        let height = (self.height.round() as u32).clamp(1, src_height.max(1));
        let x = (self.x.round() as u32).min(src_width.saturating_sub(width));
        let y = (self.y.round() as u32).min(src_height.saturating_sub(height));
        (x, y, width, height)
    }
}

/// Centered crop of a `src_width` x `src_height` frame to `target_aspect` (width / height)
///
/// A source wider than the target keeps its full height and loses columns
/// on both sides; otherwise it keeps its full width and loses rows above
/// and below.
pub fn crop_rect(src_width: u32, src_height: u32, target_aspect: f64) -> CropRect {
    let (w, h) = (src_width as f64, src_height as f64);
    let source_aspect = w / h;

    if source_aspect > target_aspect {
        let width = h * target_aspect;
        CropRect {
            x: (w - width) / 2.0,
            y: 0.0,
            width,
            height: h,
        }
    } else {
        let height = w / target_aspect;
        CropRect {
            x: 0.0,
            y: (h - height) / 2.0,
            width: w,
            height,
        }
    }
}

/// Post-processing configuration
#[derive(Debug, Clone)]
pub struct PostProcessingConfig {
    /// Target aspect ratio as width / height
    pub target_aspect: f64,
    /// Output size in pixels
    pub output_width: u32,
    pub output_height: u32,
    /// Flip horizontally after cropping
    pub mirror: bool,
}

impl Default for PostProcessingConfig {
    fn default() -> Self {
        Self {
            target_aspect: constants::capture::target_aspect(),
            output_width: constants::capture::OUTPUT_WIDTH,
            output_height: constants::capture::OUTPUT_HEIGHT,
            mirror: true,
        }
    }
}

/// Processed image data
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub image: RgbImage,
    pub width: u32,
    pub height: u32,
    /// Region of the source that was kept
    pub crop: CropRect,
}

/// Post-processor for captured frames
#[derive(Debug, Clone)]
pub struct PostProcessor {
    config: PostProcessingConfig,
}

impl PostProcessor {
    /// Create a new post-processor with the given configuration
    pub fn new(config: PostProcessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PostProcessingConfig {
        &self.config
    }

    /// Crop, scale and mirror a frame on the current thread
    pub fn process_blocking(&self, frame: &CameraFrame) -> Result<ProcessedImage, CaptureError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(CaptureError::ResourceUnavailable(
                "video source has no dimensions yet".into(),
            ));
        }
        if !frame.is_valid() {
            return Err(CaptureError::ResourceUnavailable(format!(
                "frame data too small for {}x{}",
                frame.width, frame.height
            )));
        }

        let rgb = Self::convert_rgba_to_rgb(frame)?;
        let crop = crop_rect(frame.width, frame.height, self.config.target_aspect);
        let (x, y, w, h) = crop.to_pixels(frame.width, frame.height);

        let cropped = imageops::crop_imm(&rgb, x, y, w, h).to_image();
        let mut output = imageops::resize(
            &cropped,
            self.config.output_width,
            self.config.output_height,
            FilterType::Triangle,
        );
        if self.config.mirror {
            imageops::flip_horizontal_in_place(&mut output);
        }

        debug!(
            src_width = frame.width,
            src_height = frame.height,
            crop_x = x,
            crop_y = y,
            crop_width = w,
            crop_height = h,
            mirror = self.config.mirror,
            "Frame cropped and scaled"
        );

        Ok(ProcessedImage {
            width: output.width(),
            height: output.height(),
            image: output,
            crop,
        })
    }

    /// Convert RGBA data to RGB image (drop alpha channel), honoring row stride
    fn convert_rgba_to_rgb(frame: &CameraFrame) -> Result<RgbImage, CaptureError> {
        let stride = frame.stride as usize;
        let row_bytes = frame.width as usize * 4;

        let rgb_data: Vec<u8> = frame
            .data
            .chunks(stride)
            .take(frame.height as usize)
            .flat_map(|row| {
                row[..row_bytes]
                    .chunks_exact(4)
                    .flat_map(|rgba| [rgba[0], rgba[1], rgba[2]])
            })
            .collect();

        RgbImage::from_raw(frame.width, frame.height, rgb_data).ok_or_else(|| {
            CaptureError::ResourceUnavailable("failed to create RGB image from frame".into())
        })
    }
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new(PostProcessingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::synthetic::gradient_frame;

    #[test]
    fn test_landscape_crops_width_centered() {
        let crop = crop_rect(1920, 1080, 9.0 / 16.0);
        assert_eq!(crop.height, 1080.0);
        assert!((crop.width - 607.5).abs() < 1e-9);
        assert!((crop.x - (1920.0 - 607.5) / 2.0).abs() < 1e-9);
        assert_eq!(crop.y, 0.0);
        assert!((crop.aspect_ratio() - 9.0 / 16.0).abs() < constants::capture::ASPECT_TOLERANCE);
    }

    #[test]
    fn test_tall_source_crops_height_centered() {
        let crop = crop_rect(1000, 3000, 9.0 / 16.0);
        assert_eq!(crop.width, 1000.0);
        assert!((crop.height - 1000.0 * 16.0 / 9.0).abs() < 1e-9);
        assert!((crop.y - (3000.0 - crop.height) / 2.0).abs() < 1e-9);
        assert_eq!(crop.x, 0.0);
    }

    #[test]
    fn test_matching_aspect_keeps_everything() {
        let crop = crop_rect(1080, 1920, 9.0 / 16.0);
        assert_eq!(crop.to_pixels(1080, 1920), (0, 0, 1080, 1920));
    }

    #[test]
    fn test_zero_sized_frame_is_unavailable() {
        let frame = CameraFrame::from_rgba(0, 0, Vec::new());
        let err = PostProcessor::default().process_blocking(&frame).unwrap_err();
        assert!(matches!(err, CaptureError::ResourceUnavailable(_)));
    }

    #[test]
    fn test_mirror_flips_columns() {
        let frame = gradient_frame(64, 32);
        let config = PostProcessingConfig {
            target_aspect: 2.0,
            output_width: 64,
            output_height: 32,
            mirror: false,
        };
        let plain = PostProcessor::new(config.clone()).process_blocking(&frame).unwrap();
        let mirrored = PostProcessor::new(PostProcessingConfig { mirror: true, ..config })
            .process_blocking(&frame)
            .unwrap();

        for y in [0, 15, 31] {
            for x in [0, 10, 63] {
                assert_eq!(
                    plain.image.get_pixel(x, y),
                    mirrored.image.get_pixel(63 - x, y)
                );
            }
        }
        // Red ramps up left to right in the source, so it ramps down once mirrored
        assert!(mirrored.image.get_pixel(0, 0)[0] > mirrored.image.get_pixel(63, 0)[0]);
    }

    #[test]
    fn test_padded_stride_is_respected() {
        let mut pixels = Vec::new();
        for _ in 0..2 {
            pixels.extend_from_slice(&[1, 2, 3, 255, 4, 5, 6, 255]);
            pixels.extend_from_slice(&[9, 9, 9, 9]);
        }
        let frame = CameraFrame {
            stride: 12,
            ..CameraFrame::from_rgba(2, 2, pixels)
        };
        let rgb = PostProcessor::convert_rgba_to_rgb(&frame).unwrap();
        assert_eq!(rgb.as_raw(), &vec![1, 2, 3, 4, 5, 6, 1, 2, 3, 4, 5, 6]);
    }
}
