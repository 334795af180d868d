// SPDX-License-Identifier: GPL-3.0-only

//! Photo encoding
//!
//! - JPEG (with quality control), used for every booth capture
//! - PNG (lossless), offered by the CLI for inspection
//!
//! Encoding runs on the blocking pool from async callers.

use super::processing::ProcessedImage;
use crate::constants;
use crate::errors::CaptureError;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Supported encoding formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodingFormat {
    /// JPEG format (lossy compression)
    #[default]
    Jpeg,
    /// PNG format (lossless compression)
    Png,
}

impl EncodingFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            EncodingFormat::Jpeg => "jpg",
            EncodingFormat::Png => "png",
        }
    }

    /// MIME type of the encoded payload
    pub fn content_type(&self) -> &'static str {
        match self {
            EncodingFormat::Jpeg => "image/jpeg",
            EncodingFormat::Png => "image/png",
        }
    }

    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(EncodingFormat::Jpeg),
            "png" => Some(EncodingFormat::Png),
            _ => None,
        }
    }
}

/// Encoded image data ready for upload or saving
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: EncodingFormat,
    pub width: u32,
    pub height: u32,
}

/// Photo encoder
#[derive(Debug, Clone, Copy)]
pub struct PhotoEncoder {
    format: EncodingFormat,
    quality: u8,
}

impl PhotoEncoder {
    /// Create a new encoder with JPEG format at booth quality
    pub fn new() -> Self {
        Self {
            format: EncodingFormat::Jpeg,
            quality: constants::capture::JPEG_QUALITY,
        }
    }

    pub fn with_format(format: EncodingFormat, quality: u8) -> Self {
        let mut encoder = Self::new();
        encoder.set_format(format);
        encoder.set_quality(quality);
        encoder
    }

    /// Set encoding format
    pub fn set_format(&mut self, format: EncodingFormat) {
        self.format = format;
    }

    /// Set JPEG quality (clamped to 1-100, ignored for PNG)
    pub fn set_quality(&mut self, quality: u8) {
        self.quality = quality.clamp(1, 100);
    }

    pub fn format(&self) -> EncodingFormat {
        self.format
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode on the current thread
    pub fn encode_blocking(
        &self,
        processed: &ProcessedImage,
    ) -> Result<EncodedImage, CaptureError> {
        let data = match self.format {
            EncodingFormat::Jpeg => Self::encode_jpeg(&processed.image, self.quality)?,
            EncodingFormat::Png => Self::encode_png(&processed.image)?,
        };

        debug!(size = data.len(), format = ?self.format, "Encoding complete");

        Ok(EncodedImage {
            data,
            format: self.format,
            width: processed.width,
            height: processed.height,
        })
    }

    /// Save encoded image to disk
    ///
    /// A directory target gets a timestamped `IMG_` filename; any other
    /// path is written as-is.
    pub async fn save(encoded: &EncodedImage, target: &Path) -> std::io::Result<PathBuf> {
        let filepath = if tokio::fs::metadata(target)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            target.join(format!("IMG_{}.{}", timestamp, encoded.format.extension()))
        } else {
            target.to_path_buf()
        };

        if let Some(parent) = filepath.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&filepath, &encoded.data).await?;

        info!(path = %filepath.display(), size = encoded.data.len(), "Photo saved");
        Ok(filepath)
    }

    /// Encode image as JPEG
    fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, CaptureError> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);

        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);

        encoder
            .encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| CaptureError::EncodingFailed(format!("JPEG encoding failed: {}", e)))?;

        Ok(buffer)
    }

    /// Encode image as PNG
    fn encode_png(image: &RgbImage) -> Result<Vec<u8>, CaptureError> {
        let mut buffer = Vec::new();

        image
            .write_to(
                &mut std::io::Cursor::new(&mut buffer),
                image::ImageFormat::Png,
            )
            .map_err(|e| CaptureError::EncodingFailed(format!("PNG encoding failed: {}", e)))?;

        Ok(buffer)
    }
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::photo::processing::crop_rect;

    fn processed(width: u32, height: u32) -> ProcessedImage {
        ProcessedImage {
            image: RgbImage::from_pixel(width, height, image::Rgb([200, 100, 50])),
            width,
            height,
            crop: crop_rect(width, height, width as f64 / height as f64),
        }
    }

    #[test]
    fn test_format_metadata() {
        assert_eq!(EncodingFormat::Jpeg.extension(), "jpg");
        assert_eq!(EncodingFormat::Png.content_type(), "image/png");
        assert_eq!(
            EncodingFormat::from_path(Path::new("out/photo.JPEG")),
            Some(EncodingFormat::Jpeg)
        );
        assert_eq!(EncodingFormat::from_path(Path::new("photo.gif")), None);
    }

    #[test]
    fn test_quality_is_clamped() {
        let encoder = PhotoEncoder::with_format(EncodingFormat::Jpeg, 0);
        assert_eq!(encoder.quality(), 1);
        assert_eq!(PhotoEncoder::new().quality(), 90);
    }

    #[test]
    fn test_jpeg_output_decodes_to_same_size() {
        let encoded = PhotoEncoder::new().encode_blocking(&processed(36, 64)).unwrap();
        assert_eq!(&encoded.data[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&encoded.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (36, 64));
    }

    #[test]
    fn test_png_signature() {
        let encoded = PhotoEncoder::with_format(EncodingFormat::Png, 90)
            .encode_blocking(&processed(4, 4))
            .unwrap();
        assert_eq!(&encoded.data[1..4], b"PNG");
    }
}
