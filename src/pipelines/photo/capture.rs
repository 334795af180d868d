// SPDX-License-Identifier: MPL-2.0

//! Still capture from a live stream
//!
//! Takes one frame from the stream, crops it to the target aspect ratio,
//! mirrors it and encodes it. The stream itself is never modified.

use super::encoding::{EncodedImage, EncodingFormat, PhotoEncoder};
use super::processing::{CropRect, PostProcessingConfig, PostProcessor};
use crate::backends::camera::CameraStream;
use crate::backends::camera::types::{BackendError, CameraFrame};
use crate::config::CaptureSettings;
use crate::errors::CaptureError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Geometry and encoding of a capture
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSpec {
    /// Target aspect ratio as width / height
    pub target_aspect: f64,
    pub width: u32,
    pub height: u32,
    pub format: EncodingFormat,
    pub quality: u8,
    pub mirror: bool,
}

impl Default for CaptureSpec {
    fn default() -> Self {
        Self::from(&CaptureSettings::default())
    }
}

impl From<&CaptureSettings> for CaptureSpec {
    fn from(settings: &CaptureSettings) -> Self {
        Self {
            target_aspect: settings.width as f64 / settings.height as f64,
            width: settings.width,
            height: settings.height,
            format: EncodingFormat::Jpeg,
            quality: settings.jpeg_quality,
            mirror: settings.mirror,
        }
    }
}

/// An encoded still, immutable once taken
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub id: Uuid,
    pub captured_at: DateTime<Utc>,
    /// Output size in pixels
    pub width: u32,
    pub height: u32,
    /// Native source size
    pub source_width: u32,
    pub source_height: u32,
    /// Region of the source that was kept, `None` for uploaded images
    pub crop: Option<CropRect>,
    pub target_aspect: f64,
    pub format: EncodingFormat,
    payload: Arc<[u8]>,
}

impl CapturedFrame {
    /// Wrap an already encoded image (for example an upload from the browser)
    pub fn from_encoded(bytes: Vec<u8>) -> Result<Self, CaptureError> {
        let format = image::guess_format(&bytes)
            .map_err(|e| CaptureError::EncodingFailed(format!("unrecognised image: {}", e)))?;
        let format = match format {
            image::ImageFormat::Jpeg => EncodingFormat::Jpeg,
            image::ImageFormat::Png => EncodingFormat::Png,
            other => {
                return Err(CaptureError::EncodingFailed(format!(
                    "unsupported image format: {:?}",
                    other
                )));
            }
        };
        let (width, height) = image::ImageReader::new(std::io::Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| CaptureError::EncodingFailed(e.to_string()))?
            .into_dimensions()
            .map_err(|e| CaptureError::EncodingFailed(e.to_string()))?;

        Ok(Self {
            id: Uuid::new_v4(),
            captured_at: Utc::now(),
            width,
            height,
            source_width: width,
            source_height: height,
            crop: None,
            target_aspect: width as f64 / height.max(1) as f64,
            format,
            payload: Arc::from(bytes.into_boxed_slice()),
        })
    }

    /// Encoded image bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// Native aspect ratio of the source
    pub fn source_aspect(&self) -> f64 {
        self.source_width as f64 / self.source_height.max(1) as f64
    }

    /// Output aspect ratio
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }

    /// Payload as standard base64
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.payload)
    }

    /// Payload as a `data:` URL
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type(), self.to_base64())
    }

    /// Copy of the payload for [`PhotoEncoder::save`]
    pub fn to_encoded(&self) -> EncodedImage {
        EncodedImage {
            data: self.payload.to_vec(),
            format: self.format,
            width: self.width,
            height: self.height,
        }
    }
}

/// Crops, mirrors and encodes stills from a live source
#[derive(Debug, Clone)]
pub struct FrameCapture {
    spec: CaptureSpec,
    post_processor: PostProcessor,
    encoder: PhotoEncoder,
}

impl FrameCapture {
    pub fn new(spec: CaptureSpec) -> Self {
        let post_processor = PostProcessor::new(PostProcessingConfig {
            target_aspect: spec.target_aspect,
            output_width: spec.width,
            output_height: spec.height,
            mirror: spec.mirror,
        });
        let encoder = PhotoEncoder::with_format(spec.format, spec.quality);
        Self {
            spec,
            post_processor,
            encoder,
        }
    }

    pub fn spec(&self) -> &CaptureSpec {
        &self.spec
    }

    /// Capture a still from a frame of the live source
    pub fn capture(&self, frame: &CameraFrame) -> Result<CapturedFrame, CaptureError> {
        let processed = self.post_processor.process_blocking(frame)?;
        let crop = processed.crop;
        let encoded = self.encoder.encode_blocking(&processed)?;

        let captured = CapturedFrame {
            id: Uuid::new_v4(),
            captured_at: Utc::now(),
            width: encoded.width,
            height: encoded.height,
            source_width: frame.width,
            source_height: frame.height,
            crop: Some(crop),
            target_aspect: self.spec.target_aspect,
            format: encoded.format,
            payload: Arc::from(encoded.data.into_boxed_slice()),
        };

        info!(
            id = %captured.id,
            width = captured.width,
            height = captured.height,
            source_width = captured.source_width,
            source_height = captured.source_height,
            size = captured.payload.len(),
            "Still captured"
        );
        Ok(captured)
    }

    /// Capture on the blocking pool
    pub async fn capture_async(
        &self,
        frame: Arc<CameraFrame>,
    ) -> Result<CapturedFrame, CaptureError> {
        let capture = self.clone();
        tokio::task::spawn_blocking(move || capture.capture(&frame))
            .await
            .map_err(|e| CaptureError::EncodingFailed(format!("Capture task error: {}", e)))?
    }

    /// Read the current frame from a stream and capture it
    ///
    /// A released stream or one without dimensions is `ResourceUnavailable`.
    pub async fn capture_from_stream(
        &self,
        stream: &mut CameraStream,
    ) -> Result<CapturedFrame, CaptureError> {
        if stream.dimensions().is_none() {
            return Err(CaptureError::ResourceUnavailable(
                "camera stream is not ready".into(),
            ));
        }
        let frame = stream.read_frame().map_err(|e| match e {
            BackendError::NotReady | BackendError::StreamStopped => {
                CaptureError::ResourceUnavailable(e.to_string())
            }
            ref other => {
                CaptureError::ResourceUnavailable(format!("failed to read frame: {}", other))
            }
        })?;
        debug!(width = frame.width, height = frame.height, "Frame read from stream");
        self.capture_async(Arc::new(frame)).await
    }
}

impl Default for FrameCapture {
    fn default() -> Self {
        Self::new(CaptureSpec::default())
    }
}
