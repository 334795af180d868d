// SPDX-License-Identifier: MPL-2.0

//! Still photo pipeline
//!
//! ```text
//! CameraStream → read frame → crop 9:16 → scale → mirror → JPEG → CapturedFrame
//! ```
//!
//! # Pipeline Stages
//!
//! 1. **Capture**: take the current frame from the live stream
//! 2. **Post-Processing**: centered crop, scale to the output size, mirror
//! 3. **Encoding**: JPEG at fixed quality (PNG for the CLI)
//!
//! Stages 2 and 3 are CPU bound and run on the blocking pool when called
//! from async code.

pub mod capture;
pub mod encoding;
pub mod processing;

pub use capture::{CaptureSpec, CapturedFrame, FrameCapture};
pub use encoding::{EncodedImage, EncodingFormat, PhotoEncoder};
pub use processing::{CropRect, PostProcessingConfig, PostProcessor, ProcessedImage, crop_rect};
