// SPDX-License-Identifier: MPL-2.0

//! Photobooth - a kiosk photo booth that stylizes portraits through a
//! node-graph generation service and shares the result by QR code
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Screen state machine, countdown and the kiosk driver
//! - [`backends`]: Camera source abstraction
//! - [`pipelines`]: Still capture (crop, mirror, encode)
//! - [`generation`]: Job submission, polling and result persistence
//! - [`storage`]: Object stores and result naming
//! - [`locator`]: Mapping result identifiers to storage URLs
//! - [`server`]: Local HTTP surface
//! - [`config`]: Configuration loading
//!
//! # Example
//!
//! ```ignore
//! // Serve the HTTP surface with the default configuration:
//! // photobooth serve --addr 0.0.0.0:3000
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod generation;
pub mod locator;
pub mod pipelines;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use app::{Kiosk, Screen};
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use generation::{GenerationContext, GenerationJobClient, SubmitOutcome};
pub use pipelines::photo::{CapturedFrame, FrameCapture};
