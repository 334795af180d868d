// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for frame sources
//!
//! The booth only needs one thing from hardware: a live stream of RGBA
//! frames that it owns exclusively while the visitor is on the camera or
//! countdown screen.
//!
//! ```text
//! ┌──────────────────────┐
//! │   Kiosk driver       │
//! └──────────┬───────────┘
//!            │ open() / release()
//! ┌──────────┴───────────┐
//! │  CameraBackend trait │
//! └──────────┬───────────┘
//!      ┌─────┴──────┐
//!  ┌───┴──┐    ┌────┴─────┐
//!  │ File │    │Synthetic │
//!  └──────┘    └──────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: backend trait, stream handle and the concrete sources

pub mod camera;
