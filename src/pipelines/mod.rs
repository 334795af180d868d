// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines
//!
//! - [`photo`]: still capture with crop, mirror and JPEG encoding

pub mod photo;
