// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants
//!
//! Timings and sizes that shape the visitor flow. Most of them can be
//! overridden through [`crate::config::Config`]; these are the defaults.

use std::time::Duration;

/// Still capture geometry and encoding
pub mod capture {
    /// Target aspect ratio numerator (portrait 9:16)
    pub const TARGET_ASPECT_WIDTH: u32 = 9;

    /// Target aspect ratio denominator
    pub const TARGET_ASPECT_HEIGHT: u32 = 16;

    /// Output still width in pixels
    pub const OUTPUT_WIDTH: u32 = 1080;

    /// Output still height in pixels
    pub const OUTPUT_HEIGHT: u32 = 1920;

    /// JPEG quality (0-100) used for captured stills
    pub const JPEG_QUALITY: u8 = 90;

    /// Floating point tolerance when comparing aspect ratios
    pub const ASPECT_TOLERANCE: f64 = 1e-6;

    /// Target aspect ratio as width / height
    pub fn target_aspect() -> f64 {
        TARGET_ASPECT_WIDTH as f64 / TARGET_ASPECT_HEIGHT as f64
    }
}

/// Countdown and flash timings
pub mod countdown {
    use super::Duration;

    /// Visible counter start value
    pub const START_COUNT: u32 = 3;

    /// Interval between counter ticks
    pub const TICK_INTERVAL: Duration = Duration::from_millis(1000);

    /// How long the white flash cue stays on screen
    pub const FLASH_DURATION: Duration = Duration::from_millis(120);

    /// Delay between the capture and the forced switch to review
    pub const CAPTURE_HANDOFF_DELAY: Duration = Duration::from_millis(100);

    /// Poll interval while waiting for the camera stream to report ready
    pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// Give up waiting for a ready stream after this long
    pub const READY_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Screen sequencing
pub mod navigation {
    use super::Duration;

    /// Cooldown after each transition during which non-forced requests are dropped
    pub const LOCK_COOLDOWN: Duration = Duration::from_millis(500);
}

/// Processing screen timings
pub mod processing {
    use super::Duration;

    /// Pause before submitting so the processing screen is visible
    pub const START_DELAY: Duration = Duration::from_millis(500);

    /// How long the "ready" message stays before showing the result
    pub const SUCCESS_DISPLAY: Duration = Duration::from_millis(1000);
}

/// Generation service protocol
pub mod generation {
    use super::Duration;

    /// Liveness probe timeout
    pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

    /// Job submission timeout
    pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Interval between status polls
    pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

    /// Maximum number of status polls (about three minutes at 1s)
    pub const MAX_POLL_ATTEMPTS: u32 = 180;

    /// Artifacts must stay present this long before the job counts as done
    pub const STABILITY_WINDOW: Duration = Duration::from_secs(3);

    /// Graph node whose images are the final output
    pub const OUTPUT_NODE: &str = "53";

    /// Filename prefix the save node writes with
    pub const OUTPUT_FILENAME_PREFIX: &str = "tapp";

    /// Liveness endpoint path
    pub const LIVENESS_PATH: &str = "/system_stats";

    /// Job submission endpoint path
    pub const SUBMIT_PATH: &str = "/prompt";

    /// JSON field that wraps the graph in the submission body
    pub const SUBMIT_FIELD: &str = "prompt";

    /// Job history path template, `{job_id}` is substituted
    pub const HISTORY_PATH: &str = "/history/{job_id}";

    /// Output file path template on the file server, `{filename}` is substituted
    pub const FILES_PATH: &str = "/files/workspace/ComfyUI/output/{filename}";
}

/// Durable storage naming
pub mod storage {
    /// Folder (key prefix) all booth results are stored under
    pub const NAMESPACE: &str = "totem-fotos";

    /// Filename prefix of stored results
    pub const FILE_PREFIX: &str = "gasto_fantasma";

    /// Stored result extension
    pub const FILE_EXTENSION: &str = "jpg";

    /// Stored result content type
    pub const CONTENT_TYPE: &str = "image/jpeg";

    /// chrono format of the timestamp part of retrieval identifiers (ddMMyyyyHHmmss)
    pub const TIMESTAMP_FORMAT: &str = "%d%m%Y%H%M%S";

    /// Length of the random part of retrieval identifiers
    pub const RANDOM_SUFFIX_LEN: usize = 7;

    /// Filename offered to visitors when the download is forced
    pub const DOWNLOAD_FILENAME: &str = "gastos_fantasmas.jpg";
}

/// Local HTTP surface
pub mod server {
    /// Largest accepted `/process` upload
    pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

    /// Multipart field carrying the captured still
    pub const IMAGE_FIELD: &str = "image";

    /// Route prefix the local storage backend is served under
    pub const MEDIA_ROUTE: &str = "/media";
}

/// Supported still image inputs
pub mod file_formats {
    /// Image extensions the file camera backend can load
    pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp"];

    /// Check whether a lowercase extension is a loadable image
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext)
    }
}
