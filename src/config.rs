// SPDX-License-Identifier: GPL-3.0-only

//! Booth configuration
//!
//! Loaded from an optional JSON file, then overridden from `PHOTOBOOTH_*`
//! environment variables, then from command line flags in `main`.

use crate::constants;
use crate::errors::{AppError, AppResult};
use crate::generation::job::PollPolicy;
use crate::generation::recipe::RecipeParams;
use crate::locator::IdentifierScheme;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Still capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Mirror the still horizontally (selfie mode)
    pub mirror: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: constants::capture::OUTPUT_WIDTH,
            height: constants::capture::OUTPUT_HEIGHT,
            jpeg_quality: constants::capture::JPEG_QUALITY,
            mirror: true,
        }
    }
}

/// Generation service endpoints and polling policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Base URL of the job server (liveness, submit, history)
    pub server_url: String,
    /// Base URL of the file server that exposes generated outputs
    pub files_url: String,
    pub liveness_path: String,
    pub submit_path: String,
    /// JSON field wrapping the graph in the submission body
    pub submit_field: String,
    /// History path template with a `{job_id}` placeholder
    pub history_path: String,
    /// Output file path template with a `{filename}` placeholder
    pub files_path: String,
    /// Graph node whose images are the final result
    pub output_node: String,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub stability_window_ms: u64,
    pub health_timeout_ms: u64,
    pub submit_timeout_ms: u64,
    /// Parameters baked into the processing recipe
    pub recipe: RecipeParams,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        use constants::generation as g;
        Self {
            server_url: "http://127.0.0.1:8188".to_string(),
            files_url: "http://127.0.0.1:8888".to_string(),
            liveness_path: g::LIVENESS_PATH.to_string(),
            submit_path: g::SUBMIT_PATH.to_string(),
            submit_field: g::SUBMIT_FIELD.to_string(),
            history_path: g::HISTORY_PATH.to_string(),
            files_path: g::FILES_PATH.to_string(),
            output_node: g::OUTPUT_NODE.to_string(),
            poll_interval_ms: g::POLL_INTERVAL.as_millis() as u64,
            max_poll_attempts: g::MAX_POLL_ATTEMPTS,
            stability_window_ms: g::STABILITY_WINDOW.as_millis() as u64,
            health_timeout_ms: g::HEALTH_TIMEOUT.as_millis() as u64,
            submit_timeout_ms: g::SUBMIT_TIMEOUT.as_millis() as u64,
            recipe: RecipeParams::default(),
        }
    }
}

impl GenerationSettings {
    /// Poll loop policy derived from these settings
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_poll_attempts,
            stability_window: Duration::from_millis(self.stability_window_ms),
        }
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

/// Where processed results are persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StorageBackend {
    /// Remote object store reachable with `PUT <upload_url>/<key>`
    Http {
        upload_url: String,
        /// Bearer token sent with uploads
        #[serde(default)]
        token: Option<String>,
    },
    /// Directory on this machine, served by the booth under `/media`
    Local {
        /// Defaults to `<Pictures>/photobooth`
        #[serde(default)]
        dir: Option<PathBuf>,
    },
}

impl Default for StorageBackend {
    fn default() -> Self {
        StorageBackend::Local { dir: None }
    }
}

/// Storage naming and public addressing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Public base URL stored objects are readable from
    pub public_base_url: String,
    /// Key prefix (folder) for booth results
    pub namespace: String,
    /// Filename prefix for booth results
    pub file_prefix: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            public_base_url: "http://localhost:3000/media".to_string(),
            namespace: constants::storage::NAMESPACE.to_string(),
            file_prefix: constants::storage::FILE_PREFIX.to_string(),
        }
    }
}

impl StorageSettings {
    /// Directory used by the local backend
    pub fn local_dir(&self) -> Option<PathBuf> {
        match &self.backend {
            StorageBackend::Local { dir } => Some(dir.clone().unwrap_or_else(default_media_dir)),
            StorageBackend::Http { .. } => None,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Socket address the HTTP surface binds to
    pub listen_addr: String,
    /// Origin visitors reach the booth at (QR codes point here)
    pub public_url: String,
    pub capture: CaptureSettings,
    pub generation: GenerationSettings,
    pub storage: StorageSettings,
    /// How retrieval identifiers map to storage URLs
    pub identifier_scheme: IdentifierScheme,
    /// Check the result is reachable before showing the QR code
    pub verify_results: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            public_url: "http://localhost:3000".to_string(),
            capture: CaptureSettings::default(),
            generation: GenerationSettings::default(),
            storage: StorageSettings::default(),
            identifier_scheme: IdentifierScheme::default(),
            verify_results: true,
        }
    }
}

impl Config {
    /// Load configuration from an optional JSON file plus the process environment
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let mut config = match path {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    AppError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_json(&raw)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(raw: &str) -> AppResult<Self> {
        serde_json::from_str(raw).map_err(|e| AppError::Config(format!("invalid JSON: {}", e)))
    }

    /// Apply `PHOTOBOOTH_*` overrides from a variable lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PHOTOBOOTH_ADDR") {
            self.listen_addr = v;
        }
        if let Some(v) = lookup("PHOTOBOOTH_PUBLIC_URL") {
            self.public_url = v;
        }
        if let Some(v) = lookup("PHOTOBOOTH_GENERATION_URL") {
            self.generation.server_url = v;
        }
        if let Some(v) = lookup("PHOTOBOOTH_FILES_URL") {
            self.generation.files_url = v;
        }
        if let Some(v) = lookup("PHOTOBOOTH_STORAGE_PUBLIC_URL") {
            self.storage.public_base_url = v;
        }
        if let Some(v) = lookup("PHOTOBOOTH_STORAGE_URL") {
            let token = match &self.storage.backend {
                StorageBackend::Http { token, .. } => token.clone(),
                StorageBackend::Local { .. } => None,
            };
            self.storage.backend = StorageBackend::Http {
                upload_url: v,
                token,
            };
        }
        if let Some(v) = lookup("PHOTOBOOTH_STORAGE_TOKEN") {
            if let StorageBackend::Http { token, .. } = &mut self.storage.backend {
                *token = Some(v);
            }
        }
        if let Some(v) = lookup("PHOTOBOOTH_STORAGE_DIR") {
            if let StorageBackend::Local { dir } = &mut self.storage.backend {
                *dir = Some(PathBuf::from(v));
            }
        }
        if let Some(v) = lookup("PHOTOBOOTH_ID_SCHEME") {
            match v.parse::<IdentifierScheme>() {
                Ok(scheme) => self.identifier_scheme = scheme,
                Err(e) => debug!(value = %v, error = %e, "Ignoring invalid PHOTOBOOTH_ID_SCHEME"),
            }
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(AppError::Config("capture size must be non-zero".into()));
        }
        if !(1..=100).contains(&self.capture.jpeg_quality) {
            return Err(AppError::Config("jpeg_quality must be within 1-100".into()));
        }
        if self.generation.max_poll_attempts == 0 {
            return Err(AppError::Config("max_poll_attempts must be positive".into()));
        }

        let mut urls = vec![
            ("public_url", self.public_url.as_str()),
            ("generation.server_url", self.generation.server_url.as_str()),
            ("generation.files_url", self.generation.files_url.as_str()),
            ("storage.public_base_url", self.storage.public_base_url.as_str()),
        ];
        if let StorageBackend::Http { upload_url, .. } = &self.storage.backend {
            urls.push(("storage.upload_url", upload_url.as_str()));
        }
        for (name, value) in urls {
            url::Url::parse(value)
                .map_err(|e| AppError::Config(format!("{} is not a valid URL: {}", name, e)))?;
        }

        Ok(())
    }
}

/// Default directory for locally stored results
pub fn default_media_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("photobooth")
}
