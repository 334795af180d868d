// SPDX-License-Identifier: MPL-2.0

//! Durable storage for processed photos
//!
//! Results are written once under `<namespace>/<prefix>_<retrieval id>.jpg`
//! and never modified or deleted by the booth. Three stores share the
//! [`ObjectStore`] trait:
//!
//! - [`HttpObjectStore`]: `PUT` to a remote object store with public read
//! - [`LocalObjectStore`]: a directory, served back by the booth under `/media`
//! - [`MemoryObjectStore`]: in-process map for tests and dry runs

use crate::config::{StorageBackend, StorageSettings};
use crate::constants;
use crate::errors::StorageError;
use chrono::{DateTime, Local};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// A persisted result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    /// Key inside the store (`<namespace>/<file name>`)
    pub key: String,
    /// Public URL of the object
    pub url: String,
    /// URL that makes the store force a download
    pub download_url: String,
    pub content_type: String,
    /// Size in bytes
    pub size: usize,
    /// Short identifier the booth hands out instead of the storage URL
    pub retrieval_id: String,
}

/// Naming of stored results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNaming {
    pub namespace: String,
    pub prefix: String,
    pub extension: String,
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self {
            namespace: constants::storage::NAMESPACE.to_string(),
            prefix: constants::storage::FILE_PREFIX.to_string(),
            extension: constants::storage::FILE_EXTENSION.to_string(),
        }
    }
}

impl From<&StorageSettings> for ArtifactNaming {
    fn from(settings: &StorageSettings) -> Self {
        Self {
            namespace: settings.namespace.clone(),
            prefix: settings.file_prefix.clone(),
            ..Default::default()
        }
    }
}

impl ArtifactNaming {
    /// Fresh retrieval identifier for a result stored now
    pub fn new_retrieval_id(&self) -> String {
        let suffix: String = uuid::Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(constants::storage::RANDOM_SUFFIX_LEN)
            .collect();
        retrieval_id(&Local::now(), &suffix)
    }

    /// File name for an identifier, optionally with a variant suffix
    pub fn file_name(&self, id: &str, variant: Option<&str>) -> String {
        match variant {
            Some(variant) => format!("{}_{}_{}.{}", self.prefix, id, variant, self.extension),
            None => format!("{}_{}.{}", self.prefix, id, self.extension),
        }
    }

    /// Storage key for an identifier
    pub fn key(&self, id: &str) -> String {
        format!("{}/{}", self.namespace, self.file_name(id, None))
    }
}

/// `ddMMyyyyHHmmss_<suffix>`
pub fn retrieval_id(at: &DateTime<Local>, suffix: &str) -> String {
    format!("{}_{}", at.format(constants::storage::TIMESTAMP_FORMAT), suffix)
}

/// Check a storage key: `/`-separated segments of `[A-Za-z0-9._-]`, no `.` or `..`
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        });
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Join a base URL and a key with exactly one slash
pub fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

/// `url` with `download=1` appended to its query
pub fn download_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.query_pairs_mut().append_pair("download", "1");
            parsed.to_string()
        }
        Err(_) => format!("{}?download=1", url),
    }
}

/// Durable object store
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` with public read access, returning the public URL
    fn put<'a>(
        &'a self,
        key: &'a str,
        bytes: Vec<u8>,
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<String, StorageError>>;

    /// Read an object back
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<u8>, StorageError>>;

    /// Public URL an object is (or would be) readable at
    fn public_url(&self, key: &str) -> String;
}

/// Build the store described by the settings
pub fn from_settings(
    settings: &StorageSettings,
    client: reqwest::Client,
) -> Arc<dyn ObjectStore> {
    match &settings.backend {
        StorageBackend::Http { upload_url, token } => Arc::new(HttpObjectStore::new(
            client,
            upload_url.clone(),
            settings.public_base_url.clone(),
            token.clone(),
        )),
        StorageBackend::Local { .. } => {
            let dir = settings
                .local_dir()
                .unwrap_or_else(crate::config::default_media_dir);
            Arc::new(LocalObjectStore::new(dir, settings.public_base_url.clone()))
        }
    }
}

/// Remote object store accepting `PUT <upload_url>/<key>`
pub struct HttpObjectStore {
    client: reqwest::Client,
    upload_url: String,
    public_base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct PutResponse {
    url: Option<String>,
}

impl HttpObjectStore {
    pub fn new(
        client: reqwest::Client,
        upload_url: String,
        public_base_url: String,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            upload_url,
            public_base_url,
            token,
        }
    }
}

impl ObjectStore for HttpObjectStore {
    fn put<'a>(
        &'a self,
        key: &'a str,
        bytes: Vec<u8>,
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<String, StorageError>> {
        Box::pin(async move {
            validate_key(key)?;
            let target = join_url(&self.upload_url, key);
            let size = bytes.len();
            debug!(%target, size, "Uploading object");

            let mut request = self
                .client
                .put(&target)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .header("x-amz-acl", "public-read")
                .body(bytes);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| StorageError::Transport(e.to_string()))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| StorageError::Transport(e.to_string()))?;
            if !status.is_success() {
                return Err(StorageError::Rejected {
                    status: status.as_u16(),
                    body,
                });
            }

            let url = serde_json::from_str::<PutResponse>(&body)
                .ok()
                .and_then(|r| r.url)
                .unwrap_or_else(|| self.public_url(key));
            info!(%key, size, "Object uploaded");
            Ok(url)
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<u8>, StorageError>> {
        Box::pin(async move {
            validate_key(key)?;
            let response = self
                .client
                .get(self.public_url(key))
                .send()
                .await
                .map_err(|e| StorageError::Transport(e.to_string()))?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(StorageError::NotFound(key.to_string()));
            }
            let response = response
                .error_for_status()
                .map_err(|e| StorageError::Transport(e.to_string()))?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| StorageError::Transport(e.to_string()))?;
            Ok(bytes.to_vec())
        })
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.public_base_url, key)
    }
}

/// Directory-backed store
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

impl ObjectStore for LocalObjectStore {
    fn put<'a>(
        &'a self,
        key: &'a str,
        bytes: Vec<u8>,
        _content_type: &'a str,
    ) -> BoxFuture<'a, Result<String, StorageError>> {
        Box::pin(async move {
            let path = self.path_for(key)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &bytes).await?;
            info!(path = %path.display(), size = bytes.len(), "Object written");
            Ok(self.public_url(key))
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<u8>, StorageError>> {
        Box::pin(async move {
            let path = self.path_for(key)?;
            match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(StorageError::NotFound(key.to_string()))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.public_base_url, key)
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryObjectStore {
    public_base_url: String,
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryObjectStore {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            public_base_url: public_base_url.into(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    /// Stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Content type recorded for a key
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .ok()?
            .get(key)
            .map(|(_, content_type)| content_type.clone())
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put<'a>(
        &'a self,
        key: &'a str,
        bytes: Vec<u8>,
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<String, StorageError>> {
        Box::pin(async move {
            validate_key(key)?;
            let mut objects = self
                .objects
                .lock()
                .map_err(|_| StorageError::Io("memory store poisoned".into()))?;
            objects.insert(key.to_string(), (bytes, content_type.to_string()));
            Ok(self.public_url(key))
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<u8>, StorageError>> {
        Box::pin(async move {
            let objects = self
                .objects
                .lock()
                .map_err(|_| StorageError::Io("memory store poisoned".into()))?;
            objects
                .get(key)
                .map(|(bytes, _)| bytes.clone())
                .ok_or_else(|| StorageError::NotFound(key.to_string()))
        })
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.public_base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_retrieval_id_format() {
        let at = Local.with_ymd_and_hms(2025, 3, 7, 9, 5, 4).unwrap();
        assert_eq!(retrieval_id(&at, "ab12cd3"), "07032025090504_ab12cd3");
    }

    #[test]
    fn test_new_ids_are_url_safe_and_distinct() {
        let naming = ArtifactNaming::default();
        let a = naming.new_retrieval_id();
        let b = naming.new_retrieval_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 14 + 1 + 7);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn test_key_layout() {
        let naming = ArtifactNaming::default();
        assert_eq!(
            naming.key("07032025090504_ab12cd3"),
            "totem-fotos/gasto_fantasma_07032025090504_ab12cd3.jpg"
        );
        assert_eq!(
            naming.file_name("id", Some("thumb")),
            "gasto_fantasma_id_thumb.jpg"
        );
    }

    #[test]
    fn test_key_validation() {
        assert!(validate_key("totem-fotos/a_b.jpg").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("a//b").is_err());
        assert!(validate_key("a/b c.jpg").is_err());
    }

    #[test]
    fn test_download_url_appends_query() {
        assert_eq!(
            download_url("https://cdn.example.com/a/b.jpg"),
            "https://cdn.example.com/a/b.jpg?download=1"
        );
        assert_eq!(
            download_url("https://cdn.example.com/b.jpg?v=2"),
            "https://cdn.example.com/b.jpg?v=2&download=1"
        );
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryObjectStore::new("https://cdn.example.com/");
        let url = store
            .put("totem-fotos/x.jpg", vec![1, 2, 3], "image/jpeg")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/totem-fotos/x.jpg");
        assert_eq!(store.get("totem-fotos/x.jpg").await.unwrap(), vec![1, 2, 3]);
        assert_eq!(
            store.content_type("totem-fotos/x.jpg").as_deref(),
            Some("image/jpeg")
        );
        assert!(matches!(
            store.get("missing.jpg").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_local_store_writes_under_root() {
        let root = std::env::temp_dir().join(format!("photobooth-store-{}", uuid::Uuid::new_v4()));
        let store = LocalObjectStore::new(&root, "http://localhost:3000/media");
        let url = store
            .put("totem-fotos/y.jpg", vec![9; 4], "image/jpeg")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:3000/media/totem-fotos/y.jpg");
        assert!(root.join("totem-fotos").join("y.jpg").exists());
        assert!(store.put("../escape.jpg", vec![], "image/jpeg").await.is_err());
        std::fs::remove_dir_all(root).ok();
    }
}
