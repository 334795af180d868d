// SPDX-License-Identifier: GPL-3.0-only

//! Result addressing
//!
//! Turns a retrieval identifier (or a full URL) into the storage URL of a
//! processed photo, checks that it is reachable, and formats the headers
//! that make browsers download it instead of displaying it.

use crate::config::Config;
use crate::constants;
use crate::errors::RetrievalError;
use crate::storage::{ArtifactNaming, StoredArtifact, join_url};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, warn};

/// How identifiers handed to visitors map to stored objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IdentifierScheme {
    /// Identifier is the retrieval id; the file name is derived from it
    #[default]
    Timestamp,
    /// Identifier is the stored object's file name
    OpaqueKey,
}

impl FromStr for IdentifierScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "timestamp" => Ok(IdentifierScheme::Timestamp),
            "opaque-key" | "opaque_key" | "key" => Ok(IdentifierScheme::OpaqueKey),
            other => Err(format!("unknown identifier scheme '{}'", other)),
        }
    }
}

impl std::fmt::Display for IdentifierScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentifierScheme::Timestamp => write!(f, "timestamp"),
            IdentifierScheme::OpaqueKey => write!(f, "opaque-key"),
        }
    }
}

/// A fetched result ready to be proxied
#[derive(Debug, Clone)]
pub struct FetchedResult {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Locates stored results
#[derive(Clone)]
pub struct ResultLocator {
    client: reqwest::Client,
    public_base_url: String,
    naming: ArtifactNaming,
    scheme: IdentifierScheme,
}

impl ResultLocator {
    pub fn new(
        client: reqwest::Client,
        public_base_url: impl Into<String>,
        naming: ArtifactNaming,
        scheme: IdentifierScheme,
    ) -> Self {
        Self {
            client,
            public_base_url: public_base_url.into(),
            naming,
            scheme,
        }
    }

    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        Self::new(
            client,
            config.storage.public_base_url.clone(),
            ArtifactNaming::from(&config.storage),
            config.identifier_scheme,
        )
    }

    pub fn scheme(&self) -> IdentifierScheme {
        self.scheme
    }

    /// Storage URL for an identifier, or the identifier itself if it is a full
    /// URL on the storage origin
    ///
    /// `variant` is inserted before the extension as `_<variant>`.
    pub fn locate(
        &self,
        identifier: &str,
        variant: Option<&str>,
    ) -> Result<String, RetrievalError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(RetrievalError::MissingId);
        }

        if is_full_url(identifier) {
            return self.check_storage_origin(identifier);
        }

        validate_identifier(identifier)?;
        let variant = variant.map(str::trim).filter(|v| !v.is_empty());
        if let Some(variant) = variant {
            validate_identifier(variant)?;
        }

        let file_name = match self.scheme {
            IdentifierScheme::Timestamp => self.naming.file_name(identifier, variant),
            IdentifierScheme::OpaqueKey => insert_variant(identifier, variant),
        };
        let url = join_url(
            &self.public_base_url,
            &format!("{}/{}", self.naming.namespace, file_name),
        );
        debug!(%identifier, %url, "Located result");
        Ok(url)
    }

    /// Full URLs are only followed when they point at the storage origin
    fn check_storage_origin(&self, identifier: &str) -> Result<String, RetrievalError> {
        let invalid = || RetrievalError::InvalidIdentifier(identifier.to_string());
        let requested = url::Url::parse(identifier).map_err(|_| invalid())?;
        let storage = url::Url::parse(&self.public_base_url).map_err(|_| invalid())?;

        if requested.origin() != storage.origin() {
            warn!(
                host = requested.host_str().unwrap_or_default(),
                "Refusing result URL outside storage origin"
            );
            return Err(invalid());
        }
        Ok(identifier.to_string())
    }

    /// Identifier to hand out for a stored result under the configured scheme
    pub fn identifier_for(&self, artifact: &StoredArtifact) -> String {
        match self.scheme {
            IdentifierScheme::Timestamp => artifact.retrieval_id.clone(),
            IdentifierScheme::OpaqueKey => artifact
                .key
                .rsplit_once('/')
                .map(|(_, name)| name)
                .unwrap_or(&artifact.key)
                .to_string(),
        }
    }

    /// `HEAD` the URL; anything but a success status is `NotFound`
    pub async fn check_reachable(&self, url: &str) -> Result<(), RetrievalError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| RetrievalError::Internal(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            warn!(%url, status = %response.status(), "Result not reachable");
            Err(RetrievalError::NotFound(response.status().as_u16()))
        }
    }

    /// Download the result for proxying
    pub async fn fetch(&self, url: &str) -> Result<FetchedResult, RetrievalError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RetrievalError::Internal(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "Upstream refused result");
            return Err(RetrievalError::NotFound(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or(constants::storage::CONTENT_TYPE)
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RetrievalError::Internal(e.to_string()))?;
        Ok(FetchedResult {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

fn is_full_url(identifier: &str) -> bool {
    let lower = identifier.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Identifiers are `[A-Za-z0-9._-]+` without `..`
pub fn validate_identifier(identifier: &str) -> Result<(), RetrievalError> {
    let valid = !identifier.is_empty()
        && !identifier.contains("..")
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(RetrievalError::InvalidIdentifier(identifier.to_string()))
    }
}

fn insert_variant(name: &str, variant: Option<&str>) -> String {
    match (variant, name.rsplit_once('.')) {
        (None, _) => name.to_string(),
        (Some(variant), Some((stem, ext))) if !stem.is_empty() => {
            format!("{}_{}.{}", stem, variant, ext)
        }
        (Some(variant), _) => format!("{}_{}", name, variant),
    }
}

/// Short link encoded in the QR code: `<origin>/download/<id>`
pub fn share_url(origin: &str, retrieval_id: &str) -> String {
    join_url(origin, &format!("download/{}", retrieval_id))
}

/// Whether the user agent is an iOS browser
pub fn is_ios_user_agent(user_agent: &str) -> bool {
    ["iPhone", "iPad", "iPod"]
        .iter()
        .any(|device| user_agent.contains(device))
}

/// `Content-Disposition` value forcing a download
///
/// iOS browsers get the bare filename; everyone else gets the quoted form
/// plus an RFC 5987 `filename*`.
pub fn content_disposition(user_agent: Option<&str>, filename: &str) -> String {
    if user_agent.is_some_and(is_ios_user_agent) {
        return format!("attachment; filename={}", filename);
    }
    let quoted = filename.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        quoted,
        encode_rfc5987(filename)
    )
}

fn encode_rfc5987(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        let keep = byte.is_ascii_alphanumeric()
            || matches!(
                byte,
                b'!' | b'#' | b'$' | b'&' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
            );
        if keep {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(scheme: IdentifierScheme) -> ResultLocator {
        ResultLocator::new(
            reqwest::Client::new(),
            "https://cdn.example.com/",
            ArtifactNaming::default(),
            scheme,
        )
    }

    #[test]
    fn test_timestamp_scheme() {
        let locator = locator(IdentifierScheme::Timestamp);
        assert_eq!(
            locator.locate("07032025090504_ab12cd3", None).unwrap(),
            "https://cdn.example.com/totem-fotos/gasto_fantasma_07032025090504_ab12cd3.jpg"
        );
        assert_eq!(
            locator.locate("07032025090504_ab12cd3", Some("hd")).unwrap(),
            "https://cdn.example.com/totem-fotos/gasto_fantasma_07032025090504_ab12cd3_hd.jpg"
        );
    }

    #[test]
    fn test_opaque_key_scheme() {
        let locator = locator(IdentifierScheme::OpaqueKey);
        assert_eq!(
            locator.locate("photo-1.jpg", None).unwrap(),
            "https://cdn.example.com/totem-fotos/photo-1.jpg"
        );
        assert_eq!(
            locator.locate("photo-1.jpg", Some("hd")).unwrap(),
            "https://cdn.example.com/totem-fotos/photo-1_hd.jpg"
        );
    }

    #[test]
    fn test_full_url_on_storage_origin_passes_through() {
        let locator = locator(IdentifierScheme::Timestamp);
        let url = "https://cdn.example.com/x/y.jpg?token=1";
        assert_eq!(locator.locate(url, Some("ignored")).unwrap(), url);
    }

    #[test]
    fn test_full_url_outside_storage_origin_is_rejected() {
        let locator = locator(IdentifierScheme::Timestamp);
        for url in [
            "https://other.example.org/x/y.jpg",
            "http://cdn.example.com/x/y.jpg",
            "https://cdn.example.com:8443/x/y.jpg",
            "http://169.254.169.254/latest/meta-data/",
        ] {
            assert!(matches!(
                locator.locate(url, None),
                Err(RetrievalError::InvalidIdentifier(_))
            ));
        }
    }

    #[test]
    fn test_rejects_bad_identifiers() {
        let locator = locator(IdentifierScheme::OpaqueKey);
        assert_eq!(locator.locate("  ", None), Err(RetrievalError::MissingId));
        for bad in ["../secret", "a/b", "a b", "x%2F"] {
            assert!(matches!(
                locator.locate(bad, None),
                Err(RetrievalError::InvalidIdentifier(_))
            ));
        }
        assert!(locator.locate("ok", Some("../x")).is_err());
    }

    #[test]
    fn test_identifier_round_trips_through_locate() {
        let artifact = StoredArtifact {
            key: "totem-fotos/gasto_fantasma_07032025090504_ab12cd3.jpg".into(),
            url: "https://cdn.example.com/totem-fotos/gasto_fantasma_07032025090504_ab12cd3.jpg"
                .into(),
            download_url: String::new(),
            content_type: "image/jpeg".into(),
            size: 3,
            retrieval_id: "07032025090504_ab12cd3".into(),
        };
        for scheme in [IdentifierScheme::Timestamp, IdentifierScheme::OpaqueKey] {
            let locator = locator(scheme);
            let id = locator.identifier_for(&artifact);
            assert_eq!(locator.locate(&id, None).unwrap(), artifact.url);
        }
    }

    #[test]
    fn test_share_url() {
        assert_eq!(
            share_url("https://booth.example.com/", "07032025090504_ab12cd3"),
            "https://booth.example.com/download/07032025090504_ab12cd3"
        );
    }

    #[test]
    fn test_content_disposition_by_platform() {
        let ios = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";
        assert_eq!(
            content_disposition(Some(ios), "gastos_fantasmas.jpg"),
            "attachment; filename=gastos_fantasmas.jpg"
        );
        assert_eq!(
            content_disposition(Some("Mozilla/5.0 (X11; Linux x86_64)"), "gastos_fantasmas.jpg"),
            "attachment; filename=\"gastos_fantasmas.jpg\"; filename*=UTF-8''gastos_fantasmas.jpg"
        );
        assert_eq!(
            content_disposition(None, "foto año.jpg"),
            "attachment; filename=\"foto año.jpg\"; filename*=UTF-8''foto%20a%C3%B1o.jpg"
        );
    }

    #[test]
    fn test_scheme_parsing() {
        assert_eq!("opaque-key".parse::<IdentifierScheme>(), Ok(IdentifierScheme::OpaqueKey));
        assert_eq!("Timestamp".parse::<IdentifierScheme>(), Ok(IdentifierScheme::Timestamp));
        assert!("uuid".parse::<IdentifierScheme>().is_err());
    }
}
