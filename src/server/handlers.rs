// SPDX-License-Identifier: MPL-2.0

//! Route handlers

use super::AppState;
use super::error::ApiError;
use crate::constants;
use crate::errors::{ProcessingError, RetrievalError};
use crate::generation::SubmitOutcome;
use crate::locator::content_disposition;
use crate::pipelines::photo::{CapturedFrame, EncodingFormat};
use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Body of a successful `/process` call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub success: bool,
    pub blob_url: String,
    pub download_url: String,
    pub image_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadImageQuery {
    pub id: Option<String>,
    pub suffix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuffixQuery {
    pub suffix: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// `POST /process`: run one uploaded still through the generation pipeline
pub async fn process(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidUpload(e.to_string()))?
    {
        if field.name() == Some(constants::server::IMAGE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::InvalidUpload(e.to_string()))?;
            upload = Some(bytes.to_vec());
            break;
        }
    }

    let bytes = upload
        .filter(|bytes| !bytes.is_empty())
        .ok_or(ProcessingError::NoImage)?;
    let frame =
        CapturedFrame::from_encoded(bytes).map_err(|e| ApiError::InvalidUpload(e.to_string()))?;
    info!(frame = %frame.id, width = frame.width, height = frame.height, "Processing upload");

    let client = state.generation.client();
    match client.submit(&frame).await? {
        SubmitOutcome::Completed(artifact) => Ok(Json(ProcessResponse {
            success: true,
            image_id: state.locator.identifier_for(&artifact),
            blob_url: artifact.url,
            download_url: artifact.download_url,
        })),
        SubmitOutcome::Ignored => Err(ProcessingError::Internal(
            "submission was not accepted".to_string(),
        )
        .into()),
    }
}

/// `GET /download-image`: proxy a stored result with forced-download headers
pub async fn download_image(
    State(state): State<AppState>,
    Query(query): Query<DownloadImageQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = query.id.ok_or(ApiError::Proxy(RetrievalError::MissingId))?;
    let url = state
        .locator
        .locate(&id, query.suffix.as_deref())
        .map_err(ApiError::Proxy)?;
    let fetched = state.locator.fetch(&url).await.map_err(ApiError::Proxy)?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok());
    let disposition = content_disposition(user_agent, constants::storage::DOWNLOAD_FILENAME);
    debug!(%url, size = fetched.bytes.len(), "Proxying result");

    let content_type = HeaderValue::from_str(&fetched.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(constants::storage::CONTENT_TYPE));
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| ApiError::Proxy(RetrievalError::Internal(e.to_string())))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        fetched.bytes,
    )
        .into_response())
}

/// `GET /download/{id}`: redirect to the stored result
pub async fn download_redirect(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SuffixQuery>,
) -> Result<Response, ApiError> {
    let url = state
        .locator
        .locate(&id, query.suffix.as_deref())
        .map_err(ApiError::Redirect)?;
    let location = HeaderValue::from_str(&url)
        .map_err(|_| ApiError::Redirect(RetrievalError::InvalidIdentifier(id.clone())))?;
    debug!(%id, %url, "Redirecting to result");
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

/// `GET /media/{*key}`: serve the local store
pub async fn media(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = state
        .generation
        .store
        .get(&key)
        .await
        .map_err(ApiError::Media)?;
    let content_type = EncodingFormat::from_path(std::path::Path::new(&key))
        .map(|format| format.content_type())
        .unwrap_or("application/octet-stream");
    Ok((
        [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
        bytes,
    )
        .into_response())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("GIT_VERSION"),
    })
}
