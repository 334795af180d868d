// SPDX-License-Identifier: MPL-2.0

//! HTTP error responses

use crate::errors::{ProcessingError, RetrievalError, StorageError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Errors crossing the local HTTP surface
///
/// Retrieval errors are split by route: an unusable identifier is a client
/// error on the proxy but simply "not found" on the redirect.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Processing(#[from] ProcessingError),
    /// Failure on `/download-image`
    #[error("{0}")]
    Proxy(RetrievalError),
    /// Failure on `/download/{id}`
    #[error("{0}")]
    Redirect(RetrievalError),
    /// Upload could not be read as an image
    #[error("invalid upload: {0}")]
    InvalidUpload(String),
    /// Failure serving the local store
    #[error("{0}")]
    Media(StorageError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Processing(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::Proxy(e) => match e {
                RetrievalError::MissingId | RetrievalError::InvalidIdentifier(_) => {
                    StatusCode::BAD_REQUEST
                }
                RetrievalError::NotFound(_) => StatusCode::NOT_FOUND,
                RetrievalError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Redirect(e) => match e {
                RetrievalError::MissingId => StatusCode::BAD_REQUEST,
                RetrievalError::InvalidIdentifier(_) | RetrievalError::NotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                RetrievalError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::Media(e) => match e {
                StorageError::InvalidKey(_) | StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::Processing(e) => ErrorBody {
                error: e.user_message(),
                details: e.details(),
            },
            ApiError::Proxy(e) | ApiError::Redirect(e) => ErrorBody {
                error: match e {
                    RetrievalError::MissingId => "missing id",
                    RetrievalError::InvalidIdentifier(_) => "invalid id",
                    RetrievalError::NotFound(_) => "fetch failed",
                    RetrievalError::Internal(_) => "internal error",
                }
                .to_string(),
                details: None,
            },
            ApiError::InvalidUpload(detail) => ErrorBody {
                error: "invalid image".to_string(),
                details: Some(detail.clone()),
            },
            ApiError::Media(StorageError::InvalidKey(_) | StorageError::NotFound(_)) => {
                ErrorBody {
                    error: "not found".to_string(),
                    details: None,
                }
            }
            ApiError::Media(_) => ErrorBody {
                error: "internal error".to_string(),
                details: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(%status, error = %self, "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}
