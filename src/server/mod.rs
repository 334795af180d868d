// SPDX-License-Identifier: MPL-2.0

//! Local HTTP surface
//!
//! | Route                  | Purpose                                     |
//! |------------------------|---------------------------------------------|
//! | `POST /process`        | Run an uploaded still through generation    |
//! | `GET /download-image`  | Proxy a result with forced-download headers |
//! | `GET /download/{id}`   | Redirect to a stored result                 |
//! | `GET /media/{*key}`    | Serve the local store (local backend only)  |
//! | `GET /health`          | Liveness and build version                  |

pub mod error;
pub mod handlers;

pub use error::ApiError;

use crate::config::Config;
use crate::constants;
use crate::errors::{AppError, AppResult};
use crate::generation::GenerationContext;
use crate::locator::ResultLocator;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub generation: GenerationContext,
    pub locator: ResultLocator,
    /// Mount `/media` backed by the generation store
    pub serve_media: bool,
}

impl AppState {
    pub fn from_config(config: Config, client: reqwest::Client) -> Self {
        let serve_media = config.storage.local_dir().is_some();
        Self {
            generation: GenerationContext::from_config(&config, client.clone()),
            locator: ResultLocator::from_config(&config, client),
            config: Arc::new(config),
            serve_media,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/process", post(handlers::process))
        .route("/download-image", get(handlers::download_image))
        .route("/download/{id}", get(handlers::download_redirect))
        .route("/health", get(handlers::health));

    if state.serve_media {
        router = router.route(
            &format!("{}/{{*key}}", constants::server::MEDIA_ROUTE),
            get(handlers::media),
        );
    }

    router
        .layer(DefaultBodyLimit::max(constants::server::MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn run(config: Config) -> AppResult<()> {
    let addr = config.listen_addr.clone();
    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| AppError::Config(format!("HTTP client: {e}")))?;
    let state = AppState::from_config(config, client);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, version = env!("GIT_VERSION"), "Photo booth server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
