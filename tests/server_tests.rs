// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the HTTP routes

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::routing::get;
use futures::future::BoxFuture;
use photobooth::config::Config;
use photobooth::errors::ProcessingError;
use photobooth::generation::{
    ArtifactRef, GenerationContext, GenerationService, PollObservation, PollPolicy,
};
use photobooth::locator::{IdentifierScheme, ResultLocator};
use photobooth::server::{AppState, router};
use photobooth::storage::{ArtifactNaming, MemoryObjectStore};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const STORE_BASE: &str = "https://cdn.test/media";
const BOUNDARY: &str = "booth-boundary";

struct InstantService {
    alive: bool,
}

impl GenerationService for InstantService {
    fn check_liveness(&self) -> BoxFuture<'_, Result<(), ProcessingError>> {
        let alive = self.alive;
        Box::pin(async move {
            if alive {
                Ok(())
            } else {
                Err(ProcessingError::ServiceUnavailable("connection refused".into()))
            }
        })
    }

    fn submit(&self, _graph: Value) -> BoxFuture<'_, Result<String, ProcessingError>> {
        Box::pin(async { Ok("job-1".to_string()) })
    }

    fn fetch_status<'a>(
        &'a self,
        _job_id: &'a str,
    ) -> BoxFuture<'a, Result<PollObservation, ProcessingError>> {
        Box::pin(async { Ok(PollObservation::Artifacts(vec![ArtifactRef::new("out.png")])) })
    }

    fn fetch_artifact<'a>(
        &'a self,
        _artifact: &'a ArtifactRef,
    ) -> BoxFuture<'a, Result<Vec<u8>, ProcessingError>> {
        Box::pin(async { Ok(b"stylized".to_vec()) })
    }
}

fn state(alive: bool, base_url: &str) -> AppState {
    let store = Arc::new(MemoryObjectStore::new(base_url));
    let mut generation = GenerationContext::new(Arc::new(InstantService { alive }), store);
    generation.policy = PollPolicy {
        interval: Duration::from_millis(1),
        max_attempts: 50,
        stability_window: Duration::ZERO,
    };
    AppState {
        config: Arc::new(Config::default()),
        generation,
        locator: ResultLocator::new(
            reqwest::Client::new(),
            base_url,
            ArtifactNaming::default(),
            IdentifierScheme::Timestamp,
        ),
        serve_media: true,
    }
}

fn app() -> Router {
    router(state(true, STORE_BASE))
}

fn jpeg() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(9, 16, image::Rgb([10, 200, 10]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Jpeg,
        )
        .unwrap();
    bytes
}

fn multipart(field: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"photo.jpg\"\r\n\
         Content-Type: image/jpeg\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/process")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_reports_version() {
    let response = app().oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].as_str().is_some_and(|v| !v.is_empty()));
}

#[tokio::test]
async fn test_download_redirects_to_storage() {
    let id = "16102026120000_abc1234";
    let response = app()
        .oneshot(get_request(&format!("/download/{id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        format!("{STORE_BASE}/totem-fotos/gasto_fantasma_{id}.jpg").as_str()
    );
}

#[tokio::test]
async fn test_download_redirect_with_variant() {
    let response = app()
        .oneshot(get_request("/download/16102026120000_abc1234?suffix=thumb"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.ends_with("gasto_fantasma_16102026120000_abc1234_thumb.jpg"));
}

#[tokio::test]
async fn test_download_redirect_rejects_bad_ids() {
    let response = app()
        .oneshot(get_request("/download/a%20b"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_image_requires_id() {
    let response = app()
        .oneshot(get_request("/download-image"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "missing id");
}

async fn spawn_bucket() -> String {
    let bucket = Router::new()
        .route(
            "/media/totem-fotos/{name}",
            get(|| async { ([(header::CONTENT_TYPE, "image/jpeg")], b"jpeg-bytes".to_vec()) }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, bucket).await.unwrap();
    });
    format!("http://{addr}/media")
}

#[tokio::test]
async fn test_download_image_proxies_with_attachment_headers() {
    let base = spawn_bucket().await;
    let app = router(state(true, &base));

    let response = app
        .oneshot(get_request("/download-image?id=16102026120000_abc1234"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"gastos_fantasmas.jpg\""));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"jpeg-bytes");
}

#[tokio::test]
async fn test_download_image_uses_bare_filename_on_ios() {
    let base = spawn_bucket().await;
    let app = router(state(true, &base));

    let request = Request::builder()
        .uri("/download-image?id=16102026120000_abc1234")
        .header(
            header::USER_AGENT,
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)",
        )
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=gastos_fantasmas.jpg"
    );
}

#[tokio::test]
async fn test_download_image_missing_upstream_is_not_found() {
    let base = spawn_bucket().await;
    let app = router(state(true, &base));

    let response = app
        .oneshot(get_request(&format!(
            "/download-image?id={base}/elsewhere/none.jpg"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "fetch failed");
}

#[tokio::test]
async fn test_download_image_refuses_foreign_hosts() {
    let base = spawn_bucket().await;
    let app = router(state(true, &base));

    let response = app
        .oneshot(get_request(
            "/download-image?id=http://169.254.169.254/latest/meta-data/",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid id");
}

#[tokio::test]
async fn test_process_returns_urls_and_serves_media() {
    let app = router(state(true, "http://localhost:3000/media"));

    let response = app.clone().oneshot(multipart("image", &jpeg())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);

    let id = body["imageId"].as_str().unwrap();
    let blob_url = body["blobUrl"].as_str().unwrap();
    assert!(blob_url.ends_with(&format!("gasto_fantasma_{id}.jpg")));
    assert!(body["downloadUrl"].as_str().unwrap().ends_with("download=1"));

    let response = app
        .oneshot(get_request(&format!(
            "/media/totem-fotos/gasto_fantasma_{id}.jpg"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"stylized");
}

#[tokio::test]
async fn test_process_without_image_is_bad_request() {
    let response = app().oneshot(multipart("photo", &jpeg())).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "No image to process");
}

#[tokio::test]
async fn test_process_reports_unavailable_service() {
    let app = router(state(false, STORE_BASE));
    let response = app.oneshot(multipart("image", &jpeg())).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert!(body["error"].as_str().is_some());
    assert_eq!(body["details"], "connection refused");
}

#[tokio::test]
async fn test_unknown_media_is_not_found() {
    let response = app()
        .oneshot(get_request("/media/totem-fotos/missing.jpg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
