// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Capturing a single still from a file or synthetic camera
//! - Processing an existing still through the generation service
//! - Running one kiosk visit headless

use clap::Args;
use photobooth::app::{Kiosk, Screen};
use photobooth::backends::camera::{
    CameraBackend, FileCameraBackend, SyntheticCameraBackend, SyntheticOptions,
};
use photobooth::config::Config;
use photobooth::errors::AppError;
use photobooth::generation::{GenerationContext, SubmitOutcome};
use photobooth::locator::{ResultLocator, share_url};
use photobooth::pipelines::photo::{CaptureSpec, CapturedFrame, FrameCapture, PhotoEncoder};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where frames come from
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Image file, or directory whose newest image is used
    #[arg(short, long, conflicts_with = "synthetic")]
    input: Option<PathBuf>,

    /// Use a generated test pattern instead of a real source
    #[arg(long)]
    synthetic: bool,
}

impl SourceArgs {
    fn backend(&self) -> Result<Arc<dyn CameraBackend>, AppError> {
        match (&self.input, self.synthetic) {
            (Some(path), _) => Ok(Arc::new(FileCameraBackend::new(path.clone()))),
            (None, true) => Ok(Arc::new(SyntheticCameraBackend::new(
                SyntheticOptions::default(),
            ))),
            (None, false) => Err(AppError::Config(
                "Pass --input <path> or --synthetic".to_string(),
            )),
        }
    }
}

fn http_client() -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .build()
        .map_err(|e| AppError::Config(format!("HTTP client: {e}")))
}

/// Capture one still and save it
pub async fn capture(
    config: &Config,
    source: &SourceArgs,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = source.backend()?;
    println!("Using source: {}", backend.backend_type());

    let mut stream = backend.open()?;
    let capture = FrameCapture::new(CaptureSpec::from(&config.capture));
    let frame = capture.capture_from_stream(&mut stream).await?;
    stream.release();

    println!(
        "Captured {}x{} from {}x{} source",
        frame.width, frame.height, frame.source_width, frame.source_height
    );

    let target = output
        .or_else(|| config.storage.local_dir())
        .unwrap_or_else(|| PathBuf::from("."));
    let path = PhotoEncoder::save(&frame.to_encoded(), &target).await?;
    println!("Photo saved: {}", path.display());
    Ok(())
}

/// Process an existing still and print where the result lives
pub async fn process(config: &Config, image: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = tokio::fs::read(image).await?;
    let frame = CapturedFrame::from_encoded(bytes)?;
    println!("Processing {} ({}x{})", image.display(), frame.width, frame.height);

    let client = http_client()?;
    let context = GenerationContext::from_config(config, client.clone());
    let locator = ResultLocator::from_config(config, client);

    match context.client().submit(&frame).await? {
        SubmitOutcome::Completed(artifact) => {
            let id = locator.identifier_for(&artifact);
            println!("Stored:   {}", artifact.url);
            println!("Download: {}", artifact.download_url);
            println!("Share:    {}", share_url(&config.public_url, &id));
            Ok(())
        }
        SubmitOutcome::Ignored => Err("Submission was not accepted".into()),
    }
}

/// Run one visit: start, countdown, accept, result
///
/// Ctrl+C during the countdown aborts back to the welcome screen.
pub async fn booth(
    config: &Config,
    source: &SourceArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = source.backend()?;
    let mut kiosk = Kiosk::from_config(config, backend, http_client()?);

    let mut view = kiosk.subscribe();
    let printer = tokio::spawn(async move {
        while view.changed().await.is_ok() {
            let current = view.borrow_and_update().clone();
            if let Some(count) = current.countdown {
                println!("[{}] {:?}", current.screen, count);
            } else if let Some(stage) = current.processing {
                println!("[{}] {}", current.screen, stage.message());
            }
        }
    });

    let abort = kiosk.abort_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort_countdown();
        }
    });

    let result = run_visit(&mut kiosk).await;
    ctrl_c.abort();
    kiosk.reset();
    drop(kiosk);
    let _ = printer.await;
    result
}

async fn run_visit(kiosk: &mut Kiosk) -> Result<(), Box<dyn std::error::Error>> {
    let screen = kiosk.start().await;
    expect_screen(kiosk, "start", screen, Screen::Camera)?;

    kiosk.settle().await;
    let screen = kiosk.take_photo().await;
    expect_screen(kiosk, "countdown", screen, Screen::Review)?;

    kiosk.settle().await;
    let screen = kiosk.accept().await;
    expect_screen(kiosk, "processing", screen, Screen::Result)?;

    if let Some(url) = kiosk.session().result_url() {
        println!("Scan to download: {url}");
    }
    Ok(())
}

fn expect_screen(
    kiosk: &Kiosk,
    step: &str,
    actual: Screen,
    expected: Screen,
) -> Result<(), Box<dyn std::error::Error>> {
    if actual == expected {
        return Ok(());
    }
    let reason = kiosk
        .session()
        .error_message()
        .unwrap_or("visit ended early");
    Err(format!("{step}: {reason} (now on {actual})").into())
}
