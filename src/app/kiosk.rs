// SPDX-License-Identifier: GPL-3.0-only

//! Kiosk driver
//!
//! Runs one visitor interaction at a time over [`AppSession`]. The driver is
//! the single owner of the camera stream: it is opened on the camera and
//! countdown screens and released on every other screen, on error and on
//! drop. Processing runs in a spawned task whose outcome is delivered at
//! most once.

use super::countdown::{CountdownOutcome, CountdownState, CountdownTimings, run_countdown};
use super::state::{AppSession, Screen};
use crate::backends::camera::{CameraBackend, CameraStream};
use crate::config::Config;
use crate::constants;
use crate::errors::{AppError, CameraError, ProcessingError};
use crate::generation::{GenerationContext, GenerationJobClient, SubmitOutcome};
use crate::locator::{ResultLocator, share_url};
use crate::pipelines::photo::{CaptureSpec, CapturedFrame, FrameCapture};
use crate::storage::StoredArtifact;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Fixed delays of the visitor flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KioskTimings {
    pub countdown: CountdownTimings,
    pub lock_cooldown: Duration,
    /// Pause between the capture and the forced switch to review
    pub capture_handoff: Duration,
    /// Pause before submitting so the processing screen is visible
    pub processing_start_delay: Duration,
    /// How long the "ready" stage shows before the result screen
    pub success_display: Duration,
}

impl Default for KioskTimings {
    fn default() -> Self {
        Self {
            countdown: CountdownTimings::default(),
            lock_cooldown: constants::navigation::LOCK_COOLDOWN,
            capture_handoff: constants::countdown::CAPTURE_HANDOFF_DELAY,
            processing_start_delay: constants::processing::START_DELAY,
            success_display: constants::processing::SUCCESS_DISPLAY,
        }
    }
}

/// Progress text for the processing screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    Preparing,
    Submitting,
    Ready,
    Failed,
}

impl ProcessingStage {
    pub fn message(&self) -> &'static str {
        match self {
            ProcessingStage::Preparing => "Preparing image...",
            ProcessingStage::Submitting => "Processing image...",
            ProcessingStage::Ready => "Image ready!",
            ProcessingStage::Failed => "Error processing image",
        }
    }
}

/// Everything a front end needs to render the current screen
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KioskView {
    pub screen: Screen,
    pub countdown: Option<CountdownState>,
    pub processing: Option<ProcessingStage>,
    /// QR payload on the result screen
    pub result_url: Option<String>,
    pub error_message: Option<String>,
}

/// How a processing task ended
#[derive(Debug, Clone)]
pub enum ProcessingOutcome {
    Stored(StoredArtifact),
    Failed(ProcessingError),
    /// Torn down before completion; nothing to report
    Dropped,
}

/// Processing of one captured frame on a spawned task
///
/// Dropping the task before it finishes tears it down, so a late result is
/// discarded instead of reaching a screen that has moved on.
pub struct ProcessingTask {
    client: Arc<GenerationJobClient>,
    handle: Option<JoinHandle<Result<SubmitOutcome, ProcessingError>>>,
    finished: bool,
}

impl ProcessingTask {
    pub fn spawn(context: &GenerationContext, frame: CapturedFrame) -> Self {
        let client = Arc::new(context.client());
        let task_client = Arc::clone(&client);
        let handle = tokio::spawn(async move { task_client.submit(&frame).await });
        Self {
            client,
            handle: Some(handle),
            finished: false,
        }
    }

    /// Discard whatever the task produces from now on
    pub fn tear_down(&self) {
        self.client.tear_down();
    }

    /// Wait for the single terminal outcome
    pub async fn join(mut self) -> ProcessingOutcome {
        let Some(handle) = self.handle.take() else {
            return ProcessingOutcome::Dropped;
        };
        let result = handle.await;
        self.finished = true;

        match result {
            Ok(Ok(SubmitOutcome::Completed(artifact))) => ProcessingOutcome::Stored(artifact),
            Ok(Ok(SubmitOutcome::Ignored)) => ProcessingOutcome::Dropped,
            Ok(Err(e)) => ProcessingOutcome::Failed(e),
            Err(_) if self.client_torn_down() => ProcessingOutcome::Dropped,
            Err(e) => {
                let detail = if e.is_panic() {
                    "processing task panicked"
                } else {
                    "processing task was cancelled"
                };
                error!(detail, "Processing task did not finish");
                ProcessingOutcome::Failed(ProcessingError::Internal(detail.to_string()))
            }
        }
    }

    fn client_torn_down(&self) -> bool {
        self.client.is_torn_down()
    }
}

impl Drop for ProcessingTask {
    fn drop(&mut self) {
        if !self.finished {
            self.tear_down();
        }
    }
}

/// Cancels a running countdown from another task
#[derive(Clone)]
pub struct CountdownAbort {
    tx: Arc<watch::Sender<bool>>,
}

impl CountdownAbort {
    pub fn abort_countdown(&self) {
        info!("Countdown abort requested");
        self.tx.send_replace(true);
    }
}

/// Drives the visitor flow
pub struct Kiosk {
    session: AppSession,
    camera: Arc<dyn CameraBackend>,
    stream: Option<CameraStream>,
    capture: FrameCapture,
    generation: GenerationContext,
    locator: ResultLocator,
    verify_results: bool,
    public_url: String,
    timings: KioskTimings,
    cancel_tx: Arc<watch::Sender<bool>>,
    view_tx: watch::Sender<KioskView>,
}

impl Kiosk {
    pub fn new(
        camera: Arc<dyn CameraBackend>,
        capture: FrameCapture,
        generation: GenerationContext,
        locator: ResultLocator,
        public_url: impl Into<String>,
        timings: KioskTimings,
    ) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        let (view_tx, _) = watch::channel(KioskView::default());
        Self {
            session: AppSession::new(timings.lock_cooldown),
            camera,
            stream: None,
            capture,
            generation,
            locator,
            verify_results: false,
            public_url: public_url.into(),
            timings,
            cancel_tx: Arc::new(cancel_tx),
            view_tx,
        }
    }

    pub fn from_config(
        config: &Config,
        camera: Arc<dyn CameraBackend>,
        client: reqwest::Client,
    ) -> Self {
        Self::new(
            camera,
            FrameCapture::new(CaptureSpec::from(&config.capture)),
            GenerationContext::from_config(config, client.clone()),
            ResultLocator::from_config(config, client),
            config.public_url.clone(),
            KioskTimings::default(),
        )
        .with_result_verification(config.verify_results)
    }

    /// `HEAD` each result before showing its QR code
    pub fn with_result_verification(mut self, verify: bool) -> Self {
        self.verify_results = verify;
        self
    }

    pub fn screen(&self) -> Screen {
        self.session.screen()
    }

    pub fn session(&self) -> &AppSession {
        &self.session
    }

    /// Whether the driver currently holds the camera
    pub fn is_camera_held(&self) -> bool {
        self.stream.as_ref().is_some_and(CameraStream::is_active)
    }

    /// Live view updates
    pub fn subscribe(&self) -> watch::Receiver<KioskView> {
        self.view_tx.subscribe()
    }

    pub fn abort_handle(&self) -> CountdownAbort {
        CountdownAbort {
            tx: Arc::clone(&self.cancel_tx),
        }
    }

    /// Wait out the navigation lock left by the previous transition
    ///
    /// Drivers without a human in the loop call this between steps; a step
    /// issued while the lock is engaged is dropped like a double tap.
    pub async fn settle(&self) {
        let remaining = self.session.lock_remaining(Instant::now());
        if !remaining.is_zero() {
            debug!(?remaining, "Waiting for navigation lock");
            tokio::time::sleep(remaining).await;
        }
    }

    /// Welcome → camera, acquiring the stream
    pub async fn start(&mut self) -> Screen {
        if self.session.start(Instant::now()).is_applied()
            && let Err(e) = self.acquire_camera()
        {
            self.fail(e.into());
        }
        self.publish();
        self.screen()
    }

    /// Camera → countdown → review
    ///
    /// Runs the countdown, captures once at zero and hands the still to the
    /// review screen. An aborted countdown resets to welcome.
    pub async fn take_photo(&mut self) -> Screen {
        if !self.session.begin_countdown(Instant::now()).is_applied() {
            return self.screen();
        }
        self.publish();
        if let Err(e) = self.acquire_camera() {
            self.fail(e.into());
            self.publish();
            return self.screen();
        }

        self.cancel_tx.send_replace(false);
        let mut cancel = self.cancel_tx.subscribe();
        let Some(stream) = self.stream.as_mut() else {
            self.fail(CameraError::NotReady.into());
            self.publish();
            return self.screen();
        };
        let view_tx = &self.view_tx;

        let outcome = run_countdown(
            stream,
            &self.capture,
            &self.timings.countdown,
            &mut cancel,
            |state| view_tx.send_modify(|view| view.countdown = Some(state)),
        )
        .await;

        match outcome {
            Ok(CountdownOutcome::Captured(frame)) => {
                tokio::time::sleep(self.timings.capture_handoff).await;
                self.release_camera();
                self.session.capture_complete(frame, Instant::now());
            }
            Ok(CountdownOutcome::Cancelled) => {
                self.release_camera();
                self.session.reset(Instant::now());
            }
            Err(e) => self.fail(e),
        }
        self.view_tx.send_modify(|view| view.countdown = None);
        self.publish();
        self.screen()
    }

    /// Review → camera, discarding the still
    pub async fn retake(&mut self) -> Screen {
        if self.session.retake(Instant::now()).is_applied()
            && let Err(e) = self.acquire_camera()
        {
            self.fail(e.into());
        }
        self.publish();
        self.screen()
    }

    /// Review → processing → result (or error)
    pub async fn accept(&mut self) -> Screen {
        let Some(frame) = self.session.captured().cloned() else {
            return self.screen();
        };
        if !self.session.accept(Instant::now()).is_applied() {
            return self.screen();
        }
        self.release_camera();
        self.set_stage(ProcessingStage::Preparing);

        tokio::time::sleep(self.timings.processing_start_delay).await;
        self.set_stage(ProcessingStage::Submitting);

        let task = ProcessingTask::spawn(&self.generation, frame);
        match task.join().await {
            ProcessingOutcome::Stored(artifact) => self.finish_processing(artifact).await,
            ProcessingOutcome::Failed(e) => {
                self.set_stage(ProcessingStage::Failed);
                self.session
                    .processing_failed(e.user_message(), Instant::now());
            }
            ProcessingOutcome::Dropped => {
                warn!("Processing outcome dropped");
            }
        }
        self.publish();
        self.screen()
    }

    async fn finish_processing(&mut self, artifact: StoredArtifact) {
        if self.verify_results
            && let Err(e) = self.locator.check_reachable(&artifact.url).await
        {
            error!(url = %artifact.url, error = %e, "Stored result is not reachable");
            self.set_stage(ProcessingStage::Failed);
            self.session
                .processing_failed(AppError::from(e).user_message(), Instant::now());
            return;
        }

        let url = share_url(&self.public_url, &self.locator.identifier_for(&artifact));
        self.set_stage(ProcessingStage::Ready);
        tokio::time::sleep(self.timings.success_display).await;
        info!(%url, "Result ready");
        self.session.processing_complete(url, Instant::now());
    }

    /// Back to a clean welcome screen
    pub fn reset(&mut self) -> Screen {
        self.release_camera();
        self.session.reset(Instant::now());
        self.view_tx.send_modify(|view| {
            view.countdown = None;
            view.processing = None;
        });
        self.publish();
        self.screen()
    }

    fn acquire_camera(&mut self) -> Result<(), CameraError> {
        if self.is_camera_held() {
            return Ok(());
        }
        let stream = self.camera.open().map_err(|e| {
            warn!(backend = %self.camera.backend_type(), error = %e, "Camera acquisition failed");
            CameraError::from(e)
        })?;
        self.stream = Some(stream);
        Ok(())
    }

    fn release_camera(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }
    }

    fn fail(&mut self, err: AppError) {
        error!(error = %err, screen = %self.screen(), "Visitor flow failed");
        self.release_camera();
        self.session.fail(err.user_message(), Instant::now());
    }

    fn set_stage(&self, stage: ProcessingStage) {
        info!(stage = stage.message(), "Processing stage");
        self.view_tx.send_modify(|view| view.processing = Some(stage));
    }

    fn publish(&self) {
        if !self.session.screen().needs_camera() && self.stream.is_some() {
            warn!(screen = %self.session.screen(), "Camera held outside camera screens");
        }
        self.view_tx.send_modify(|view| {
            view.screen = self.session.screen();
            view.result_url = self.session.result_url().map(str::to_string);
            view.error_message = self.session.error_message().map(str::to_string);
        });
    }
}
