// SPDX-License-Identifier: GPL-3.0-only

//! Countdown before a capture
//!
//! [`CountdownController`] is the pure state machine; [`run_countdown`]
//! drives it against a live stream with tokio timers.
//!
//! ```text
//! Idle ─ready→ Ticking(3) ─tick→ Ticking(2) ─tick→ Ticking(1) ─tick→ Capturing
//!                                                                      │ captured
//!                                                Done ←flash elapsed─ Flashing
//! ```

use crate::backends::camera::CameraStream;
use crate::constants;
use crate::errors::{AppResult, CameraError};
use crate::pipelines::photo::{CapturedFrame, FrameCapture};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Visible countdown state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    /// Waiting for the camera stream; shows the starting count
    Idle { count: u32 },
    /// Counter on screen
    Ticking(u32),
    /// Capture requested
    Capturing,
    /// White flash on screen
    Flashing,
    Done,
    Cancelled,
}

impl CountdownState {
    pub fn is_finished(&self) -> bool {
        matches!(self, CountdownState::Done | CountdownState::Cancelled)
    }
}

/// Inputs to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    CameraReady,
    Tick,
    Captured,
    FlashElapsed,
    Cancel,
}

/// What the driver must do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownAction {
    None,
    ScheduleTick,
    Capture,
    ScheduleFlashEnd,
    Finished,
}

/// Pure countdown state machine
#[derive(Debug, Clone)]
pub struct CountdownController {
    state: CountdownState,
    capture_requested: bool,
}

impl CountdownController {
    pub fn new(start_count: u32) -> Self {
        Self {
            state: CountdownState::Idle {
                count: start_count.max(1),
            },
            capture_requested: false,
        }
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    /// Whether the capture has already been requested
    pub fn capture_requested(&self) -> bool {
        self.capture_requested
    }

    pub fn handle(&mut self, event: CountdownEvent) -> CountdownAction {
        use CountdownAction as A;
        use CountdownEvent as E;
        use CountdownState as S;

        let (next, action) = match (self.state, event) {
            (state, _) if state.is_finished() => (state, A::None),
            (_, E::Cancel) => (S::Cancelled, A::None),
            (S::Idle { count }, E::CameraReady) => (S::Ticking(count), A::ScheduleTick),
            (S::Ticking(n), E::Tick) if n > 1 => (S::Ticking(n - 1), A::ScheduleTick),
            (S::Ticking(_), E::Tick) if !self.capture_requested => {
                self.capture_requested = true;
                (S::Capturing, A::Capture)
            }
            (S::Capturing, E::Captured) => (S::Flashing, A::ScheduleFlashEnd),
            (S::Flashing, E::FlashElapsed) => (S::Done, A::Finished),
            (state, event) => {
                debug!(?state, ?event, "Countdown event ignored");
                (state, A::None)
            }
        };

        self.state = next;
        action
    }
}

/// Countdown timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownTimings {
    pub start_count: u32,
    pub tick_interval: Duration,
    pub flash_duration: Duration,
    pub ready_poll_interval: Duration,
    pub ready_timeout: Duration,
}

impl Default for CountdownTimings {
    fn default() -> Self {
        use constants::countdown as c;
        Self {
            start_count: c::START_COUNT,
            tick_interval: c::TICK_INTERVAL,
            flash_duration: c::FLASH_DURATION,
            ready_poll_interval: c::READY_POLL_INTERVAL,
            ready_timeout: c::READY_TIMEOUT,
        }
    }
}

/// How a countdown ended
#[derive(Debug, Clone)]
pub enum CountdownOutcome {
    Captured(CapturedFrame),
    Cancelled,
}

/// Sleep for `duration`; returns `true` if cancelled first
async fn sleep_or_cancel(duration: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    if *cancel.borrow() {
        return true;
    }
    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = cancel.changed() => match changed {
                Ok(()) if *cancel.borrow() => return true,
                Ok(()) => {}
                Err(_) => {
                    (&mut sleep).await;
                    return false;
                }
            },
        }
    }
}

/// Run a countdown against a live stream and capture once at zero
///
/// Does not start ticking until the stream reports usable dimensions; a
/// stream that stays dark past `ready_timeout` is `CameraError::NotReady`.
/// Every state change is passed to `observer`.
pub async fn run_countdown<F>(
    stream: &mut CameraStream,
    capture: &FrameCapture,
    timings: &CountdownTimings,
    cancel: &mut watch::Receiver<bool>,
    mut observer: F,
) -> AppResult<CountdownOutcome>
where
    F: FnMut(CountdownState),
{
    let mut controller = CountdownController::new(timings.start_count);
    observer(controller.state());

    let ready_deadline = tokio::time::Instant::now() + timings.ready_timeout;
    while !stream.is_ready() {
        if tokio::time::Instant::now() >= ready_deadline {
            warn!("Camera stream never became ready");
            return Err(CameraError::NotReady.into());
        }
        if sleep_or_cancel(timings.ready_poll_interval, cancel).await {
            controller.handle(CountdownEvent::Cancel);
            observer(controller.state());
            return Ok(CountdownOutcome::Cancelled);
        }
    }

    let mut action = controller.handle(CountdownEvent::CameraReady);
    observer(controller.state());
    info!(count = timings.start_count, "Countdown started");

    let mut captured = None;
    loop {
        action = match action {
            CountdownAction::ScheduleTick => {
                if sleep_or_cancel(timings.tick_interval, cancel).await {
                    controller.handle(CountdownEvent::Cancel);
                    observer(controller.state());
                    info!("Countdown cancelled");
                    return Ok(CountdownOutcome::Cancelled);
                }
                let next = controller.handle(CountdownEvent::Tick);
                observer(controller.state());
                next
            }
            CountdownAction::Capture => {
                captured = Some(capture.capture_from_stream(stream).await?);
                let next = controller.handle(CountdownEvent::Captured);
                observer(controller.state());
                next
            }
            CountdownAction::ScheduleFlashEnd => {
                tokio::time::sleep(timings.flash_duration).await;
                let next = controller.handle(CountdownEvent::FlashElapsed);
                observer(controller.state());
                next
            }
            CountdownAction::Finished | CountdownAction::None => break,
        };
    }

    match captured {
        Some(frame) => Ok(CountdownOutcome::Captured(frame)),
        None => Ok(CountdownOutcome::Cancelled),
    }
}
