// SPDX-License-Identifier: GPL-3.0-only

//! Screen sequencing state
//!
//! ```text
//! Welcome → Camera → Countdown → Review → Processing → Result
//!              ↑                    │
//!              └──── retake ────────┘        any step → Error
//! ```
//!
//! Every applied transition engages a short navigation lock; non-forced
//! requests that arrive while it is engaged are dropped. Time is passed in
//! by the caller so the lock behaves identically under test.

use crate::constants;
use crate::pipelines::photo::CapturedFrame;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Visitor-facing screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Screen {
    #[default]
    Welcome,
    Camera,
    Countdown,
    Review,
    Processing,
    Result,
    Error,
}

impl Screen {
    /// Screens during which the camera stream must be held
    pub fn needs_camera(&self) -> bool {
        matches!(self, Screen::Camera | Screen::Countdown)
    }
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Screen::Welcome => "welcome",
            Screen::Camera => "camera",
            Screen::Countdown => "countdown",
            Screen::Review => "review",
            Screen::Processing => "processing",
            Screen::Result => "result",
            Screen::Error => "error",
        };
        f.write_str(name)
    }
}

/// Cooldown that drops re-entrant navigation requests
#[derive(Debug, Clone)]
pub struct NavigationLock {
    cooldown: Duration,
    locked_until: Option<Instant>,
}

impl NavigationLock {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            locked_until: None,
        }
    }

    pub fn is_locked(&self, now: Instant) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    /// Time left until requests are accepted again
    pub fn remaining(&self, now: Instant) -> Duration {
        self.locked_until
            .map_or(Duration::ZERO, |until| until.saturating_duration_since(now))
    }

    fn engage(&mut self, now: Instant) {
        self.locked_until = Some(now + self.cooldown);
    }
}

impl Default for NavigationLock {
    fn default() -> Self {
        Self::new(constants::navigation::LOCK_COOLDOWN)
    }
}

/// Outcome of a navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied { from: Screen, to: Screen },
    /// Dropped by the navigation lock
    Blocked,
    /// Not a valid move from the current screen
    Rejected,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }
}

/// One visitor interaction
#[derive(Debug, Clone, Default)]
pub struct AppSession {
    screen: Screen,
    captured: Option<CapturedFrame>,
    result_url: Option<String>,
    error_message: Option<String>,
    lock: NavigationLock,
}

impl AppSession {
    pub fn new(lock_cooldown: Duration) -> Self {
        Self {
            lock: NavigationLock::new(lock_cooldown),
            ..Default::default()
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn captured(&self) -> Option<&CapturedFrame> {
        self.captured.as_ref()
    }

    pub fn result_url(&self) -> Option<&str> {
        self.result_url.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_locked(&self, now: Instant) -> bool {
        self.lock.is_locked(now)
    }

    pub fn lock_remaining(&self, now: Instant) -> Duration {
        self.lock.remaining(now)
    }

    /// Move to `to`; forced requests ignore the navigation lock
    pub fn navigate(&mut self, to: Screen, force: bool, now: Instant) -> Transition {
        if !force && self.lock.is_locked(now) {
            debug!(from = %self.screen, %to, "Navigation blocked by lock");
            return Transition::Blocked;
        }

        let from = self.screen;
        self.screen = to;
        self.lock.engage(now);
        info!(%from, %to, force, "Screen changed");
        Transition::Applied { from, to }
    }

    fn navigate_from(&mut self, expected: Screen, to: Screen, now: Instant) -> Transition {
        if self.screen != expected {
            debug!(current = %self.screen, %expected, %to, "Navigation rejected");
            return Transition::Rejected;
        }
        self.navigate(to, false, now)
    }

    /// Welcome → camera
    pub fn start(&mut self, now: Instant) -> Transition {
        self.navigate_from(Screen::Welcome, Screen::Camera, now)
    }

    /// Camera → countdown
    pub fn begin_countdown(&mut self, now: Instant) -> Transition {
        self.navigate_from(Screen::Camera, Screen::Countdown, now)
    }

    /// Countdown → review with the new still (forced)
    pub fn capture_complete(&mut self, frame: CapturedFrame, now: Instant) -> Transition {
        if self.screen != Screen::Countdown {
            return Transition::Rejected;
        }
        self.captured = Some(frame);
        self.navigate(Screen::Review, true, now)
    }

    /// Review → camera, discarding the still
    pub fn retake(&mut self, now: Instant) -> Transition {
        let transition = self.navigate_from(Screen::Review, Screen::Camera, now);
        if transition.is_applied() {
            self.captured = None;
        }
        transition
    }

    /// Review → processing (forced)
    pub fn accept(&mut self, now: Instant) -> Transition {
        if self.screen != Screen::Review || self.captured.is_none() {
            return Transition::Rejected;
        }
        self.navigate(Screen::Processing, true, now)
    }

    /// Processing → result with the QR payload (forced)
    pub fn processing_complete(&mut self, url: String, now: Instant) -> Transition {
        if self.screen != Screen::Processing {
            return Transition::Rejected;
        }
        self.result_url = Some(url);
        self.navigate(Screen::Result, true, now)
    }

    /// Processing → error (forced)
    pub fn processing_failed(&mut self, message: String, now: Instant) -> Transition {
        if self.screen != Screen::Processing {
            return Transition::Rejected;
        }
        self.fail(message, now)
    }

    /// Any screen → error (forced)
    pub fn fail(&mut self, message: String, now: Instant) -> Transition {
        self.error_message = Some(message);
        self.navigate(Screen::Error, true, now)
    }

    /// Back to a clean welcome screen (forced)
    pub fn reset(&mut self, now: Instant) -> Transition {
        self.captured = None;
        self.result_url = None;
        self.error_message = None;
        self.navigate(Screen::Welcome, true, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_drops_second_request() {
        let t0 = Instant::now();
        let mut session = AppSession::default();
        assert!(session.start(t0).is_applied());
        assert_eq!(
            session.navigate(Screen::Countdown, false, t0 + Duration::from_millis(100)),
            Transition::Blocked
        );
        assert_eq!(session.screen(), Screen::Camera);
        assert!(session.begin_countdown(t0 + Duration::from_millis(500)).is_applied());
    }

    #[test]
    fn test_lock_remaining_counts_down() {
        let t0 = Instant::now();
        let mut session = AppSession::new(Duration::from_millis(500));
        assert_eq!(session.lock_remaining(t0), Duration::ZERO);
        session.start(t0);
        assert_eq!(
            session.lock_remaining(t0 + Duration::from_millis(200)),
            Duration::from_millis(300)
        );
        assert_eq!(session.lock_remaining(t0 + Duration::from_secs(1)), Duration::ZERO);
    }

    #[test]
    fn test_forced_ignores_lock() {
        let t0 = Instant::now();
        let mut session = AppSession::default();
        session.start(t0);
        assert!(session.fail("camera gone".into(), t0).is_applied());
        assert_eq!(session.screen(), Screen::Error);
        assert_eq!(session.error_message(), Some("camera gone"));
    }

    #[test]
    fn test_rejects_out_of_order_moves() {
        let t0 = Instant::now();
        let mut session = AppSession::default();
        assert_eq!(session.begin_countdown(t0), Transition::Rejected);
        assert_eq!(session.accept(t0), Transition::Rejected);
        assert_eq!(session.processing_complete("x".into(), t0), Transition::Rejected);
        assert_eq!(session.screen(), Screen::Welcome);
    }

    #[test]
    fn test_needs_camera() {
        assert!(Screen::Camera.needs_camera());
        assert!(Screen::Countdown.needs_camera());
        assert!(!Screen::Review.needs_camera());
    }
}
