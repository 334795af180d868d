// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the screen state machine and countdown

use photobooth::app::{
    AppSession, CountdownAction, CountdownController, CountdownEvent, CountdownState, Screen,
    Transition,
};
use photobooth::backends::camera::synthetic::gradient_frame;
use photobooth::pipelines::photo::{CaptureSpec, CapturedFrame, FrameCapture};
use std::time::{Duration, Instant};

const LOCK: Duration = Duration::from_millis(500);

fn still() -> CapturedFrame {
    FrameCapture::new(CaptureSpec {
        width: 9,
        height: 16,
        ..CaptureSpec::default()
    })
    .capture(&gradient_frame(32, 18))
    .unwrap()
}

/// Welcome → camera → countdown → review, each step past the lock
fn at_review(t0: Instant) -> AppSession {
    let mut session = AppSession::new(LOCK);
    assert!(session.start(t0).is_applied());
    assert!(session.begin_countdown(t0 + LOCK).is_applied());
    assert!(session.capture_complete(still(), t0 + LOCK).is_applied());
    session
}

#[test]
fn test_second_request_within_cooldown_is_dropped() {
    let t0 = Instant::now();
    let mut session = AppSession::new(LOCK);

    assert_eq!(
        session.start(t0),
        Transition::Applied {
            from: Screen::Welcome,
            to: Screen::Camera
        }
    );
    assert_eq!(
        session.begin_countdown(t0 + Duration::from_millis(100)),
        Transition::Blocked
    );
    assert_eq!(session.screen(), Screen::Camera);
    assert!(session.begin_countdown(t0 + LOCK).is_applied());
}

#[test]
fn test_forced_transitions_ignore_the_lock() {
    let t0 = Instant::now();
    let mut session = AppSession::new(LOCK);
    session.start(t0);

    let t1 = t0 + Duration::from_millis(10);
    assert!(session.fail("camera lost".into(), t1).is_applied());
    assert!(session.reset(t1).is_applied());
    assert_eq!(session.screen(), Screen::Welcome);
}

#[test]
fn test_capture_handoff_is_forced() {
    let t0 = Instant::now();
    let mut session = AppSession::new(LOCK);
    session.start(t0);
    session.begin_countdown(t0 + LOCK);

    // Immediately after entering the countdown, still applies
    let t1 = t0 + LOCK + Duration::from_millis(1);
    assert!(session.capture_complete(still(), t1).is_applied());
    assert_eq!(session.screen(), Screen::Review);
    assert!(session.captured().is_some());
}

#[test]
fn test_retake_discards_the_still() {
    let t0 = Instant::now();
    let mut session = at_review(t0);

    assert_eq!(session.retake(t0 + LOCK), Transition::Blocked);
    assert!(session.captured().is_some());

    assert!(session.retake(t0 + LOCK * 2).is_applied());
    assert_eq!(session.screen(), Screen::Camera);
    assert!(session.captured().is_none());
}

#[test]
fn test_accept_requires_a_still() {
    let t0 = Instant::now();
    let mut session = AppSession::new(LOCK);
    session.start(t0);
    assert_eq!(session.accept(t0 + LOCK), Transition::Rejected);

    let mut session = at_review(t0);
    assert!(session.accept(t0 + LOCK).is_applied());
    assert_eq!(session.screen(), Screen::Processing);
}

#[test]
fn test_processing_outcomes() {
    let t0 = Instant::now();
    let mut session = at_review(t0);
    session.accept(t0 + LOCK);
    assert!(
        session
            .processing_complete("https://booth.test/download/x".into(), t0 + LOCK)
            .is_applied()
    );
    assert_eq!(session.screen(), Screen::Result);
    assert_eq!(session.result_url(), Some("https://booth.test/download/x"));

    let mut session = at_review(t0);
    session.accept(t0 + LOCK);
    assert!(session.processing_failed("timed out".into(), t0 + LOCK).is_applied());
    assert_eq!(session.screen(), Screen::Error);
    assert_eq!(session.error_message(), Some("timed out"));

    // Late outcomes after leaving processing are rejected
    assert_eq!(
        session.processing_complete("late".into(), t0 + LOCK * 3),
        Transition::Rejected
    );
}

#[test]
fn test_reset_clears_everything() {
    let t0 = Instant::now();
    let mut session = at_review(t0);
    session.accept(t0 + LOCK);
    session.processing_complete("https://booth.test/download/x".into(), t0 + LOCK);

    session.reset(t0 + LOCK);
    assert_eq!(session.screen(), Screen::Welcome);
    assert!(session.captured().is_none());
    assert!(session.result_url().is_none());
    assert!(session.error_message().is_none());
}

#[test]
fn test_camera_screens() {
    assert!(Screen::Camera.needs_camera());
    assert!(Screen::Countdown.needs_camera());
    for screen in [
        Screen::Welcome,
        Screen::Review,
        Screen::Processing,
        Screen::Result,
        Screen::Error,
    ] {
        assert!(!screen.needs_camera(), "{screen} should not hold the camera");
    }
}

#[test]
fn test_countdown_visits_each_number_once() {
    let mut controller = CountdownController::new(3);
    let mut seen = Vec::new();

    let mut action = controller.handle(CountdownEvent::CameraReady);
    while action == CountdownAction::ScheduleTick {
        if let CountdownState::Ticking(n) = controller.state() {
            seen.push(n);
        }
        action = controller.handle(CountdownEvent::Tick);
    }

    assert_eq!(seen, vec![3, 2, 1]);
    assert_eq!(action, CountdownAction::Capture);
    assert_eq!(
        controller.handle(CountdownEvent::Captured),
        CountdownAction::ScheduleFlashEnd
    );
    assert_eq!(
        controller.handle(CountdownEvent::FlashElapsed),
        CountdownAction::Finished
    );
    assert_eq!(controller.state(), CountdownState::Done);
}

#[test]
fn test_cancelled_countdown_never_captures() {
    let mut controller = CountdownController::new(3);
    controller.handle(CountdownEvent::CameraReady);
    controller.handle(CountdownEvent::Tick);
    controller.handle(CountdownEvent::Cancel);

    assert_eq!(controller.state(), CountdownState::Cancelled);
    assert_eq!(controller.handle(CountdownEvent::Tick), CountdownAction::None);
    assert!(!controller.capture_requested());
}
