// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use photobooth::constants;
use std::time::Duration;

#[test]
fn test_target_aspect_is_portrait() {
    let aspect = constants::capture::target_aspect();
    assert!((aspect - 9.0 / 16.0).abs() < constants::capture::ASPECT_TOLERANCE);
    assert!(aspect < 1.0);
}

#[test]
fn test_output_size_matches_target_aspect() {
    let aspect =
        constants::capture::OUTPUT_WIDTH as f64 / constants::capture::OUTPUT_HEIGHT as f64;
    assert!((aspect - constants::capture::target_aspect()).abs() < 1e-3);
}

#[test]
fn test_poll_budget_outlasts_stability_window() {
    let budget = constants::generation::POLL_INTERVAL * constants::generation::MAX_POLL_ATTEMPTS;
    assert!(budget > constants::generation::STABILITY_WINDOW);
    assert_eq!(budget, Duration::from_secs(180));
}

#[test]
fn test_lock_cooldown_shorter_than_countdown_tick() {
    assert!(constants::navigation::LOCK_COOLDOWN < constants::countdown::TICK_INTERVAL);
}

#[test]
fn test_image_extensions() {
    assert!(constants::file_formats::is_image_extension("jpg"));
    assert!(constants::file_formats::is_image_extension("png"));
    assert!(!constants::file_formats::is_image_extension("mp4"));
}
