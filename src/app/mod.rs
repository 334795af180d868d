// SPDX-License-Identifier: MPL-2.0

//! Visitor flow for the booth
//!
//! # Architecture
//!
//! - `state`: screen state machine and navigation lock
//! - `countdown`: countdown state machine and its timer driver
//! - `kiosk`: owns the camera and drives one visit end to end
//!
//! ```text
//! Welcome → Camera → Countdown → Review → Processing → Result
//!              ↑                   │ retake               │
//!              └───────────────────┘            reset → Welcome
//! ```

pub mod countdown;
pub mod kiosk;
pub mod state;

pub use countdown::{
    CountdownAction, CountdownController, CountdownEvent, CountdownOutcome, CountdownState,
    CountdownTimings, run_countdown,
};
pub use kiosk::{
    CountdownAbort, Kiosk, KioskTimings, KioskView, ProcessingOutcome, ProcessingStage,
    ProcessingTask,
};
pub use state::{AppSession, NavigationLock, Screen, Transition};
