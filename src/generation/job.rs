// SPDX-License-Identifier: GPL-3.0-only

//! Generation job state
//!
//! [`GenerationJob`] is driven by observations of the service's job status,
//! each stamped with the time elapsed since polling started. It holds no
//! timers of its own, so the stability rules can be exercised with any
//! sequence of timestamps.
//!
//! ```text
//! Submitted → Polling ⇄ Stabilizing → Completed
//!                 │           │
//!                 └───────────┴──→ Failed | TimedOut
//! ```

use crate::constants;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Polling cadence and completion rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between status polls
    pub interval: Duration,
    /// Polls before the job is declared timed out
    pub max_attempts: u32,
    /// How long artifacts must stay present before the job counts as done
    pub stability_window: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: constants::generation::POLL_INTERVAL,
            max_attempts: constants::generation::MAX_POLL_ATTEMPTS,
            stability_window: constants::generation::STABILITY_WINDOW,
        }
    }
}

/// Output file reported by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfolder: Option<String>,
    /// Storage class on the service side (`output`, `temp`, ...)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ArtifactRef {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            subfolder: None,
            kind: None,
        }
    }
}

/// One look at the job's status
#[derive(Debug, Clone, PartialEq)]
pub enum PollObservation {
    /// Job known but no output on the watched node yet (or no longer)
    Pending,
    /// Output files currently listed on the watched node
    Artifacts(Vec<ArtifactRef>),
    /// The service reported an execution error
    ExecutionError(String),
    /// The status request itself failed
    FetchFailed(String),
}

/// Job lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Submitted,
    Polling,
    /// Artifacts present since `since`; `artifact` is the latest seen
    Stabilizing {
        since: Duration,
        artifact: ArtifactRef,
    },
    Completed(ArtifactRef),
    Failed(String),
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed(_) | JobStatus::Failed(_) | JobStatus::TimedOut
        )
    }
}

/// A submitted job and its polling progress
#[derive(Debug, Clone)]
pub struct GenerationJob {
    job_id: String,
    status: JobStatus,
    attempts: u32,
    policy: PollPolicy,
}

impl GenerationJob {
    pub fn new(job_id: impl Into<String>, policy: PollPolicy) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Submitted,
            attempts: 0,
            policy,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    /// Polls consumed so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Start of the current stability window, if artifacts are present
    pub fn stability_started(&self) -> Option<Duration> {
        match &self.status {
            JobStatus::Stabilizing { since, .. } => Some(*since),
            _ => None,
        }
    }

    /// Apply one observation taken `at` after polling started
    ///
    /// Terminal states absorb every later observation. Each call consumes
    /// one attempt, including failed fetches.
    pub fn observe(&mut self, at: Duration, observation: PollObservation) -> &JobStatus {
        if self.is_terminal() {
            return &self.status;
        }
        self.attempts += 1;

        let next = match observation {
            PollObservation::ExecutionError(message) => {
                warn!(job_id = %self.job_id, %message, "Job reported an execution error");
                JobStatus::Failed(message)
            }
            PollObservation::Artifacts(artifacts) if !artifacts.is_empty() => {
                let artifact = artifacts[0].clone();
                let since = match &self.status {
                    JobStatus::Stabilizing { since, .. } => *since,
                    _ => {
                        info!(
                            job_id = %self.job_id,
                            filename = %artifact.filename,
                            "Artifacts appeared, waiting for them to settle"
                        );
                        at
                    }
                };
                if at.saturating_sub(since) >= self.policy.stability_window {
                    info!(
                        job_id = %self.job_id,
                        filename = %artifact.filename,
                        attempts = self.attempts,
                        "Artifacts stable"
                    );
                    JobStatus::Completed(artifact)
                } else {
                    JobStatus::Stabilizing { since, artifact }
                }
            }
            PollObservation::Artifacts(_) | PollObservation::Pending => {
                if matches!(self.status, JobStatus::Stabilizing { .. }) {
                    info!(
                        job_id = %self.job_id,
                        "Artifacts disappeared, restarting stability window"
                    );
                }
                JobStatus::Polling
            }
            PollObservation::FetchFailed(error) => {
                warn!(
                    job_id = %self.job_id,
                    attempt = self.attempts,
                    %error,
                    "Status fetch failed"
                );
                match &self.status {
                    JobStatus::Submitted => JobStatus::Polling,
                    other => other.clone(),
                }
            }
        };

        self.status = if !next.is_terminal() && self.attempts >= self.policy.max_attempts {
            warn!(job_id = %self.job_id, attempts = self.attempts, "Poll budget exhausted");
            JobStatus::TimedOut
        } else {
            next
        };
        debug!(job_id = %self.job_id, status = ?self.status, "Job observed");
        &self.status
    }
}

/// In-flight and completed guards of a job client
///
/// `try_begin` admits one submission at a time and none after a completed
/// one. `settle` lets the terminal outcome through unless the owner was torn
/// down in the meantime.
#[derive(Debug, Default)]
pub struct SubmissionGuard {
    in_flight: AtomicBool,
    completed: AtomicBool,
    torn_down: AtomicBool,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard for a new submission
    pub fn try_begin(&self) -> Option<SubmissionTicket<'_>> {
        if self.torn_down.load(Ordering::SeqCst) || self.completed.load(Ordering::SeqCst) {
            return None;
        }
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SubmissionTicket { guard: self })
    }

    /// Make every later completion a no-op
    pub fn tear_down(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }
}

/// Proof of an admitted submission; releases the in-flight flag on drop
#[derive(Debug)]
pub struct SubmissionTicket<'a> {
    guard: &'a SubmissionGuard,
}

impl SubmissionTicket<'_> {
    /// Report the terminal outcome
    ///
    /// Returns `false` if the owner was torn down, in which case the outcome
    /// must be dropped. A successful outcome closes the guard for good.
    pub fn settle(self, success: bool) -> bool {
        if self.guard.torn_down.load(Ordering::SeqCst) {
            return false;
        }
        if success {
            self.guard.completed.store(true, Ordering::SeqCst);
        }
        true
    }
}

impl Drop for SubmissionTicket<'_> {
    fn drop(&mut self) {
        self.guard.in_flight.store(false, Ordering::SeqCst);
    }
}
