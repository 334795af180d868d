// SPDX-License-Identifier: GPL-3.0-only

//! Capture-to-result job orchestration
//!
//! ```text
//! CapturedFrame → liveness → submit recipe → poll until stable → download → store
//!                                                                          ↓
//!                                                                   StoredArtifact
//! ```
//!
//! Steps run strictly in sequence. A client accepts one submission at a
//! time and, once a frame has been processed, none after it; use a fresh
//! client per captured frame.

pub mod job;
pub mod recipe;
pub mod service;

pub use job::{ArtifactRef, GenerationJob, JobStatus, PollObservation, PollPolicy, SubmissionGuard};
pub use recipe::RecipeParams;
pub use service::{GenerationService, HttpGenerationService};

use crate::config::Config;
use crate::constants;
use crate::errors::ProcessingError;
use crate::pipelines::photo::CapturedFrame;
use crate::storage::{ArtifactNaming, ObjectStore, StoredArtifact, download_url};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Result of a [`GenerationJobClient::submit`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The frame was processed and stored
    Completed(StoredArtifact),
    /// Another submission was in flight, or the client was closed or torn
    /// down; nothing was reported
    Ignored,
}

/// Shared collaborators for building one job client per captured frame
#[derive(Clone)]
pub struct GenerationContext {
    pub service: Arc<dyn GenerationService>,
    pub store: Arc<dyn ObjectStore>,
    pub naming: ArtifactNaming,
    pub recipe: RecipeParams,
    pub policy: PollPolicy,
}

impl GenerationContext {
    pub fn new(service: Arc<dyn GenerationService>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            service,
            store,
            naming: ArtifactNaming::default(),
            recipe: RecipeParams::default(),
            policy: PollPolicy::default(),
        }
    }

    /// HTTP service and configured store
    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        let service = Arc::new(HttpGenerationService::new(
            client.clone(),
            config.generation.clone(),
        ));
        let store = crate::storage::from_settings(&config.storage, client);
        Self {
            service,
            store,
            naming: ArtifactNaming::from(&config.storage),
            recipe: config.generation.recipe.clone(),
            policy: config.generation.poll_policy(),
        }
    }

    /// Fresh client with its own submission guard
    pub fn client(&self) -> GenerationJobClient {
        GenerationJobClient::new(Arc::clone(&self.service), Arc::clone(&self.store))
            .with_naming(self.naming.clone())
            .with_recipe(self.recipe.clone())
            .with_policy(self.policy)
    }
}

/// Submits captured frames and persists the results
pub struct GenerationJobClient {
    service: Arc<dyn GenerationService>,
    store: Arc<dyn ObjectStore>,
    naming: ArtifactNaming,
    recipe: RecipeParams,
    policy: PollPolicy,
    guard: SubmissionGuard,
}

impl GenerationJobClient {
    pub fn new(service: Arc<dyn GenerationService>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            service,
            store,
            naming: ArtifactNaming::default(),
            recipe: RecipeParams::default(),
            policy: PollPolicy::default(),
            guard: SubmissionGuard::new(),
        }
    }

    pub fn with_naming(mut self, naming: ArtifactNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_recipe(mut self, recipe: RecipeParams) -> Self {
        self.recipe = recipe;
        self
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Drop whatever outcome a running submission produces
    pub fn tear_down(&self) {
        self.guard.tear_down();
    }

    pub fn is_torn_down(&self) -> bool {
        self.guard.is_torn_down()
    }

    /// Process one frame end to end
    ///
    /// A call made while another is in flight returns `Ignored` without
    /// touching the network.
    pub async fn submit(&self, frame: &CapturedFrame) -> Result<SubmitOutcome, ProcessingError> {
        let Some(ticket) = self.guard.try_begin() else {
            warn!(frame = %frame.id, "Submission already in flight, ignoring");
            return Ok(SubmitOutcome::Ignored);
        };

        let result = self.run(frame).await;

        if !ticket.settle(result.is_ok()) {
            info!(frame = %frame.id, "Client torn down, dropping outcome");
            return Ok(SubmitOutcome::Ignored);
        }
        match result {
            Ok(artifact) => Ok(SubmitOutcome::Completed(artifact)),
            Err(e) => {
                error!(frame = %frame.id, error = %e, "Processing failed");
                Err(e)
            }
        }
    }

    async fn run(&self, frame: &CapturedFrame) -> Result<StoredArtifact, ProcessingError> {
        if frame.payload().is_empty() {
            return Err(ProcessingError::NoImage);
        }

        self.service.check_liveness().await?;

        let graph = recipe::build_graph(&self.recipe, &frame.to_base64());
        let job_id = self.service.submit(graph).await?;
        info!(frame = %frame.id, %job_id, "Polling job");

        let artifact = self.poll(&job_id).await?;
        let bytes = self.service.fetch_artifact(&artifact).await?;
        self.persist(bytes).await
    }

    async fn poll(&self, job_id: &str) -> Result<ArtifactRef, ProcessingError> {
        let mut job = GenerationJob::new(job_id, self.policy);
        let started = Instant::now();

        loop {
            let observation = match self.service.fetch_status(job_id).await {
                Ok(observation) => observation,
                Err(e) => PollObservation::FetchFailed(e.to_string()),
            };

            let status = job.observe(started.elapsed(), observation).clone();
            match status {
                JobStatus::Completed(artifact) => return Ok(artifact),
                JobStatus::Failed(message) => {
                    return Err(ProcessingError::ExecutionError(message));
                }
                JobStatus::TimedOut => {
                    return Err(ProcessingError::Timeout {
                        attempts: job.attempts(),
                    });
                }
                _ => {}
            }

            tokio::time::sleep(self.policy.interval).await;
        }
    }

    async fn persist(&self, bytes: Vec<u8>) -> Result<StoredArtifact, ProcessingError> {
        let retrieval_id = self.naming.new_retrieval_id();
        let key = self.naming.key(&retrieval_id);
        let size = bytes.len();
        let content_type = constants::storage::CONTENT_TYPE;

        let url = self.store.put(&key, bytes, content_type).await?;
        info!(%key, %retrieval_id, size, "Result stored");

        Ok(StoredArtifact {
            download_url: download_url(&url),
            url,
            key,
            content_type: content_type.to_string(),
            size,
            retrieval_id,
        })
    }
}
