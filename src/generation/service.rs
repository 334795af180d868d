// SPDX-License-Identifier: GPL-3.0-only

//! Generation service boundary
//!
//! The service is a node-graph job server: a liveness endpoint, a submit
//! endpoint returning a job id, a history endpoint keyed by job id and a
//! separate file server exposing the outputs.

use super::job::{ArtifactRef, PollObservation};
use crate::config::GenerationSettings;
use crate::errors::ProcessingError;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, info};

/// Operations the job client needs from the generation service
pub trait GenerationService: Send + Sync {
    /// Probe the liveness endpoint
    fn check_liveness(&self) -> BoxFuture<'_, Result<(), ProcessingError>>;

    /// Submit a recipe graph, returning the job id
    fn submit(&self, graph: Value) -> BoxFuture<'_, Result<String, ProcessingError>>;

    /// Look at a job's status once
    fn fetch_status<'a>(
        &'a self,
        job_id: &'a str,
    ) -> BoxFuture<'a, Result<PollObservation, ProcessingError>>;

    /// Download an output file
    fn fetch_artifact<'a>(
        &'a self,
        artifact: &'a ArtifactRef,
    ) -> BoxFuture<'a, Result<Vec<u8>, ProcessingError>>;
}

/// HTTP client for the generation service
pub struct HttpGenerationService {
    client: reqwest::Client,
    settings: GenerationSettings,
}

impl HttpGenerationService {
    pub fn new(client: reqwest::Client, settings: GenerationSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }
}

/// Build `<base><template>` with `placeholder` replaced by percent-encoded path segments
pub fn templated_url(
    base: &str,
    template: &str,
    placeholder: &str,
    segments: &[&str],
) -> Result<url::Url, url::ParseError> {
    let path = template.replace(placeholder, "");
    let mut url = url::Url::parse(&format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    ))?;
    if let Ok(mut parts) = url.path_segments_mut() {
        parts.pop_if_empty().extend(segments.iter().filter(|s| !s.is_empty()));
    }
    Ok(url)
}

fn endpoint(base: &str, path: &str) -> Result<url::Url, ProcessingError> {
    templated_url(base, path, "", &[])
        .map_err(|e| ProcessingError::Internal(format!("invalid service URL: {}", e)))
}

/// Interpret a history document for one job
///
/// The document is keyed by job id. A missing entry means the job has not
/// reached history yet.
pub fn parse_history(history: &Value, job_id: &str, output_node: &str) -> PollObservation {
    let Some(entry) = history.get(job_id) else {
        return PollObservation::Pending;
    };

    let messages = entry
        .pointer("/status/messages")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for message in messages {
        if message.get(0).and_then(Value::as_str) == Some("execution_error") {
            let detail = message
                .get(1)
                .and_then(|m| m.get("exception_message"))
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            return PollObservation::ExecutionError(detail);
        }
    }

    let images = entry
        .get("outputs")
        .and_then(|outputs| outputs.get(output_node))
        .and_then(|node| node.get("images"))
        .and_then(Value::as_array);
    match images {
        Some(images) => PollObservation::Artifacts(
            images
                .iter()
                .filter_map(|image| serde_json::from_value::<ArtifactRef>(image.clone()).ok())
                .collect(),
        ),
        None => PollObservation::Pending,
    }
}

impl GenerationService for HttpGenerationService {
    fn check_liveness(&self) -> BoxFuture<'_, Result<(), ProcessingError>> {
        Box::pin(async move {
            let url = endpoint(&self.settings.server_url, &self.settings.liveness_path)?;
            let response = self
                .client
                .get(url)
                .timeout(self.settings.health_timeout())
                .send()
                .await
                .map_err(|e| ProcessingError::ServiceUnavailable(e.to_string()))?;
            if !response.status().is_success() {
                return Err(ProcessingError::ServiceUnavailable(format!(
                    "liveness probe returned {}",
                    response.status()
                )));
            }
            debug!("Generation service is alive");
            Ok(())
        })
    }

    fn submit(&self, graph: Value) -> BoxFuture<'_, Result<String, ProcessingError>> {
        Box::pin(async move {
            let url = endpoint(&self.settings.server_url, &self.settings.submit_path)?;
            let mut body = serde_json::Map::new();
            body.insert(self.settings.submit_field.clone(), graph);

            let response = self
                .client
                .post(url)
                .json(&body)
                .timeout(self.settings.submit_timeout())
                .send()
                .await
                .map_err(|e| ProcessingError::SubmissionFailed {
                    status: None,
                    body: e.to_string(),
                })?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| ProcessingError::Transport(e.to_string()))?;
            if !status.is_success() {
                return Err(ProcessingError::SubmissionFailed {
                    status: Some(status.as_u16()),
                    body: text,
                });
            }

            let parsed: Value = serde_json::from_str(&text)
                .map_err(|e| ProcessingError::MalformedResponse(e.to_string()))?;
            let job_id = parsed
                .get("prompt_id")
                .or_else(|| parsed.get("job_id"))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ProcessingError::MalformedResponse("submission response has no job id".into())
                })?;

            info!(job_id, "Job submitted");
            Ok(job_id.to_string())
        })
    }

    fn fetch_status<'a>(
        &'a self,
        job_id: &'a str,
    ) -> BoxFuture<'a, Result<PollObservation, ProcessingError>> {
        Box::pin(async move {
            let url = templated_url(
                &self.settings.server_url,
                &self.settings.history_path,
                "{job_id}",
                &[job_id],
            )
            .map_err(|e| ProcessingError::Internal(e.to_string()))?;

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| ProcessingError::Transport(e.to_string()))?
                .error_for_status()
                .map_err(|e| ProcessingError::Transport(e.to_string()))?;
            let history: Value = response
                .json()
                .await
                .map_err(|e| ProcessingError::MalformedResponse(e.to_string()))?;

            Ok(parse_history(&history, job_id, &self.settings.output_node))
        })
    }

    fn fetch_artifact<'a>(
        &'a self,
        artifact: &'a ArtifactRef,
    ) -> BoxFuture<'a, Result<Vec<u8>, ProcessingError>> {
        Box::pin(async move {
            let mut segments: Vec<&str> = artifact
                .subfolder
                .as_deref()
                .map(|s| s.split('/').collect())
                .unwrap_or_default();
            segments.push(&artifact.filename);

            let url = templated_url(
                &self.settings.files_url,
                &self.settings.files_path,
                "{filename}",
                &segments,
            )
            .map_err(|e| ProcessingError::Internal(e.to_string()))?;
            debug!(%url, "Downloading artifact");

            let bytes = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| ProcessingError::Transport(e.to_string()))?
                .error_for_status()
                .map_err(|e| ProcessingError::Transport(e.to_string()))?
                .bytes()
                .await
                .map_err(|e| ProcessingError::Transport(e.to_string()))?;

            info!(filename = %artifact.filename, size = bytes.len(), "Artifact downloaded");
            Ok(bytes.to_vec())
        })
    }
}
