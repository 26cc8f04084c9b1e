//! Document submission and ingestion-job monitoring.
//!
//! [`submit_and_monitor`] uploads a document, starts an ingestion job with a
//! fresh idempotency token and then follows the job with
//! [`poll_ingestion_job`] until it ends. All of it runs under a [`Timer`] that
//! is stopped on every exit path, so the report always carries the elapsed
//! time.
//!
//! Failures are never propagated as errors: they end up as
//! [`IngestionOutcome::Aborted`] in the returned [`IngestionReport`].

use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::contract::{IngestionJobStatus, KnowledgeBaseControl, ObjectStore, Sleeper};
use crate::error::{IngestError, InputError, ServiceError};
use crate::timer::{format_hms, Timer};
use crate::token::generate_client_token;

/// Used when a failed or stopped job carries no message of its own.
pub const NO_ERROR_MESSAGE: &str = "No error message provided";

/// Default pause between two status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default number of status checks before giving up (two hours at the
/// default interval).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 240;

/// What to upload and which data source to ingest it through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionRequest {
    pub file_path: PathBuf,
    pub bucket: String,
    pub object_key: String,
    pub knowledge_base_id: String,
    pub data_source_id: String,
}

/// How a job is followed after submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until the job ends, however long that takes.
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
        }
    }
}

/// How a submission ended.
#[derive(Debug)]
pub enum IngestionOutcome {
    Complete,
    /// The job reached `FAILED` or `STOPPED`.
    Failed {
        status: IngestionJobStatus,
        message: String,
    },
    /// The job was still running after the configured number of checks.
    TimedOut { attempts: u32 },
    /// The submission never got a terminal job status.
    Aborted(IngestError),
}

/// Result of [`submit_and_monitor`].
#[derive(Debug)]
pub struct IngestionReport {
    /// Set once the service accepted the job.
    pub job_id: Option<String>,
    pub outcome: IngestionOutcome,
    /// Best-effort elapsed time of the whole submission.
    pub duration: Option<Duration>,
}

impl IngestionReport {
    /// True only if the job reached `COMPLETE`.
    pub fn success(&self) -> bool {
        matches!(self.outcome, IngestionOutcome::Complete)
    }
}

/// Upload `request.file_path`, start an ingestion job and wait for it to end.
pub async fn submit_and_monitor<S, C, Z>(
    request: &IngestionRequest,
    policy: &PollPolicy,
    store: &S,
    control: &C,
    sleeper: &Z,
) -> IngestionReport
where
    S: ObjectStore + ?Sized,
    C: KnowledgeBaseControl + ?Sized,
    Z: Sleeper + ?Sized,
{
    let mut timer = RunningTimer(Timer::new());
    timer.0.start();

    let (job_id, outcome) = match submit(request, store, control).await {
        Ok(id) => {
            info!(job_id = %id, "Monitoring ingestion job status");
            let outcome = match poll_ingestion_job(
                control,
                sleeper,
                &request.knowledge_base_id,
                &request.data_source_id,
                &id,
                policy,
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, job_id = %id, "Failed to query ingestion job status");
                    IngestionOutcome::Aborted(e.into())
                }
            };
            (Some(id), outcome)
        }
        Err(e) => {
            error!(error = %e, "Ingestion submission aborted");
            (None, IngestionOutcome::Aborted(e))
        }
    };

    let duration = match timer.0.stop() {
        Ok(elapsed) => Some(elapsed),
        Err(e) => {
            warn!(error = %e, "Could not measure ingestion duration");
            None
        }
    };

    IngestionReport {
        job_id,
        outcome,
        duration,
    }
}

/// Stops the wrapped timer if it is dropped mid-run, so a cancelled
/// submission still logs how long it ran.
struct RunningTimer(Timer);

impl Drop for RunningTimer {
    fn drop(&mut self) {
        if self.0.is_running() {
            if let Ok(elapsed) = self.0.stop() {
                warn!(
                    elapsed = %format_hms(elapsed),
                    "Ingestion cancelled before the job finished"
                );
            }
        }
    }
}

async fn submit<S, C>(
    request: &IngestionRequest,
    store: &S,
    control: &C,
) -> Result<String, IngestError>
where
    S: ObjectStore + ?Sized,
    C: KnowledgeBaseControl + ?Sized,
{
    let body = tokio::fs::read(&request.file_path).await.map_err(|source| {
        InputError::UnreadableFile {
            path: request.file_path.clone(),
            source,
        }
    })?;

    info!(
        bucket = %request.bucket,
        key = %request.object_key,
        bytes = body.len(),
        "Uploading document"
    );
    store
        .put_object(&request.bucket, &request.object_key, body)
        .await?;
    info!(key = %request.object_key, "Upload complete");

    info!(
        knowledge_base_id = %request.knowledge_base_id,
        data_source_id = %request.data_source_id,
        "Starting ingestion job"
    );
    let client_token = generate_client_token();
    let job = control
        .start_ingestion_job(
            &request.knowledge_base_id,
            &request.data_source_id,
            &client_token,
        )
        .await?;
    info!(job_id = %job.job_id, status = %job.status, "Ingestion job started");
    Ok(job.job_id)
}

/// Query the job until it reaches a terminal status or `policy` runs out.
///
/// Sleeps `policy.interval` between checks, never after the last one. A
/// failing status query ends polling with that error.
pub async fn poll_ingestion_job<C, Z>(
    control: &C,
    sleeper: &Z,
    knowledge_base_id: &str,
    data_source_id: &str,
    job_id: &str,
    policy: &PollPolicy,
) -> Result<IngestionOutcome, ServiceError>
where
    C: KnowledgeBaseControl + ?Sized,
    Z: Sleeper + ?Sized,
{
    let mut checks: u32 = 0;
    loop {
        let job = control
            .get_ingestion_job(knowledge_base_id, data_source_id, job_id)
            .await?;
        checks += 1;
        info!(check = checks, status = %job.status, job_id, "Status check");

        match job.status {
            IngestionJobStatus::Complete => {
                info!(job_id, checks, "Ingestion job completed successfully");
                return Ok(IngestionOutcome::Complete);
            }
            IngestionJobStatus::Failed | IngestionJobStatus::Stopped => {
                let message = job
                    .error_message
                    .unwrap_or_else(|| NO_ERROR_MESSAGE.to_string());
                error!(
                    job_id,
                    status = %job.status,
                    error = %message,
                    "Ingestion job {}",
                    job.status.as_str().to_lowercase()
                );
                return Ok(IngestionOutcome::Failed {
                    status: job.status,
                    message,
                });
            }
            _ => {}
        }

        if policy.max_attempts.is_some_and(|max| checks >= max) {
            warn!(job_id, checks, status = %job.status, "Gave up waiting for ingestion job");
            return Ok(IngestionOutcome::TimedOut { attempts: checks });
        }

        sleeper.sleep(policy.interval).await;
    }
}

/// One-line human summary of a report, e.g. for the CLI.
pub fn describe(report: &IngestionReport) -> String {
    let took = report
        .duration
        .map(|d| format!(" after {}", format_hms(d)))
        .unwrap_or_default();
    match &report.outcome {
        IngestionOutcome::Complete => format!("Document processed successfully{took}"),
        IngestionOutcome::Failed { status, message } => format!(
            "Ingestion job {}{took}. Error: {message}",
            status.as_str().to_lowercase()
        ),
        IngestionOutcome::TimedOut { attempts } => {
            format!("Ingestion job still running after {attempts} status checks{took}")
        }
        IngestionOutcome::Aborted(e) => format!("Document processing failed{took}: {e}"),
    }
}
