//! Ingestion job history for a data source.

use std::fmt::Write;

use tracing::{error, info};

use crate::contract::{IngestionJob, IngestionJobSummary, KnowledgeBaseControl};
use crate::timer::format_hms;

/// Lists every ingestion job of a data source; `None` if the listing failed.
pub async fn list_jobs<C>(
    control: &C,
    knowledge_base_id: &str,
    data_source_id: &str,
) -> Option<Vec<IngestionJobSummary>>
where
    C: KnowledgeBaseControl + ?Sized,
{
    match control
        .list_ingestion_jobs(knowledge_base_id, data_source_id)
        .await
    {
        Ok(jobs) => {
            info!(
                knowledge_base_id,
                data_source_id,
                count = jobs.len(),
                "Listed ingestion jobs"
            );
            Some(jobs)
        }
        Err(e) => {
            error!(error = %e, knowledge_base_id, data_source_id, "Error listing ingestion jobs");
            None
        }
    }
}

/// Time between start and end, if the job has both. An end reported before
/// the start counts as zero.
pub fn job_duration(job: &IngestionJob) -> Option<std::time::Duration> {
    let (start, end) = (job.started_at?, job.ended_at()?);
    Some((end - start).to_std().unwrap_or_default())
}

/// Renders one job as `Label: value` lines; absent fields are left out.
pub fn render_job(job: &IngestionJob) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Job ID: {}", job.job_id);
    let _ = writeln!(out, "Status: {}", job.status);
    if let Some(start) = job.started_at {
        let _ = writeln!(out, "Start Time: {}", start);
    }
    if let Some(end) = job.ended_at() {
        let _ = writeln!(out, "End Time: {}", end);
    }
    if let Some(duration) = job_duration(job) {
        let _ = writeln!(out, "Duration: {}", format_hms(duration));
    }
    if let Some(message) = &job.error_message {
        let _ = writeln!(out, "Error: {}", message);
    }
    out
}

pub fn render_jobs(jobs: &[IngestionJob]) -> String {
    let mut out = String::from("Ingestion Jobs:\n");
    if jobs.is_empty() {
        out.push_str("\n(none)\n");
    }
    for job in jobs {
        out.push('\n');
        out.push_str(&render_job(job));
    }
    out
}
