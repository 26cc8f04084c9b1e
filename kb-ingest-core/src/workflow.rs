//! High-level pipeline: upload → ingest → wait → summarise → report.
//!
//! This module strings the individual steps together the way an operator runs
//! them from the command line:
//!   - Uploads the document and follows its ingestion job ([`crate::ingest`])
//!   - On success, waits for the index to settle and asks the summary prompt
//!     ([`crate::query`])
//!   - Always lists the data source's job history ([`crate::history`])
//!
//! # Error Handling
//! No step aborts the pipeline: each one reports its own failure and leaves an
//! empty slot in the [`WorkflowReport`]. Callers decide what counts as failure
//! (the CLI uses [`IngestionReport::success`]).

use std::time::Duration;

use tracing::info;

use crate::contract::{
    AnswerGenerator, GeneratedAnswer, IngestionJobSummary, KnowledgeBaseControl, ObjectStore,
    Sleeper,
};
use crate::history::list_jobs;
use crate::ingest::{describe, submit_and_monitor, IngestionReport, IngestionRequest, PollPolicy};
use crate::query::{query_knowledge_base, QuerySettings, SUMMARY_PROMPT};
use crate::timer::format_hms;

/// Default wait between a completed ingestion and the summary query.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(10);

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub ingest: IngestionRequest,
    pub polling: PollPolicy,
    pub query: QuerySettings,
    pub settle: Duration,
    /// `None` skips the summary query.
    pub summary_prompt: Option<String>,
}

impl WorkflowConfig {
    pub fn new(ingest: IngestionRequest) -> Self {
        Self {
            ingest,
            polling: PollPolicy::default(),
            query: QuerySettings::default(),
            settle: DEFAULT_SETTLE,
            summary_prompt: Some(SUMMARY_PROMPT.to_string()),
        }
    }
}

#[derive(Debug)]
pub struct WorkflowReport {
    pub ingestion: IngestionReport,
    /// Answer to the summary prompt, if it was asked and answered.
    pub summary: Option<GeneratedAnswer>,
    /// Job history, if it could be listed.
    pub jobs: Option<Vec<IngestionJobSummary>>,
}

pub async fn run_workflow<S, C, G, Z>(
    config: &WorkflowConfig,
    store: &S,
    control: &C,
    generator: &G,
    sleeper: &Z,
) -> WorkflowReport
where
    S: ObjectStore + ?Sized,
    C: KnowledgeBaseControl + ?Sized,
    G: AnswerGenerator + ?Sized,
    Z: Sleeper + ?Sized,
{
    info!(
        file = %config.ingest.file_path.display(),
        knowledge_base_id = %config.ingest.knowledge_base_id,
        "[WORKFLOW] Starting upload and ingestion"
    );
    let ingestion =
        submit_and_monitor(&config.ingest, &config.polling, store, control, sleeper).await;
    info!(
        success = ingestion.success(),
        duration = ?ingestion.duration.map(format_hms),
        "[WORKFLOW] {}",
        describe(&ingestion)
    );

    let mut summary = None;
    if ingestion.success() {
        if let Some(prompt) = &config.summary_prompt {
            info!(
                settle = ?config.settle,
                "[WORKFLOW] Waiting for knowledge base to be fully updated"
            );
            sleeper.sleep(config.settle).await;
            summary = query_knowledge_base(
                generator,
                &config.query,
                &config.ingest.knowledge_base_id,
                prompt,
            )
            .await;
        }
    }

    let jobs = list_jobs(
        control,
        &config.ingest.knowledge_base_id,
        &config.ingest.data_source_id,
    )
    .await;

    WorkflowReport {
        ingestion,
        summary,
        jobs,
    }
}
