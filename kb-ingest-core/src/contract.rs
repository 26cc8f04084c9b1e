#![allow(unused)]

//! # contract: service interfaces and the data they exchange
//!
//! Every external collaborator of the ingestion workflow is a trait here:
//!
//! - [`ObjectStore`]: writes a document under a bucket/key.
//! - [`KnowledgeBaseControl`]: knowledge-base control plane (list knowledge
//!   bases, start/get/list ingestion jobs).
//! - [`AnswerGenerator`]: combined retrieve-and-generate runtime.
//! - [`Chooser`]: the operator picking one knowledge base from a list.
//! - [`Sleeper`]: the pause between job status checks.
//!
//! Real implementations live in the `kb-ingest` crate (AWS clients, console);
//! the core crate only depends on these traits.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`; with the `test-export-mocks`
//!   feature the generated `Mock*` types are public so dependants can script
//!   the services in their own tests.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::{automock, predicate::*};

use crate::error::{InputError, ServiceError};

/// A managed, queryable index of documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnowledgeBase {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
}

/// Lifecycle of an ingestion job as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IngestionJobStatus {
    Starting,
    InProgress,
    Complete,
    Failed,
    Stopped,
    /// Any status this client does not know about; never terminal.
    Unknown(String),
}

impl IngestionJobStatus {
    /// `COMPLETE`, `FAILED` and `STOPPED` end a job; nothing changes afterwards.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IngestionJobStatus::Complete | IngestionJobStatus::Failed | IngestionJobStatus::Stopped
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            IngestionJobStatus::Starting => "STARTING",
            IngestionJobStatus::InProgress => "IN_PROGRESS",
            IngestionJobStatus::Complete => "COMPLETE",
            IngestionJobStatus::Failed => "FAILED",
            IngestionJobStatus::Stopped => "STOPPED",
            IngestionJobStatus::Unknown(other) => other,
        }
    }
}

impl From<&str> for IngestionJobStatus {
    fn from(s: &str) -> Self {
        match s {
            "STARTING" => IngestionJobStatus::Starting,
            "IN_PROGRESS" => IngestionJobStatus::InProgress,
            "COMPLETE" => IngestionJobStatus::Complete,
            "FAILED" => IngestionJobStatus::Failed,
            "STOPPED" => IngestionJobStatus::Stopped,
            other => {
                tracing::debug!(status = other, "Unrecognised ingestion job status");
                IngestionJobStatus::Unknown(other.to_string())
            }
        }
    }
}

impl std::fmt::Display for IngestionJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An asynchronous indexing run over one data source of a knowledge base.
///
/// Created by the service on submission and only ever observed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionJob {
    pub job_id: String,
    pub status: IngestionJobStatus,
    pub started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Entries of the job history are the same shape as a polled job.
pub type IngestionJobSummary = IngestionJob;

impl IngestionJob {
    /// Builds a job, keeping `ended_at` only if `status` is terminal.
    pub fn new(
        job_id: impl Into<String>,
        status: IngestionJobStatus,
        started_at: Option<DateTime<Utc>>,
        ended_at: Option<DateTime<Utc>>,
        error_message: Option<String>,
    ) -> Self {
        let ended_at = if status.is_terminal() { ended_at } else { None };
        Self {
            job_id: job_id.into(),
            status,
            started_at,
            ended_at,
            error_message,
        }
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }
}

/// Where a cited passage came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReference {
    /// Storage location, e.g. `s3://bucket/documents/document.pdf`.
    pub uri: Option<String>,
}

/// A span of generated text and the passages that justified it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub text: String,
    pub references: Vec<SourceReference>,
}

/// Output of a retrieve-and-generate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedAnswer {
    pub text: String,
    pub citations: Vec<Citation>,
    pub session_id: Option<String>,
}

/// Override for how passages are retrieved from the vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Hybrid,
    Semantic,
}

impl SearchType {
    pub fn as_wire(&self) -> &'static str {
        match self {
            SearchType::Hybrid => "HYBRID",
            SearchType::Semantic => "SEMANTIC",
        }
    }
}

/// Everything a retrieve-and-generate request needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievalRequest {
    pub query_text: String,
    pub knowledge_base_id: String,
    pub model_arn: String,
    pub max_results: u32,
    pub search_type: Option<SearchType>,
}

/// Writes documents into object storage.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `bucket`/`key`. The write is treated as atomic.
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>)
        -> Result<(), ServiceError>;
}

/// Knowledge-base control plane.
///
/// The implementor handles endpoints, signing and pagination; every listing
/// returns the complete result of a single pass.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait KnowledgeBaseControl: Send + Sync {
    async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, ServiceError>;

    /// Start an ingestion job. Calls sharing a `client_token` create at most one job.
    async fn start_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        client_token: &str,
    ) -> Result<IngestionJob, ServiceError>;

    async fn get_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        job_id: &str,
    ) -> Result<IngestionJob, ServiceError>;

    async fn list_ingestion_jobs(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> Result<Vec<IngestionJobSummary>, ServiceError>;
}

/// Retrieval-augmented generation over a knowledge base.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn retrieve_and_generate(
        &self,
        request: &RetrievalRequest,
    ) -> Result<GeneratedAnswer, ServiceError>;
}

/// Lets an operator pick one knowledge base.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Chooser {
    /// Returns the operator's 1-based selection exactly as entered; range
    /// checking is the caller's job.
    fn choose(&self, knowledge_bases: &[KnowledgeBase]) -> Result<usize, InputError>;
}

/// Suspends the workflow between status checks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
