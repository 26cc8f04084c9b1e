//! # Bedrock clients (CLI <-> Core)
//!
//! This module wires the [`KnowledgeBaseControl`] and [`AnswerGenerator`]
//! traits from `kb-ingest-core` to the real service:
//!
//! - control plane (`bedrock-agent.<region>.amazonaws.com`): knowledge bases
//!   and ingestion jobs,
//! - runtime (`bedrock-agent-runtime.<region>.amazonaws.com`):
//!   `RetrieveAndGenerate`.
//!
//! Both are signed with SigV4 under the `bedrock` service name. Listings follow
//! `nextToken` until the service stops returning one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kb_ingest_core::contract::{
    AnswerGenerator, Citation, GeneratedAnswer, IngestionJob, IngestionJobStatus,
    IngestionJobSummary, KnowledgeBase, KnowledgeBaseControl, RetrievalRequest, SourceReference,
};
use kb_ingest_core::error::ServiceError;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::aws::{decode, Endpoint, Signer};
use crate::sigv4::uri_encode;

const SIGNING_SERVICE: &str = "bedrock";
const PAGE_SIZE: u32 = 100;

pub struct BedrockClient {
    signer: Signer,
    agent: Endpoint,
    runtime: Endpoint,
}

impl BedrockClient {
    pub fn new(
        http: reqwest::Client,
        creds: crate::sigv4::AwsCredentials,
        region: &str,
        agent_endpoint: Option<&str>,
        runtime_endpoint: Option<&str>,
    ) -> Result<Self, ServiceError> {
        let agent = match agent_endpoint {
            Some(url) => Endpoint::parse(url)?,
            None => Endpoint::parse(&format!("https://bedrock-agent.{region}.amazonaws.com"))?,
        };
        let runtime = match runtime_endpoint {
            Some(url) => Endpoint::parse(url)?,
            None => Endpoint::parse(&format!(
                "https://bedrock-agent-runtime.{region}.amazonaws.com"
            ))?,
        };
        tracing::info!(
            region,
            agent = %agent.host(),
            runtime = %runtime.host(),
            "Initialized Bedrock client"
        );
        Ok(Self {
            signer: Signer::new(http, creds, region, SIGNING_SERVICE),
            agent,
            runtime,
        })
    }

    async fn call_agent<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ServiceError> {
        let payload = match body {
            Some(value) => serde_json::to_vec(&value).map_err(|e| ServiceError::Decode {
                operation,
                message: format!("failed to encode request: {e}"),
            })?,
            None => Vec::new(),
        };
        let bytes = self
            .signer
            .send(
                operation,
                method,
                &self.agent,
                path,
                payload,
                Some("application/json"),
            )
            .await?;
        decode(operation, &bytes)
    }
}

fn ingestion_jobs_path(knowledge_base_id: &str, data_source_id: &str) -> String {
    format!(
        "/knowledgebases/{}/datasources/{}/ingestionjobs/",
        uri_encode(knowledge_base_id),
        uri_encode(data_source_id)
    )
}

// ============ Wire types ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListKnowledgeBasesResponse {
    #[serde(default)]
    knowledge_base_summaries: Vec<KnowledgeBaseSummaryWire>,
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KnowledgeBaseSummaryWire {
    knowledge_base_id: String,
    name: String,
    description: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestionJobResponse {
    ingestion_job: IngestionJobWire,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListIngestionJobsResponse {
    #[serde(default)]
    ingestion_job_summaries: Vec<IngestionJobWire>,
    next_token: Option<String>,
}

/// Shared shape of `IngestionJob` and `IngestionJobSummary`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestionJobWire {
    ingestion_job_id: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    failure_reasons: Vec<String>,
}

impl From<IngestionJobWire> for IngestionJob {
    fn from(wire: IngestionJobWire) -> Self {
        let error_message = if wire.failure_reasons.is_empty() {
            None
        } else {
            Some(wire.failure_reasons.join("; "))
        };
        // The last update of a finished job is when it finished.
        IngestionJob::new(
            wire.ingestion_job_id,
            IngestionJobStatus::from(wire.status.as_str()),
            wire.started_at,
            wire.updated_at,
            error_message,
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveAndGenerateBody<'a> {
    input: TextInput<'a>,
    retrieve_and_generate_configuration: serde_json::Value,
}

#[derive(Serialize)]
struct TextInput<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveAndGenerateResponse {
    output: Option<TextOutput>,
    #[serde(default)]
    citations: Vec<CitationWire>,
    session_id: Option<String>,
}

#[derive(Deserialize)]
struct TextOutput {
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CitationWire {
    generated_response_part: Option<GeneratedResponsePartWire>,
    #[serde(default)]
    retrieved_references: Vec<RetrievedReferenceWire>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedResponsePartWire {
    text_response_part: Option<TextOutput>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrievedReferenceWire {
    location: Option<LocationWire>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationWire {
    s3_location: Option<S3LocationWire>,
}

#[derive(Deserialize)]
struct S3LocationWire {
    uri: Option<String>,
}

impl From<RetrieveAndGenerateResponse> for GeneratedAnswer {
    fn from(resp: RetrieveAndGenerateResponse) -> Self {
        let citations = resp
            .citations
            .into_iter()
            .map(|c| Citation {
                text: c
                    .generated_response_part
                    .and_then(|p| p.text_response_part)
                    .map(|t| t.text)
                    .unwrap_or_default(),
                references: c
                    .retrieved_references
                    .into_iter()
                    .map(|r| SourceReference {
                        uri: r.location.and_then(|l| l.s3_location).and_then(|s| s.uri),
                    })
                    .collect(),
            })
            .collect();
        GeneratedAnswer {
            text: resp.output.map(|o| o.text).unwrap_or_default(),
            citations,
            session_id: resp.session_id,
        }
    }
}

fn retrieve_and_generate_body(request: &RetrievalRequest) -> RetrieveAndGenerateBody<'_> {
    let mut vector_search = json!({ "numberOfResults": request.max_results });
    if let Some(search_type) = request.search_type {
        vector_search["overrideSearchType"] = json!(search_type.as_wire());
    }
    RetrieveAndGenerateBody {
        input: TextInput {
            text: &request.query_text,
        },
        retrieve_and_generate_configuration: json!({
            "type": "KNOWLEDGE_BASE",
            "knowledgeBaseConfiguration": {
                "knowledgeBaseId": request.knowledge_base_id,
                "modelArn": request.model_arn,
                "retrievalConfiguration": {
                    "vectorSearchConfiguration": vector_search
                }
            }
        }),
    }
}

// ============ Trait implementations ============

#[async_trait]
impl KnowledgeBaseControl for BedrockClient {
    async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, ServiceError> {
        let mut knowledge_bases = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let mut body = json!({ "maxResults": PAGE_SIZE });
            if let Some(token) = &next_token {
                body["nextToken"] = json!(token);
            }
            let page: ListKnowledgeBasesResponse = self
                .call_agent("ListKnowledgeBases", Method::POST, "/knowledgebases/", Some(body))
                .await?;
            knowledge_bases.extend(page.knowledge_base_summaries.into_iter().map(|kb| {
                KnowledgeBase {
                    id: kb.knowledge_base_id,
                    name: kb.name,
                    description: kb.description,
                    status: kb.status,
                }
            }));
            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }
        tracing::info!(count = knowledge_bases.len(), "Fetched knowledge bases");
        Ok(knowledge_bases)
    }

    async fn start_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        client_token: &str,
    ) -> Result<IngestionJob, ServiceError> {
        tracing::info!(knowledge_base_id, data_source_id, "Requesting ingestion job start");
        let resp: IngestionJobResponse = self
            .call_agent(
                "StartIngestionJob",
                Method::PUT,
                &ingestion_jobs_path(knowledge_base_id, data_source_id),
                Some(json!({ "clientToken": client_token })),
            )
            .await?;
        Ok(resp.ingestion_job.into())
    }

    async fn get_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        job_id: &str,
    ) -> Result<IngestionJob, ServiceError> {
        let path = format!(
            "{}{}",
            ingestion_jobs_path(knowledge_base_id, data_source_id),
            uri_encode(job_id)
        );
        let resp: IngestionJobResponse = self
            .call_agent("GetIngestionJob", Method::GET, &path, None)
            .await?;
        Ok(resp.ingestion_job.into())
    }

    async fn list_ingestion_jobs(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> Result<Vec<IngestionJobSummary>, ServiceError> {
        let path = ingestion_jobs_path(knowledge_base_id, data_source_id);
        let mut jobs = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let mut body = json!({ "maxResults": PAGE_SIZE });
            if let Some(token) = &next_token {
                body["nextToken"] = json!(token);
            }
            let page: ListIngestionJobsResponse = self
                .call_agent("ListIngestionJobs", Method::POST, &path, Some(body))
                .await?;
            jobs.extend(page.ingestion_job_summaries.into_iter().map(IngestionJob::from));
            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }
        Ok(jobs)
    }
}

#[async_trait]
impl AnswerGenerator for BedrockClient {
    async fn retrieve_and_generate(
        &self,
        request: &RetrievalRequest,
    ) -> Result<GeneratedAnswer, ServiceError> {
        const OPERATION: &str = "RetrieveAndGenerate";
        let payload = serde_json::to_vec(&retrieve_and_generate_body(request)).map_err(|e| {
            ServiceError::Decode {
                operation: OPERATION,
                message: format!("failed to encode request: {e}"),
            }
        })?;
        let bytes = self
            .signer
            .send(
                OPERATION,
                Method::POST,
                &self.runtime,
                "/retrieveAndGenerate",
                payload,
                Some("application/json"),
            )
            .await?;
        let resp: RetrieveAndGenerateResponse = decode(OPERATION, &bytes)?;
        Ok(resp.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_ingest_core::contract::SearchType;

    #[test]
    fn decodes_failed_job_with_reasons() {
        let body = br#"{"ingestionJob":{"ingestionJobId":"JOB1","knowledgeBaseId":"KB","dataSourceId":"DS",
            "status":"FAILED","startedAt":"2024-05-01T12:00:00Z","updatedAt":"2024-05-01T12:05:30.5Z",
            "failureReasons":["bad file","too large"]}}"#;
        let resp: IngestionJobResponse = decode("GetIngestionJob", body).unwrap();
        let job: IngestionJob = resp.ingestion_job.into();

        assert_eq!(job.job_id, "JOB1");
        assert_eq!(job.status, IngestionJobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("bad file; too large"));
        assert!(job.ended_at().is_some());
    }

    #[test]
    fn running_job_has_no_end_time() {
        let body = br#"{"ingestionJob":{"ingestionJobId":"JOB2","status":"IN_PROGRESS",
            "startedAt":"2024-05-01T12:00:00Z","updatedAt":"2024-05-01T12:01:00Z"}}"#;
        let resp: IngestionJobResponse = decode("GetIngestionJob", body).unwrap();
        let job: IngestionJob = resp.ingestion_job.into();

        assert_eq!(job.status, IngestionJobStatus::InProgress);
        assert_eq!(job.ended_at(), None);
        assert_eq!(job.error_message, None);
    }

    #[test]
    fn decodes_answer_with_citations() {
        let body = br#"{
            "output": {"text": "Revenue grew 12%."},
            "citations": [{
                "generatedResponsePart": {"textResponsePart": {"text": "Revenue grew 12%", "span": {"start": 0, "end": 16}}},
                "retrievedReferences": [
                    {"content": {"text": "..."}, "location": {"type": "S3", "s3Location": {"uri": "s3://kb-bench-us-west-2/documents/document.pdf"}}}
                ]
            }],
            "sessionId": "abc"
        }"#;
        let resp: RetrieveAndGenerateResponse = decode("RetrieveAndGenerate", body).unwrap();
        let answer: GeneratedAnswer = resp.into();

        assert_eq!(answer.text, "Revenue grew 12%.");
        assert_eq!(answer.session_id.as_deref(), Some("abc"));
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].text, "Revenue grew 12%");
        assert_eq!(
            answer.citations[0].references[0].uri.as_deref(),
            Some("s3://kb-bench-us-west-2/documents/document.pdf")
        );
    }

    #[test]
    fn request_body_carries_retrieval_configuration() {
        let request = RetrievalRequest {
            query_text: "summarise".to_string(),
            knowledge_base_id: "GMWJ9YXU6U".to_string(),
            model_arn: "arn:model".to_string(),
            max_results: 100,
            search_type: Some(SearchType::Hybrid),
        };
        let value = serde_json::to_value(retrieve_and_generate_body(&request)).unwrap();

        assert_eq!(value["input"]["text"], "summarise");
        let kb = &value["retrieveAndGenerateConfiguration"]["knowledgeBaseConfiguration"];
        assert_eq!(value["retrieveAndGenerateConfiguration"]["type"], "KNOWLEDGE_BASE");
        assert_eq!(kb["knowledgeBaseId"], "GMWJ9YXU6U");
        assert_eq!(kb["modelArn"], "arn:model");
        let search = &kb["retrievalConfiguration"]["vectorSearchConfiguration"];
        assert_eq!(search["numberOfResults"], 100);
        assert_eq!(search["overrideSearchType"], "HYBRID");
    }

    #[test]
    fn request_body_omits_search_type_by_default() {
        let request = RetrievalRequest {
            query_text: "q".to_string(),
            knowledge_base_id: "KB".to_string(),
            model_arn: "arn:model".to_string(),
            max_results: 5,
            search_type: None,
        };
        let value = serde_json::to_value(retrieve_and_generate_body(&request)).unwrap();
        let search = &value["retrieveAndGenerateConfiguration"]["knowledgeBaseConfiguration"]
            ["retrievalConfiguration"]["vectorSearchConfiguration"];
        assert!(search.get("overrideSearchType").is_none());
    }

    #[test]
    fn job_paths_are_encoded() {
        assert_eq!(
            ingestion_jobs_path("GMWJ9YXU6U", "KFD2PZZ7HC"),
            "/knowledgebases/GMWJ9YXU6U/datasources/KFD2PZZ7HC/ingestionjobs/"
        );
    }
}
