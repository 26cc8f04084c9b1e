//! Retrieval-augmented queries against a knowledge base.

use std::fmt::Write;

use tracing::{debug, error, info, warn};

use crate::contract::{AnswerGenerator, GeneratedAnswer, RetrievalRequest, SearchType};

/// Foundation model used to generate answers unless configured otherwise.
pub const DEFAULT_MODEL_ARN: &str =
    "arn:aws:bedrock:us-west-2::foundation-model/anthropic.claude-3-haiku-20240307-v1:0";

/// Most supporting passages a single vector search may return.
pub const MAX_RETRIEVAL_RESULTS: u32 = 100;

/// Prompt sent after a successful ingestion.
pub const SUMMARY_PROMPT: &str = "Please provide a comprehensive summary of the document, including:
1. Main topics and key points
2. Important findings or conclusions
3. Any significant data or statistics
4. Key recommendations (if any)

Please structure the summary in a clear, organized way.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySettings {
    pub model_arn: String,
    pub max_results: u32,
    pub search_type: Option<SearchType>,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            model_arn: DEFAULT_MODEL_ARN.to_string(),
            max_results: MAX_RETRIEVAL_RESULTS,
            search_type: None,
        }
    }
}

impl QuerySettings {
    pub fn request(&self, knowledge_base_id: &str, query_text: &str) -> RetrievalRequest {
        let max_results = self.max_results.clamp(1, MAX_RETRIEVAL_RESULTS);
        if max_results != self.max_results {
            warn!(
                requested = self.max_results,
                used = max_results,
                "max_results out of range, clamped"
            );
        }
        RetrievalRequest {
            query_text: query_text.to_string(),
            knowledge_base_id: knowledge_base_id.to_string(),
            model_arn: self.model_arn.clone(),
            max_results,
            search_type: self.search_type,
        }
    }
}

/// Single retrieve-and-generate attempt. Errors are logged and yield `None`.
pub async fn query_knowledge_base<G>(
    generator: &G,
    settings: &QuerySettings,
    knowledge_base_id: &str,
    query_text: &str,
) -> Option<GeneratedAnswer>
where
    G: AnswerGenerator + ?Sized,
{
    let request = settings.request(knowledge_base_id, query_text);
    info!(
        knowledge_base_id,
        model_arn = %request.model_arn,
        max_results = request.max_results,
        "Querying knowledge base"
    );

    match generator.retrieve_and_generate(&request).await {
        Ok(answer) => {
            info!(citations = answer.citations.len(), "Received generated answer");
            match serde_json::to_string_pretty(&answer) {
                Ok(json) => debug!(json = %json, "Generated answer as JSON"),
                Err(e) => debug!(error = ?e, "Failed to serialize generated answer as JSON"),
            }
            Some(answer)
        }
        Err(e) => {
            error!(error = %e, knowledge_base_id, "Error querying knowledge base");
            None
        }
    }
}

/// Answer text followed by its citations and, per citation, the first source
/// location.
pub fn render_answer(answer: &GeneratedAnswer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Response:");
    let _ = writeln!(out, "{}", answer.text);

    if !answer.citations.is_empty() {
        let _ = writeln!(out, "\nCitations:");
        for citation in &answer.citations {
            let _ = writeln!(out, "- {}", citation.text);
            if let Some(uri) = citation.references.first().and_then(|r| r.uri.as_deref()) {
                let _ = writeln!(out, "  Source: {}", uri);
            }
        }
    }
    out
}
