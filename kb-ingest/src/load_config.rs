/// `load_config` module: loads the static YAML config and merges it with CLI flags
/// and environment variables into the core workflow types.
///
/// Every section of the file is optional. Values resolve in order
/// flag/environment > file > built-in default; the ingest fields have no
/// default and are reported by name when missing.
///
/// # Errors
/// All errors here are `anyhow::Error` and surface at the CLI boundary.
use anyhow::{anyhow, Result};
use kb_ingest_core::contract::SearchType;
use kb_ingest_core::ingest::{
    IngestionRequest, PollPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL,
};
use kb_ingest_core::query::{QuerySettings, DEFAULT_MODEL_ARN, MAX_RETRIEVAL_RESULTS};
use kb_ingest_core::workflow::{WorkflowConfig, DEFAULT_SETTLE};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_REGION: &str = "us-west-2";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub aws: AwsSection,
    pub ingest: IngestSection,
    pub polling: PollingSection,
    pub query: QuerySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AwsSection {
    pub region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub agent_endpoint: Option<String>,
    pub runtime_endpoint: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct IngestSection {
    pub file_path: Option<PathBuf>,
    pub bucket: Option<String>,
    pub object_key: Option<String>,
    pub knowledge_base_id: Option<String>,
    pub data_source_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PollingSection {
    pub interval_secs: u64,
    /// `null` polls until the job ends, however long that takes.
    pub max_attempts: Option<u32>,
    pub settle_secs: u64,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            settle_secs: DEFAULT_SETTLE.as_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct QuerySection {
    pub model_arn: String,
    pub max_results: u32,
    pub search_type: Option<SearchType>,
    pub summary_prompt: Option<String>,
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            model_arn: DEFAULT_MODEL_ARN.to_string(),
            max_results: MAX_RETRIEVAL_RESULTS,
            search_type: None,
            summary_prompt: None,
        }
    }
}

/// Loads a YAML config file. A missing section takes its defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    // An empty file deserializes to `null`.
    if config_content.trim().is_empty() {
        info!(config_path = ?path_ref, "Config file is empty, using defaults");
        return Ok(CliConfig::default());
    }

    match serde_yaml::from_str::<CliConfig>(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Loads `path` when given, otherwise starts from defaults.
pub fn load_optional_config(path: Option<&Path>) -> Result<CliConfig> {
    match path {
        Some(path) => load_config(path),
        None => {
            info!("No config file given, using defaults, flags and environment");
            Ok(CliConfig::default())
        }
    }
}

impl CliConfig {
    pub fn region(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| self.aws.region.clone())
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    /// Ingest fields with `overrides` taking precedence over the file.
    pub fn ingest_section(&self, overrides: &IngestSection) -> IngestSection {
        IngestSection {
            file_path: overrides.file_path.clone().or_else(|| self.ingest.file_path.clone()),
            bucket: overrides.bucket.clone().or_else(|| self.ingest.bucket.clone()),
            object_key: overrides.object_key.clone().or_else(|| self.ingest.object_key.clone()),
            knowledge_base_id: overrides
                .knowledge_base_id
                .clone()
                .or_else(|| self.ingest.knowledge_base_id.clone()),
            data_source_id: overrides
                .data_source_id
                .clone()
                .or_else(|| self.ingest.data_source_id.clone()),
        }
    }

    pub fn ingestion_request(&self, overrides: &IngestSection) -> Result<IngestionRequest> {
        let merged = self.ingest_section(overrides);
        let mut missing = Vec::new();
        if merged.file_path.is_none() {
            missing.push("file_path");
        }
        if merged.bucket.is_none() {
            missing.push("bucket");
        }
        if merged.object_key.is_none() {
            missing.push("object_key");
        }
        if merged.knowledge_base_id.is_none() {
            missing.push("knowledge_base_id");
        }
        if merged.data_source_id.is_none() {
            missing.push("data_source_id");
        }

        match merged {
            IngestSection {
                file_path: Some(file_path),
                bucket: Some(bucket),
                object_key: Some(object_key),
                knowledge_base_id: Some(knowledge_base_id),
                data_source_id: Some(data_source_id),
            } => Ok(IngestionRequest {
                file_path,
                bucket,
                object_key,
                knowledge_base_id,
                data_source_id,
            }),
            _ => {
                error!(?missing, "Ingest configuration incomplete");
                Err(anyhow!(
                    "Missing required ingest settings: {}",
                    missing.join(", ")
                ))
            }
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.polling.interval_secs),
            max_attempts: self.polling.max_attempts,
        }
    }

    pub fn query_settings(&self) -> QuerySettings {
        QuerySettings {
            model_arn: self.query.model_arn.clone(),
            max_results: self.query.max_results,
            search_type: self.query.search_type,
        }
    }

    pub fn workflow_config(&self, overrides: &IngestSection) -> Result<WorkflowConfig> {
        let mut config = WorkflowConfig::new(self.ingestion_request(overrides)?);
        config.polling = self.poll_policy();
        config.query = self.query_settings();
        config.settle = Duration::from_secs(self.polling.settle_secs);
        if let Some(prompt) = &self.query.summary_prompt {
            config.summary_prompt = Some(prompt.clone());
        }
        Ok(config)
    }
}
