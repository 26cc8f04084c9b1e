/// # kb-ingest CLI Interface (Module)
///
/// Command parsing and orchestration for the `kb-ingest` binary: every
/// subcommand loads the configuration, builds the AWS clients and hands over
/// to the workflow functions of [`kb-ingest-core`].
///
/// ## How To Use
/// - For command-line users: use the installed `kb-ingest` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// Operator-facing output (answers, listings) goes to stdout; progress is
/// logged through `tracing`.
///
/// [`kb-ingest-core`]: ../../kb-ingest-core/
use crate::bedrock::BedrockClient;
use crate::console::{interactive_queries, ConsoleChooser};
use crate::load_config::{load_optional_config, CliConfig, IngestSection};
use crate::s3::S3Client;
use crate::sigv4::AwsCredentials;
use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use kb_ingest_core::contract::{KnowledgeBaseControl, TokioSleeper};
use kb_ingest_core::history::{list_jobs, render_jobs};
use kb_ingest_core::ingest::describe;
use kb_ingest_core::query::{query_knowledge_base, render_answer};
use kb_ingest_core::select::{render_knowledge_bases, select_knowledge_base};
use kb_ingest_core::workflow::run_workflow;
use std::path::PathBuf;

/// CLI for kb-ingest: feed documents into Bedrock knowledge bases and query them.
#[derive(Parser)]
#[clap(
    name = "kb-ingest",
    version,
    about = "Ingest documents into Amazon Bedrock knowledge bases and query them"
)]
pub struct Cli {
    /// Path to the YAML config file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// AWS region (overrides the config file)
    #[clap(long, env = "AWS_REGION", global = true)]
    pub region: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the knowledge bases visible to the current credentials
    KnowledgeBases,
    /// Upload a document, ingest it and wait for the job to finish
    Ingest {
        #[clap(flatten)]
        target: IngestArgs,
        /// Do not ask the summary prompt after a successful ingestion
        #[clap(long)]
        no_summary: bool,
    },
    /// Show the ingestion job history of a data source
    Jobs {
        #[clap(long, env = "KB_KNOWLEDGE_BASE_ID")]
        knowledge_base_id: Option<String>,
        #[clap(long, env = "KB_DATA_SOURCE_ID")]
        data_source_id: Option<String>,
    },
    /// Ask a knowledge base a question, or several interactively
    Query {
        #[clap(long, env = "KB_KNOWLEDGE_BASE_ID")]
        knowledge_base_id: Option<String>,
        /// Ask this single question instead of prompting
        #[clap(long)]
        text: Option<String>,
    },
}

#[derive(Args, Default)]
pub struct IngestArgs {
    /// Local document to upload
    #[clap(long, env = "KB_INGEST_FILE")]
    pub file: Option<PathBuf>,
    #[clap(long, env = "KB_INGEST_BUCKET")]
    pub bucket: Option<String>,
    /// Object key within the bucket
    #[clap(long, env = "KB_INGEST_KEY")]
    pub key: Option<String>,
    #[clap(long, env = "KB_KNOWLEDGE_BASE_ID")]
    pub knowledge_base_id: Option<String>,
    #[clap(long, env = "KB_DATA_SOURCE_ID")]
    pub data_source_id: Option<String>,
}

impl From<IngestArgs> for IngestSection {
    fn from(args: IngestArgs) -> Self {
        IngestSection {
            file_path: args.file,
            bucket: args.bucket,
            object_key: args.key,
            knowledge_base_id: args.knowledge_base_id,
            data_source_id: args.data_source_id,
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config = load_optional_config(cli.config.as_deref())?;
    let region = config.region(cli.region.as_deref());

    match cli.command {
        Commands::KnowledgeBases => {
            tracing::info!(command = "knowledge-bases", %region, "Listing knowledge bases");
            let bedrock = bedrock_client(&config, &region)?;
            let knowledge_bases = bedrock
                .list_knowledge_bases()
                .await
                .context("Listing knowledge bases failed")?;
            if knowledge_bases.is_empty() {
                println!("No knowledge bases found.");
            } else {
                print!("{}", render_knowledge_bases(&knowledge_bases));
            }
            Ok(())
        }
        Commands::Ingest { target, no_summary } => {
            let mut workflow = config.workflow_config(&target.into())?;
            if no_summary {
                workflow.summary_prompt = None;
            }
            tracing::info!(command = "ingest", %region, "Starting ingestion workflow");
            let s3 = s3_client(&config, &region)?;
            let bedrock = bedrock_client(&config, &region)?;

            let report = tokio::select! {
                report = run_workflow(&workflow, &s3, &bedrock, &bedrock, &TokioSleeper) => report,
                _ = interrupted() => {
                    // Dropping the workflow stops its timer, which logs the elapsed time.
                    tracing::warn!(command = "ingest", "Interrupted while waiting for ingestion");
                    bail!("Ingestion interrupted");
                }
            };

            println!("{}", describe(&report.ingestion));
            if let Some(answer) = &report.summary {
                print!("\n{}", render_answer(answer));
            }
            if let Some(jobs) = &report.jobs {
                print!("\n{}", render_jobs(jobs));
            }

            if report.ingestion.success() {
                tracing::info!(command = "ingest", "Ingestion workflow complete");
                Ok(())
            } else {
                tracing::error!(
                    command = "ingest",
                    outcome = ?report.ingestion.outcome,
                    "Ingestion did not complete"
                );
                Err(anyhow!(describe(&report.ingestion)))
            }
        }
        Commands::Jobs {
            knowledge_base_id,
            data_source_id,
        } => {
            let merged = config.ingest_section(&IngestSection {
                knowledge_base_id,
                data_source_id,
                ..IngestSection::default()
            });
            let (Some(knowledge_base_id), Some(data_source_id)) =
                (merged.knowledge_base_id, merged.data_source_id)
            else {
                bail!("Missing required settings: knowledge_base_id and data_source_id");
            };
            tracing::info!(
                command = "jobs",
                %knowledge_base_id,
                %data_source_id,
                "Listing ingestion jobs"
            );
            let bedrock = bedrock_client(&config, &region)?;
            let jobs = list_jobs(&bedrock, &knowledge_base_id, &data_source_id)
                .await
                .ok_or_else(|| anyhow!("Listing ingestion jobs failed"))?;
            print!("{}", render_jobs(&jobs));
            Ok(())
        }
        Commands::Query {
            knowledge_base_id,
            text,
        } => {
            let bedrock = bedrock_client(&config, &region)?;
            let settings = config.query_settings();
            let knowledge_base_id = match knowledge_base_id
                .or_else(|| config.ingest.knowledge_base_id.clone())
            {
                Some(id) => id,
                None => select_knowledge_base(&bedrock, &ConsoleChooser)
                    .await
                    .ok_or_else(|| anyhow!("No knowledge base selected"))?,
            };
            tracing::info!(command = "query", %knowledge_base_id, "Querying knowledge base");

            match text {
                Some(text) => {
                    let answer =
                        query_knowledge_base(&bedrock, &settings, &knowledge_base_id, &text)
                            .await
                            .ok_or_else(|| anyhow!("Query failed"))?;
                    print!("{}", render_answer(&answer));
                }
                None => {
                    let stdin = std::io::stdin();
                    let mut stdout = std::io::stdout();
                    let asked = interactive_queries(
                        stdin.lock(),
                        &mut stdout,
                        &bedrock,
                        &settings,
                        &knowledge_base_id,
                    )
                    .await
                    .context("Console I/O failed")?;
                    tracing::info!(command = "query", asked, "Query session ended");
                }
            }
            Ok(())
        }
    }
}

fn credentials() -> Result<AwsCredentials> {
    AwsCredentials::from_env().context("Loading AWS credentials failed")
}

fn bedrock_client(config: &CliConfig, region: &str) -> Result<BedrockClient> {
    BedrockClient::new(
        reqwest::Client::new(),
        credentials()?,
        region,
        config.aws.agent_endpoint.as_deref(),
        config.aws.runtime_endpoint.as_deref(),
    )
    .context("Configuring Bedrock client failed")
}

fn s3_client(config: &CliConfig, region: &str) -> Result<S3Client> {
    let endpoint = config
        .aws
        .s3_endpoint
        .as_deref()
        .map(crate::aws::Endpoint::parse)
        .transpose()
        .context("Invalid S3 endpoint")?;
    let signer = crate::aws::Signer::new(reqwest::Client::new(), credentials()?, region, "s3");
    Ok(S3Client::new(signer, endpoint))
}

/// Resolves on Ctrl+C; never, if the signal cannot be captured.
async fn interrupted() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "Failed to capture Ctrl+C signal");
        std::future::pending::<()>().await;
    }
}
