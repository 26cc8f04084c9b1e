use std::time::Duration;

use kb_ingest_core::contract::{
    GeneratedAnswer, IngestionJob, IngestionJobStatus, MockAnswerGenerator,
    MockKnowledgeBaseControl, MockObjectStore, MockSleeper,
};
use kb_ingest_core::ingest::{IngestionOutcome, IngestionRequest};
use kb_ingest_core::query::SUMMARY_PROMPT;
use kb_ingest_core::workflow::{run_workflow, WorkflowConfig};
use tempfile::tempdir;

fn job(status: IngestionJobStatus) -> IngestionJob {
    IngestionJob::new("job-e2e", status, None, None, None)
}

fn config(file_path: std::path::PathBuf) -> WorkflowConfig {
    WorkflowConfig::new(IngestionRequest {
        file_path,
        bucket: "kb-bench-us-west-2".to_string(),
        object_key: "documents/document.pdf".to_string(),
        knowledge_base_id: "GMWJ9YXU6U".to_string(),
        data_source_id: "KFD2PZZ7HC".to_string(),
    })
}

#[tokio::test]
async fn test_workflow_ingests_document_and_summarises_it() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("document.pdf");
    std::fs::write(&file_path, b"%PDF-1.4 quarterly report").unwrap();
    let config = config(file_path);

    let mut store = MockObjectStore::new();
    store
        .expect_put_object()
        .times(1)
        .returning(|bucket, key, _| {
            assert_eq!(bucket, "kb-bench-us-west-2");
            assert_eq!(key, "documents/document.pdf");
            Ok(())
        });

    let mut control = MockKnowledgeBaseControl::new();
    control
        .expect_start_ingestion_job()
        .times(1)
        .returning(|_, _, _| Ok(job(IngestionJobStatus::Starting)));
    let mut polls = vec![IngestionJobStatus::Starting, IngestionJobStatus::Complete].into_iter();
    control
        .expect_get_ingestion_job()
        .times(2)
        .returning(move |_, _, _| Ok(job(polls.next().unwrap())));
    control
        .expect_list_ingestion_jobs()
        .times(1)
        .returning(|_, _| Ok(vec![job(IngestionJobStatus::Complete)]));

    let mut generator = MockAnswerGenerator::new();
    generator
        .expect_retrieve_and_generate()
        .times(1)
        .returning(|request| {
            assert_eq!(request.knowledge_base_id, "GMWJ9YXU6U");
            assert_eq!(request.query_text, SUMMARY_PROMPT);
            Ok(GeneratedAnswer {
                text: "A quarterly report covering revenue and outlook.".to_string(),
                citations: vec![],
                session_id: None,
            })
        });

    // One poll interval, then the settle wait before the summary query.
    let mut sleeper = MockSleeper::new();
    sleeper
        .expect_sleep()
        .withf(|d| *d == Duration::from_secs(30))
        .times(1)
        .returning(|_| ());
    sleeper
        .expect_sleep()
        .withf(|d| *d == Duration::from_secs(10))
        .times(1)
        .returning(|_| ());

    let report = run_workflow(&config, &store, &control, &generator, &sleeper).await;

    assert!(report.ingestion.success());
    let summary = report.summary.expect("summary answer expected");
    assert!(!summary.text.is_empty());
    assert_eq!(report.jobs.map(|jobs| jobs.len()), Some(1));
}

#[tokio::test]
async fn test_workflow_failed_ingestion_skips_summary_but_lists_jobs() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("document.pdf");
    std::fs::write(&file_path, b"%PDF-1.4").unwrap();
    let config = config(file_path);

    let mut store = MockObjectStore::new();
    store.expect_put_object().returning(|_, _, _| Ok(()));
    let mut control = MockKnowledgeBaseControl::new();
    control
        .expect_start_ingestion_job()
        .returning(|_, _, _| Ok(job(IngestionJobStatus::Starting)));
    control
        .expect_get_ingestion_job()
        .times(1)
        .returning(|_, _, _| {
            Ok(IngestionJob::new(
                "job-e2e",
                IngestionJobStatus::Failed,
                None,
                None,
                Some("unsupported file type".to_string()),
            ))
        });
    control
        .expect_list_ingestion_jobs()
        .times(1)
        .returning(|_, _| Ok(vec![]));
    let mut generator = MockAnswerGenerator::new();
    generator.expect_retrieve_and_generate().never();
    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().never();

    let report = run_workflow(&config, &store, &control, &generator, &sleeper).await;

    assert!(!report.ingestion.success());
    assert!(matches!(
        report.ingestion.outcome,
        IngestionOutcome::Failed { ref message, .. } if message == "unsupported file type"
    ));
    assert!(report.summary.is_none());
    assert_eq!(report.jobs.map(|jobs| jobs.len()), Some(0));
}
