use chrono::{TimeZone, Utc};
use kb_ingest_core::contract::{IngestionJob, IngestionJobStatus, MockKnowledgeBaseControl};
use kb_ingest_core::error::ServiceError;
use kb_ingest_core::history::{job_duration, list_jobs, render_job, render_jobs};

fn finished_job() -> IngestionJob {
    IngestionJob::new(
        "job-done",
        IngestionJobStatus::Complete,
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 13, 2, 3).unwrap()),
        None,
    )
}

#[test]
fn test_render_job_with_start_and_end_shows_duration() {
    let rendered = render_job(&finished_job());

    assert!(rendered.contains("Job ID: job-done"));
    assert!(rendered.contains("Status: COMPLETE"));
    assert!(rendered.contains("Start Time: 2024-05-01 12:00:00 UTC"));
    assert!(rendered.contains("End Time: 2024-05-01 13:02:03 UTC"));
    assert!(rendered.contains("Duration: 1h 2m 3s"), "got:\n{rendered}");
    assert!(!rendered.contains("Error:"));
}

#[test]
fn test_render_job_missing_end_has_no_duration() {
    let job = IngestionJob::new(
        "job-running",
        IngestionJobStatus::InProgress,
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        None,
        None,
    );
    let rendered = render_job(&job);

    assert!(rendered.contains("Start Time:"));
    assert!(!rendered.contains("End Time:"));
    assert!(!rendered.contains("Duration:"));
    assert_eq!(job_duration(&job), None);
}

#[test]
fn test_render_job_missing_start_has_no_duration() {
    let job = IngestionJob::new(
        "job-odd",
        IngestionJobStatus::Failed,
        None,
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        Some("parsing failed".to_string()),
    );
    let rendered = render_job(&job);

    assert!(rendered.contains("End Time:"));
    assert!(!rendered.contains("Duration:"));
    assert!(rendered.contains("Error: parsing failed"));
}

#[test]
fn test_non_terminal_job_drops_end_time() {
    let job = IngestionJob::new(
        "job-starting",
        IngestionJobStatus::Starting,
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap()),
        None,
    );
    assert_eq!(job.ended_at(), None);
}

#[test]
fn test_end_before_start_renders_zero_duration() {
    let job = IngestionJob::new(
        "job-skewed",
        IngestionJobStatus::Complete,
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 5).unwrap()),
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        None,
    );
    assert!(render_job(&job).contains("Duration: 0h 0m 0s"));
}

#[tokio::test]
async fn test_list_jobs_returns_service_listing() {
    let mut control = MockKnowledgeBaseControl::new();
    control
        .expect_list_ingestion_jobs()
        .times(1)
        .returning(|kb, ds| {
            assert_eq!(kb, "GMWJ9YXU6U");
            assert_eq!(ds, "KFD2PZZ7HC");
            Ok(vec![finished_job()])
        });

    let jobs = list_jobs(&control, "GMWJ9YXU6U", "KFD2PZZ7HC")
        .await
        .expect("listing should succeed");

    assert_eq!(jobs.len(), 1);
    let rendered = render_jobs(&jobs);
    assert!(rendered.starts_with("Ingestion Jobs:"));
    assert!(rendered.contains("Job ID: job-done"));
}

#[tokio::test]
async fn test_list_jobs_error_yields_none() {
    let mut control = MockKnowledgeBaseControl::new();
    control.expect_list_ingestion_jobs().returning(|_, _| {
        Err(ServiceError::Api {
            operation: "ListIngestionJobs",
            status: 404,
            message: "data source not found".to_string(),
        })
    });

    assert!(list_jobs(&control, "GMWJ9YXU6U", "missing").await.is_none());
}
