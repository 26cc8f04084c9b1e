use kb_ingest_core::contract::{
    Citation, GeneratedAnswer, MockAnswerGenerator, SearchType, SourceReference,
};
use kb_ingest_core::error::ServiceError;
use kb_ingest_core::query::{
    query_knowledge_base, render_answer, QuerySettings, DEFAULT_MODEL_ARN, MAX_RETRIEVAL_RESULTS,
};

fn answer_with_citations() -> GeneratedAnswer {
    GeneratedAnswer {
        text: "The document covers benchmark results.".to_string(),
        citations: vec![
            Citation {
                text: "benchmark results".to_string(),
                references: vec![
                    SourceReference {
                        uri: Some("s3://kb-bench-us-west-2/documents/document.pdf".to_string()),
                    },
                    SourceReference {
                        uri: Some("s3://kb-bench-us-west-2/documents/other.pdf".to_string()),
                    },
                ],
            },
            Citation {
                text: "uncited span".to_string(),
                references: vec![],
            },
        ],
        session_id: Some("session-1".to_string()),
    }
}

#[tokio::test]
async fn test_query_builds_request_with_defaults() {
    let mut generator = MockAnswerGenerator::new();
    generator
        .expect_retrieve_and_generate()
        .times(1)
        .returning(|request| {
            assert_eq!(request.knowledge_base_id, "GMWJ9YXU6U");
            assert_eq!(request.query_text, "What is in the document?");
            assert_eq!(request.model_arn, DEFAULT_MODEL_ARN);
            assert_eq!(request.max_results, MAX_RETRIEVAL_RESULTS);
            assert_eq!(request.search_type, None);
            Ok(answer_with_citations())
        });

    let answer = query_knowledge_base(
        &generator,
        &QuerySettings::default(),
        "GMWJ9YXU6U",
        "What is in the document?",
    )
    .await
    .expect("answer expected");

    assert_eq!(answer.text, "The document covers benchmark results.");
}

#[tokio::test]
async fn test_query_clamps_max_results_and_passes_search_type() {
    let mut generator = MockAnswerGenerator::new();
    generator
        .expect_retrieve_and_generate()
        .times(1)
        .returning(|request| {
            assert_eq!(request.max_results, MAX_RETRIEVAL_RESULTS);
            assert_eq!(request.search_type, Some(SearchType::Hybrid));
            Ok(answer_with_citations())
        });
    let settings = QuerySettings {
        max_results: 500,
        search_type: Some(SearchType::Hybrid),
        ..QuerySettings::default()
    };

    assert!(query_knowledge_base(&generator, &settings, "GMWJ9YXU6U", "q")
        .await
        .is_some());
}

#[tokio::test]
async fn test_query_service_error_yields_none_without_retry() {
    let mut generator = MockAnswerGenerator::new();
    generator
        .expect_retrieve_and_generate()
        .times(1)
        .returning(|_| {
            Err(ServiceError::Api {
                operation: "RetrieveAndGenerate",
                status: 429,
                message: "Too many requests".to_string(),
            })
        });

    let answer =
        query_knowledge_base(&generator, &QuerySettings::default(), "GMWJ9YXU6U", "q").await;

    assert!(answer.is_none());
}

#[test]
fn test_render_answer_lists_citations_with_first_source() {
    let rendered = render_answer(&answer_with_citations());

    assert!(rendered.starts_with("Response:\nThe document covers benchmark results.\n"));
    assert!(rendered.contains(
        "\nCitations:\n- benchmark results\n  Source: s3://kb-bench-us-west-2/documents/document.pdf\n"
    ));
    assert!(!rendered.contains("other.pdf"));
    assert!(rendered.contains("- uncited span\n"));
}

#[test]
fn test_render_answer_source_is_first_reference_only() {
    let answer = GeneratedAnswer {
        text: "Answer.".to_string(),
        citations: vec![Citation {
            text: "span".to_string(),
            references: vec![
                SourceReference { uri: None },
                SourceReference {
                    uri: Some("s3://kb-bench-us-west-2/documents/other.pdf".to_string()),
                },
            ],
        }],
        session_id: None,
    };

    let rendered = render_answer(&answer);

    assert!(rendered.contains("- span\n"));
    assert!(!rendered.contains("Source:"), "got: {rendered}");
}

#[test]
fn test_render_answer_without_citations_has_no_section() {
    let answer = GeneratedAnswer {
        text: "No idea.".to_string(),
        citations: vec![],
        session_id: None,
    };
    assert_eq!(render_answer(&answer), "Response:\nNo idea.\n");
}
