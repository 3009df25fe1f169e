use judgekit::{ExecutionError, ExecutionMode, OverallStatus, RuntimeBackend, TestCase};

use super::{cases, fixture_source, python_service};

#[tokio::test]
async fn test_python_print_input_passes() {
    let service = python_service().await;
    let tests = vec![TestCase::new("echo", "echo_1.in", "echo_1.out")];

    let result = service
        .execute_code("print(input())", &tests, "python", ExecutionMode::default())
        .await
        .unwrap();

    assert!(result.test_results[0].passed);
    assert_eq!(result.backend.as_deref(), Some(RuntimeBackend::NAME));
    assert!(result.output.starts_with("Sample Test Results (1/1 passed):\n✅ echo\n\n"));
    assert!(result.output.ends_with("--- Executed using: python (Interpreter) ---"));
}

#[tokio::test]
async fn test_python_raise_fails_case() {
    let service = python_service().await;

    let result = service
        .execute_code(
            &fixture_source("raises.py"),
            &cases("echo", 1),
            "python",
            ExecutionMode::default(),
        )
        .await
        .unwrap();

    assert!(!result.test_results[0].passed);
    assert!(result.test_results[0].actual.contains("Error:"));
    assert!(result.output.contains("❌ echo 1"));
}

#[tokio::test]
async fn test_judge_only_language_needs_auth() {
    let service = python_service().await;

    assert!(!service.is_language_available("go"));
    assert!(service.requires_auth("go"));
    let err = service
        .execute_code("package main", &[], "go", ExecutionMode::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::LanguageUnavailable(_)));
    assert_eq!(err.to_string(), "Language go is not available");
}

#[tokio::test]
async fn test_submit_records_partial_result() {
    let service = python_service().await;

    let (result, submission) = service
        .execute_and_submit(&fixture_source("sum.py"), &cases("sum", 3), "python", "sum")
        .await
        .unwrap();

    assert_eq!(result.total_count(), 3);
    assert!(result.output.starts_with("Full Evaluation Results (2/3 passed):"));
    assert_eq!(submission.total_count, 3);
    assert_eq!(submission.passed_count, 2);
    assert_eq!(submission.failed_count, 1);
    assert_eq!(submission.overall_status, OverallStatus::Partial);

    let saved = service.submission_store().list("sum").await.unwrap();
    assert_eq!(saved.len(), 1);
}
