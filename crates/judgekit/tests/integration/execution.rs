use judgekit::{Runtime, TestCase};
use tokio_util::sync::CancellationToken;

use super::{cases, fixture_source, python_runtime};

#[tokio::test]
async fn test_runtime_reports_version() {
    let runtime = python_runtime(None).await;
    assert!(runtime.is_loaded());
    let version = runtime.version().expect("version probed on load");
    assert!(version.starts_with("Python 3"), "unexpected version {version}");
}

#[tokio::test]
async fn test_echo_passes() {
    let runtime = python_runtime(None).await;
    let result = runtime
        .execute(
            &fixture_source("echo.py"),
            &cases("echo", 2),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.total_count(), 2);
    assert!(result.all_passed(), "{:?}", result.test_results);
    assert_eq!(result.test_results[0].input, "5\n");
    assert_eq!(result.output, "5\n\n---\nhello\n");
}

#[tokio::test]
async fn test_runtime_error_is_reported() {
    let runtime = python_runtime(None).await;
    let result = runtime
        .execute(
            &fixture_source("raises.py"),
            &cases("echo", 1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let case = &result.test_results[0];
    assert!(!case.passed);
    assert!(case.actual.contains("Error:"), "{}", case.actual);
    assert!(case.actual.contains("cannot handle 5"), "{}", case.actual);
}

#[tokio::test]
async fn test_missing_case_does_not_block_siblings() {
    let runtime = python_runtime(None).await;
    let mut tests = cases("sum", 2);
    tests.insert(1, TestCase::new("missing", "nope.in", "nope.out"));

    let result = runtime
        .execute(&fixture_source("sum.py"), &tests, &CancellationToken::new())
        .await
        .unwrap();

    let passed: Vec<_> = result.test_results.iter().map(|r| r.passed).collect();
    assert_eq!(passed, vec![true, false, true]);
    assert_eq!(result.test_results[1].expected, "Error loading test case");
    assert!(result.test_results[1].actual.starts_with("Error: "));
}

#[tokio::test]
async fn test_time_limit() {
    let runtime = python_runtime(Some(0.5)).await;
    let result = runtime
        .execute(
            &fixture_source("sleeps.py"),
            &cases("echo", 1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let case = &result.test_results[0];
    assert!(!case.passed);
    assert!(case.actual.contains("Time Limit Exceeded"), "{}", case.actual);
}

#[tokio::test]
async fn test_cancellation_stops_the_run() {
    let runtime = python_runtime(None).await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let result = runtime
        .execute(&fixture_source("sleeps.py"), &cases("echo", 2), &cancel)
        .await
        .unwrap();

    assert!(started.elapsed() < std::time::Duration::from_secs(5));
    assert_eq!(result.total_count(), 2);
    for case in &result.test_results {
        assert!(!case.passed);
        assert!(case.actual.contains("Execution cancelled"), "{}", case.actual);
    }
}
