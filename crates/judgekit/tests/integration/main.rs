//! Integration tests for judgekit
//!
//! These tests run real interpreters and need `python3` on PATH.
//! Run with: cargo test -p judgekit --features integration-tests

#![cfg(feature = "integration-tests")]

use std::path::PathBuf;
use std::sync::Arc;

use judgekit::{
    Config, ExecutionService, InterpreterRuntime, ResourceLimits, ResourceLoader, Runtime,
    RuntimeManager, TestCase,
};

mod config_loading;
mod execution;
mod service;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Helper to get fixture source code
pub(crate) fn fixture_source(name: &str) -> String {
    let path = format!("{FIXTURES_PATH}/sources/{name}");
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

/// Loader resolving test case references against the fixture cases
pub(crate) fn case_loader() -> Arc<ResourceLoader> {
    Arc::new(ResourceLoader::new(Some(PathBuf::from(format!(
        "{FIXTURES_PATH}/cases"
    )))))
}

/// Test cases `<prefix>_1` to `<prefix>_<count>`
pub(crate) fn cases(prefix: &str, count: usize) -> Vec<TestCase> {
    (1..=count)
        .map(|i| {
            TestCase::new(
                format!("{prefix} {i}"),
                format!("{prefix}_{i}.in"),
                format!("{prefix}_{i}.out"),
            )
        })
        .collect()
}

/// A loaded python runtime with an optional wall time limit
pub(crate) async fn python_runtime(wall_time_limit: Option<f64>) -> Arc<InterpreterRuntime> {
    let config = Config::default();
    let mut runtime_config = config.languages["python"]
        .runtime
        .clone()
        .expect("default config has a python runtime");
    if let Some(seconds) = wall_time_limit {
        runtime_config.limits = Some(ResourceLimits::new().with_wall_time_limit(seconds));
    }

    let runtime = Arc::new(InterpreterRuntime::new(
        "python",
        runtime_config,
        &config.default_limits,
        case_loader(),
    ));
    runtime.load().await.expect("python3 should be installed");
    runtime
}

/// Service for anonymous users with a loaded python runtime
pub(crate) async fn python_service() -> ExecutionService {
    let manager = Arc::new(RuntimeManager::new());
    manager.add_runtime(python_runtime(None).await);

    ExecutionService::builder(Config::default())
        .runtime_manager(manager)
        .fetcher(case_loader())
        .build()
        .expect("default config builds a service")
}
