//! Interpreter-backed runtime
//!
//! Loading discovers the interpreter on PATH and probes its version. Each test
//! case then runs in a fresh process inside a fresh scratch directory, so no
//! state carries over between runs.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::process::Command;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::RuntimeConfig;
use crate::evaluate::{error_text, join_outputs};
use crate::fetch::ResourceFetcher;
use crate::runtime::process::{ProgramOutput, ProgramStatus, run_program};
use crate::runtime::{Runtime, RuntimeError, resolve_command};
use crate::types::{CodeExecutionResult, ResourceLimits, TestCase, TestResult};

/// Upper bound for the version probe run during loading
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

type LoadFuture = Shared<BoxFuture<'static, Result<LoadedInterpreter, String>>>;

#[derive(Debug, Clone)]
struct LoadedInterpreter {
    /// Run command with the interpreter resolved to an absolute path
    command: Vec<String>,
    version: Option<String>,
}

/// A [`Runtime`] that runs code through an interpreter binary
pub struct InterpreterRuntime {
    language: String,
    config: RuntimeConfig,

    /// Effective limits (defaults merged with the runtime's overrides)
    limits: ResourceLimits,

    fetcher: Arc<dyn ResourceFetcher>,

    /// Bounds concurrent executions
    slots: Arc<Semaphore>,

    loaded: OnceLock<LoadedInterpreter>,
    loading: Mutex<Option<LoadFuture>>,
}

impl InterpreterRuntime {
    pub fn new(
        language: impl Into<String>,
        config: RuntimeConfig,
        default_limits: &ResourceLimits,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> Self {
        let limits = match config.limits {
            Some(ref overrides) => default_limits.with_overrides(overrides),
            None => default_limits.clone(),
        };
        let slots = Arc::new(Semaphore::new(config.slots.max(1)));
        Self {
            language: language.into(),
            config,
            limits,
            fetcher,
            slots,
            loaded: OnceLock::new(),
            loading: Mutex::new(None),
        }
    }

    /// Effective resource limits for each run
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Number of free execution slots
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Await a shared load and record its outcome
    ///
    /// Whichever caller sees the load finish stores the interpreter, so the
    /// loaded state holds even when the caller that started it was dropped.
    async fn settle(&self, load: LoadFuture) -> Result<(), String> {
        let interpreter = load.await?;
        if self.loaded.set(interpreter).is_ok() {
            info!(version = ?self.version(), "runtime loaded");
        }
        Ok(())
    }

    /// Run the program once in a fresh scratch directory
    async fn run_case(
        &self,
        interpreter: &LoadedInterpreter,
        code: &str,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<ProgramOutput, RuntimeError> {
        let workdir = tempfile::Builder::new()
            .prefix("judgekit-")
            .tempdir()?;
        let source_path = workdir.path().join(self.config.source_name());
        tokio::fs::write(&source_path, code).await?;

        let command =
            RuntimeConfig::expand_command(&interpreter.command, &source_path.to_string_lossy());

        run_program(
            &command,
            workdir.path(),
            &self.config.env,
            input.as_bytes(),
            &self.limits,
            cancel,
        )
        .await
    }
}

impl std::fmt::Debug for InterpreterRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpreterRuntime")
            .field("language", &self.language)
            .field("command", &self.config.command)
            .field("limits", &self.limits)
            .field("loaded", &self.loaded.get())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Runtime for InterpreterRuntime {
    fn language(&self) -> &str {
        &self.language
    }

    fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    async fn wait_loaded(&self) -> bool {
        if self.is_loaded() {
            return true;
        }
        let in_flight = self.loading.lock().await.clone();
        match in_flight {
            Some(load) => self.settle(load).await.is_ok(),
            None => false,
        }
    }

    #[instrument(skip(self), fields(language = %self.language))]
    async fn load(&self) -> Result<(), RuntimeError> {
        if self.is_loaded() {
            return Ok(());
        }

        let load = self
            .loading
            .lock()
            .await
            .get_or_insert_with(|| {
                debug!("starting runtime load");
                probe_interpreter(self.config.clone()).boxed().shared()
            })
            .clone();

        self.settle(load)
            .await
            .map_err(|message| RuntimeError::LoadFailed {
                language: self.language.clone(),
                message,
            })
    }

    fn version(&self) -> Option<String> {
        self.loaded.get().and_then(|i| i.version.clone())
    }

    #[instrument(skip(self, code, tests, cancel), fields(language = %self.language, tests = tests.len()))]
    async fn execute(
        &self,
        code: &str,
        tests: &[TestCase],
        cancel: &CancellationToken,
    ) -> Result<CodeExecutionResult, RuntimeError> {
        let interpreter = self
            .loaded
            .get()
            .ok_or_else(|| RuntimeError::NotLoaded(self.language.clone()))?;

        let _permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RuntimeError::PoolClosed)?;

        let mut test_results = Vec::with_capacity(tests.len());
        let mut outputs = Vec::with_capacity(tests.len());

        for test in tests {
            if cancel.is_cancelled() {
                let result =
                    TestResult::errored(test, String::new(), String::new(), "Execution cancelled");
                outputs.push(result.actual.clone());
                test_results.push(result);
                continue;
            }

            let fetched = futures::try_join!(
                self.fetcher.fetch_text(&test.input_file),
                self.fetcher.fetch_text(&test.expected_file)
            );
            let (input, expected) = match fetched {
                Ok(texts) => texts,
                Err(e) => {
                    warn!(test = %test.description, error = %e, "failed to load test case");
                    let result = TestResult::load_failed(test, &e);
                    outputs.push(result.actual.clone());
                    test_results.push(result);
                    continue;
                }
            };

            let result = match self.run_case(interpreter, code, &input, cancel).await {
                Ok(output) => {
                    outputs.push(case_output(&output));
                    match output.status {
                        ProgramStatus::Exited(Some(0)) => {
                            TestResult::evaluated(test, input, expected, output.stdout)
                        }
                        _ => TestResult {
                            test_case: test.description.clone(),
                            expected,
                            actual: failure_text(&output),
                            passed: false,
                            input,
                        },
                    }
                }
                Err(e) => {
                    warn!(test = %test.description, error = %e, "test case run failed");
                    outputs.push(error_text(&e));
                    TestResult::errored(test, input, expected, &e)
                }
            };
            test_results.push(result);
        }

        Ok(CodeExecutionResult {
            output: join_outputs(&outputs),
            test_results,
            execution_time: None,
            backend: None,
        })
    }
}

/// Output shown for one test case in the combined output
fn case_output(output: &ProgramOutput) -> String {
    match output.status {
        ProgramStatus::Exited(Some(0)) => output.stdout.clone(),
        _ => failure_text(output),
    }
}

/// Actual text for a run that did not exit cleanly
///
/// Whatever the program printed is kept, followed by the error line.
fn failure_text(output: &ProgramOutput) -> String {
    let message = match output.status {
        ProgramStatus::TimedOut => "Time Limit Exceeded".to_string(),
        ProgramStatus::OutputLimitExceeded => "Output Limit Exceeded".to_string(),
        ProgramStatus::Cancelled => "Execution cancelled".to_string(),
        ProgramStatus::Exited(code) => match output.error_summary() {
            Some(summary) => summary.to_string(),
            None => match code {
                Some(code) => format!("Process exited with code {code}"),
                None => "Process terminated by signal".to_string(),
            },
        },
    };

    let mut text = output.stdout.clone();
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(&error_text(message));
    text
}

/// Locate the interpreter and probe its version
async fn probe_interpreter(config: RuntimeConfig) -> Result<LoadedInterpreter, String> {
    let mut command = config.command.clone();
    resolve_command(&mut command).map_err(|e| e.to_string())?;

    let version = match config.version_command {
        Some(mut version_command) => {
            resolve_command(&mut version_command).map_err(|e| e.to_string())?;
            Some(probe_version(&version_command).await?)
        }
        None => None,
    };

    Ok(LoadedInterpreter { command, version })
}

async fn probe_version(command: &[String]) -> Result<String, String> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| RuntimeError::EmptyCommand.to_string())?;

    let output = tokio::time::timeout(
        PROBE_TIMEOUT,
        Command::new(program).args(args).kill_on_drop(true).output(),
    )
    .await
    .map_err(|_| format!("version probe '{program}' timed out"))?
    .map_err(|e| format!("failed to run '{program}': {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "version probe '{program}' failed: {}",
            stderr.trim()
        ));
    }

    // Some interpreters print their version on stderr
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let version = stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string();
    Ok(version)
}
