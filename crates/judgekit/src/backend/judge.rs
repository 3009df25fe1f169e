//! Remote judge backend
//!
//! Speaks the Judge0 submission protocol: each test case is submitted with
//! `POST /submissions`, then `GET /submissions/{token}` is polled until the
//! status leaves the queue.
//!
//! References for the protocol and status ids:
//! - https://ce.judge0.com/#submissions-submission

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::auth::Credential;
use crate::backend::{Backend, BackendError};
use crate::config::JudgeConfig;
use crate::evaluate::join_outputs;
use crate::fetch::ResourceFetcher;
use crate::types::{CodeExecutionResult, TestCase, TestResult};

/// Failures of a single judge exchange, reported inside that case's result
#[derive(Debug, Error)]
enum JudgeError {
    #[error("Judge submission failed: {0}")]
    Submit(StatusCode),

    #[error("Failed to get submission result: {0}")]
    Poll(StatusCode),

    #[error("Judge execution timeout")]
    Timeout,

    #[error("Execution cancelled")]
    Cancelled,

    #[error("{0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct Submission<'a> {
    source_code: &'a str,
    language_id: u32,
    stdin: &'a str,
    expected_output: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmissionToken {
    token: String,
}

#[derive(Debug, Deserialize)]
struct SubmissionStatus {
    id: u32,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct SubmissionResponse {
    status: SubmissionStatus,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    compile_output: Option<String>,
}

/// Signal behind a judge runtime error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// SIGSEGV
    Segfault,
    /// SIGXFSZ, output file too large
    OutputLimit,
    /// SIGFPE
    FloatingPoint,
    /// SIGABRT
    Aborted,
    /// Non-zero exit code
    NonZeroExit,
    Other,
}

/// Judge status ids mapped to verdicts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgeVerdict {
    InQueue,
    Processing,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    CompilationError,
    RuntimeError(RuntimeErrorKind),
    InternalError,
    ExecFormatError,
    Unknown(u32),
}

impl JudgeVerdict {
    pub fn from_status_id(id: u32) -> Self {
        match id {
            1 => Self::InQueue,
            2 => Self::Processing,
            3 => Self::Accepted,
            4 => Self::WrongAnswer,
            5 => Self::TimeLimitExceeded,
            6 => Self::CompilationError,
            7 => Self::RuntimeError(RuntimeErrorKind::Segfault),
            8 => Self::RuntimeError(RuntimeErrorKind::OutputLimit),
            9 => Self::RuntimeError(RuntimeErrorKind::FloatingPoint),
            10 => Self::RuntimeError(RuntimeErrorKind::Aborted),
            11 => Self::RuntimeError(RuntimeErrorKind::NonZeroExit),
            12 => Self::RuntimeError(RuntimeErrorKind::Other),
            13 => Self::InternalError,
            14 => Self::ExecFormatError,
            other => Self::Unknown(other),
        }
    }

    /// Whether the submission is still waiting to finish
    ///
    /// Every status id up to 2 counts as pending, including unassigned ones.
    pub fn is_pending(&self) -> bool {
        match self {
            Self::InQueue | Self::Processing => true,
            Self::Unknown(id) => *id <= 2,
            _ => false,
        }
    }
}

/// What a finished submission means for its test case
struct JudgeOutcome {
    output: String,
    error: Option<String>,
}

impl JudgeOutcome {
    fn from_response(response: SubmissionResponse) -> Self {
        let stdout = response.stdout.unwrap_or_default();
        let stderr = response.stderr.unwrap_or_default();

        let (output, error) = match JudgeVerdict::from_status_id(response.status.id) {
            JudgeVerdict::Accepted => (stdout, None),
            JudgeVerdict::WrongAnswer => (stdout, Some("Wrong Answer".to_string())),
            JudgeVerdict::TimeLimitExceeded => {
                (String::new(), Some("Time Limit Exceeded".to_string()))
            }
            JudgeVerdict::CompilationError => (
                String::new(),
                Some(format!(
                    "Compilation Error: {}",
                    response.compile_output.unwrap_or_default()
                )),
            ),
            JudgeVerdict::RuntimeError(kind) => {
                let message = match kind {
                    RuntimeErrorKind::OutputLimit => "Output limit exceeded".to_string(),
                    RuntimeErrorKind::FloatingPoint => "Floating point exception".to_string(),
                    RuntimeErrorKind::Aborted => "Aborted".to_string(),
                    RuntimeErrorKind::NonZeroExit => "Non-zero exit code".to_string(),
                    RuntimeErrorKind::Segfault | RuntimeErrorKind::Other => stderr,
                };
                (String::new(), Some(format!("Runtime Error: {message}")))
            }
            JudgeVerdict::InternalError => {
                (String::new(), Some("Internal Judge Error".to_string()))
            }
            JudgeVerdict::ExecFormatError => {
                (String::new(), Some("Exec Format Error".to_string()))
            }
            JudgeVerdict::InQueue | JudgeVerdict::Processing | JudgeVerdict::Unknown(_) => {
                (stdout, Some(response.status.description))
            }
        };

        Self { output, error }
    }
}

/// Backend submitting code to a remote judge
///
/// Only available to authenticated users.
pub struct JudgeBackend {
    language: String,
    language_id: u32,
    config: JudgeConfig,
    credential: Option<Credential>,
    fetcher: Arc<dyn ResourceFetcher>,
    client: reqwest::Client,
}

impl JudgeBackend {
    pub const NAME: &'static str = "Judge";

    pub fn new(
        language: impl Into<String>,
        language_id: u32,
        config: JudgeConfig,
        credential: Option<Credential>,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> Self {
        Self {
            language: language.into(),
            language_id,
            config,
            credential,
            fetcher,
            client: reqwest::Client::new(),
        }
    }

    /// Use an existing HTTP client
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Judge language id submissions are sent with
    pub fn language_id(&self) -> u32 {
        self.language_id
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = builder;
        if let Some(ref key) = self.config.api_key {
            builder = builder.header("X-RapidAPI-Key", key);
        }
        if let Some(ref host) = self.config.api_host {
            builder = builder.header("X-RapidAPI-Host", host);
        }
        builder
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.url.trim_end_matches('/'))
    }

    /// Submit one test case and wait for its verdict
    #[instrument(skip(self, code, input, expected, cancel))]
    async fn judge(
        &self,
        code: &str,
        input: &str,
        expected: &str,
        cancel: &CancellationToken,
    ) -> Result<SubmissionResponse, JudgeError> {
        let submission = Submission {
            source_code: code,
            language_id: self.language_id,
            stdin: input,
            expected_output: expected,
        };

        let response = self
            .request(self.client.post(self.url("/submissions")))
            .json(&submission)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(JudgeError::Submit(response.status()));
        }
        let SubmissionToken { token } = response.json::<SubmissionToken>().await?;
        debug!(%token, "submission accepted");

        self.poll(&token, cancel).await
    }

    async fn poll(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<SubmissionResponse, JudgeError> {
        let url = self.url(&format!("/submissions/{token}"));

        for attempt in 1..=self.config.max_poll_attempts {
            let response = self.request(self.client.get(&url)).send().await?;
            if !response.status().is_success() {
                return Err(JudgeError::Poll(response.status()));
            }

            let result: SubmissionResponse = response.json().await?;
            if !JudgeVerdict::from_status_id(result.status.id).is_pending() {
                debug!(attempt, status = result.status.id, "submission finished");
                return Ok(result);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
                _ = cancel.cancelled() => return Err(JudgeError::Cancelled),
            }
        }

        Err(JudgeError::Timeout)
    }
}

impl std::fmt::Debug for JudgeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgeBackend")
            .field("language", &self.language)
            .field("language_id", &self.language_id)
            .field("config", &self.config)
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Backend for JudgeBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn is_available(&self) -> bool {
        self.credential.is_some()
    }

    fn requires_auth(&self) -> bool {
        true
    }

    #[instrument(skip(self, code, tests, cancel), fields(language = %self.language, tests = tests.len()))]
    async fn execute(
        &self,
        code: &str,
        tests: &[TestCase],
        cancel: &CancellationToken,
    ) -> Result<CodeExecutionResult, BackendError> {
        if !self.is_available() {
            return Err(BackendError::AuthRequired(self.language.clone()));
        }

        let mut test_results = Vec::with_capacity(tests.len());
        let mut outputs = Vec::with_capacity(tests.len());

        for test in tests {
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

            let outcome = if cancel.is_cancelled() {
                Err(JudgeError::Cancelled)
            } else {
                self.judge(code, &input, &expected, cancel).await
            };
            let outcome = match outcome {
                Ok(response) => JudgeOutcome::from_response(response),
                Err(e) => {
                    warn!(test = %test.description, error = %e, "judge exchange failed");
                    JudgeOutcome {
                        output: String::new(),
                        error: Some(e.to_string()),
                    }
                }
            };

            let result = match outcome.error {
                None => TestResult::evaluated(test, input, expected, outcome.output),
                Some(error) => TestResult::errored(test, input, expected, error),
            };
            outputs.push(result.actual.clone());
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
