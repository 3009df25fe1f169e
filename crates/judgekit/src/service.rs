//! Top-level entry point for running and submitting code

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::auth::Credential;
use crate::backend::{Backend, BackendStatus, JudgeBackend, RuntimeBackend};
use crate::config::Config;
use crate::fetch::{ResourceFetcher, ResourceLoader};
use crate::runtime::{RuntimeManager, RuntimeStatus};
use crate::strategy::{FallbackStrategy, StrategyError};
use crate::submission::{
    MemorySubmissionStore, SubmissionError, SubmissionResult, SubmissionStore,
};
use crate::types::{CodeExecutionResult, ExecutionMode, TestCase};

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Language {0} is not available")]
    LanguageUnavailable(String),

    #[error("no execution backends configured for {0}")]
    NoBackends(String),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to save submission: {0}")]
    Submission(#[from] SubmissionError),
}

/// Availability summary of a language
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageStatus {
    pub available: bool,
    pub requires_auth: bool,
    pub backends: Vec<BackendStatus>,
}

/// Runs code for every configured language through its fallback chain
///
/// Build one per authenticated session: the credential decides which
/// backends are usable.
#[derive(Debug)]
pub struct ExecutionService {
    config: Config,
    credential: Option<Credential>,
    strategies: HashMap<String, FallbackStrategy>,
    runtime_manager: Arc<RuntimeManager>,
    submission_store: Arc<dyn SubmissionStore>,
}

/// Builder for [`ExecutionService`]
#[derive(Debug)]
pub struct ExecutionServiceBuilder {
    config: Config,
    credential: Option<Credential>,
    runtime_manager: Option<Arc<RuntimeManager>>,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
    submission_store: Option<Arc<dyn SubmissionStore>>,
}

impl ExecutionServiceBuilder {
    /// Authenticated user, unlocking the remote judge
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Runtime registry to use instead of the process-wide one
    pub fn runtime_manager(mut self, manager: Arc<RuntimeManager>) -> Self {
        self.runtime_manager = Some(manager);
        self
    }

    /// Source of test case text for the judge backends
    pub fn fetcher(mut self, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Where submissions are persisted; in memory if not set
    pub fn submission_store(mut self, store: Arc<dyn SubmissionStore>) -> Self {
        self.submission_store = Some(store);
        self
    }

    /// Build a fallback chain for every configured language
    ///
    /// Each chain tries the interpreter runtime first, then the judge.
    pub fn build(self) -> Result<ExecutionService, ExecutionError> {
        let runtime_manager = self.runtime_manager.unwrap_or_else(RuntimeManager::global);
        let fetcher = self.fetcher.unwrap_or_else(|| {
            Arc::new(ResourceLoader::new(self.config.resource_root.clone()))
        });
        let submission_store = self
            .submission_store
            .unwrap_or_else(|| Arc::new(MemorySubmissionStore::new()));

        let mut service = ExecutionService {
            config: self.config,
            credential: self.credential,
            strategies: HashMap::new(),
            runtime_manager,
            submission_store,
        };

        let mut chains = Vec::new();
        for id in service.config.language_ids() {
            let language = &service.config.languages[id];
            let mut backends: Vec<Arc<dyn Backend>> = Vec::new();
            if language.has_runtime() {
                backends.push(Arc::new(RuntimeBackend::new(
                    id,
                    service.runtime_manager.clone(),
                )));
            }
            if let Some(judge_id) = language.judge_id {
                backends.push(Arc::new(JudgeBackend::new(
                    id,
                    judge_id,
                    service.config.judge.clone(),
                    service.credential.clone(),
                    fetcher.clone(),
                )));
            }
            chains.push((id.to_string(), backends));
        }

        for (language, backends) in chains {
            service.register(language, backends)?;
        }
        debug!(languages = service.strategies.len(), "execution service ready");
        Ok(service)
    }
}

impl ExecutionService {
    pub fn builder(config: Config) -> ExecutionServiceBuilder {
        ExecutionServiceBuilder {
            config,
            credential: None,
            runtime_manager: None,
            fetcher: None,
            submission_store: None,
        }
    }

    /// Add or replace the fallback chain of a language
    pub fn register(
        &mut self,
        language: impl Into<String>,
        backends: Vec<Arc<dyn Backend>>,
    ) -> Result<(), ExecutionError> {
        let language = language.into();
        let strategy = FallbackStrategy::new(language.clone(), backends)
            .map_err(|_| ExecutionError::NoBackends(language.clone()))?;
        self.strategies.insert(language, strategy);
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn submission_store(&self) -> &Arc<dyn SubmissionStore> {
        &self.submission_store
    }

    /// Mode used when the caller does not pick one
    pub fn default_mode(&self) -> ExecutionMode {
        ExecutionMode::run(self.config.execution.default_test_case_limit)
    }

    /// Fallback chain of a language
    pub fn strategy(&self, language: &str) -> Option<&FallbackStrategy> {
        self.strategies.get(language)
    }

    /// Run `code` against `tests` and format a report
    pub async fn execute_code(
        &self,
        code: &str,
        tests: &[TestCase],
        language: &str,
        mode: ExecutionMode,
    ) -> Result<CodeExecutionResult, ExecutionError> {
        self.execute_code_with_cancel(code, tests, language, mode, &CancellationToken::new())
            .await
    }

    /// Like [`execute_code`](Self::execute_code), stopping early when `cancel` fires
    #[instrument(skip(self, code, tests, cancel), fields(tests = tests.len()))]
    pub async fn execute_code_with_cancel(
        &self,
        code: &str,
        tests: &[TestCase],
        language: &str,
        mode: ExecutionMode,
        cancel: &CancellationToken,
    ) -> Result<CodeExecutionResult, ExecutionError> {
        let strategy = self
            .strategies
            .get(language)
            .ok_or_else(|| ExecutionError::UnsupportedLanguage(language.to_string()))?;

        if !strategy.is_available_async().await {
            return Err(ExecutionError::LanguageUnavailable(language.to_string()));
        }

        let tests = match mode.test_case_limit() {
            Some(limit) => &tests[..limit.min(tests.len())],
            None => tests,
        };

        let start = Instant::now();
        let cancel = cancel.child_token();
        let mut result = match self.config.execution.timeout() {
            Some(timeout) => {
                match tokio::time::timeout(timeout, strategy.execute(code, tests, &cancel)).await {
                    Ok(result) => result?,
                    Err(_) => {
                        cancel.cancel();
                        warn!(?timeout, "execution timed out");
                        return Err(ExecutionError::Timeout(timeout));
                    }
                }
            }
            None => strategy.execute(code, tests, &cancel).await?,
        };
        let elapsed = start.elapsed().as_millis() as u64;

        result.output = format_output(&result, mode);
        result.execution_time = Some(elapsed);
        info!(
            passed = result.passed_count(),
            total = result.total_count(),
            backend = result.backend.as_deref().unwrap_or("unknown"),
            elapsed_ms = elapsed,
            "execution finished"
        );
        Ok(result)
    }

    /// Evaluate every test case and persist the outcome as a submission
    #[instrument(skip(self, code, tests), fields(tests = tests.len()))]
    pub async fn execute_and_submit(
        &self,
        code: &str,
        tests: &[TestCase],
        language: &str,
        question_id: &str,
    ) -> Result<(CodeExecutionResult, SubmissionResult), ExecutionError> {
        let start = Instant::now();
        let mut result = self
            .execute_code(code, tests, language, ExecutionMode::submit())
            .await?;
        let elapsed = start.elapsed().as_millis() as u64;
        result.execution_time = Some(elapsed);

        let mut submission = SubmissionResult::from_results(
            question_id,
            language,
            code,
            result.test_results.clone(),
            elapsed,
        );
        if let Some(ref credential) = self.credential {
            submission = submission.with_user(credential.user_id());
        }

        self.submission_store.save(&submission).await?;
        info!(id = %submission.id, status = %submission.overall_status, "submission saved");
        Ok((result, submission))
    }

    /// Whether any backend of the language is available right now
    pub fn is_language_available(&self, language: &str) -> bool {
        self.strategies
            .get(language)
            .is_some_and(FallbackStrategy::is_available)
    }

    /// Whether the language is available once pending runtime loads finish
    pub async fn is_language_available_async(&self, language: &str) -> bool {
        match self.strategies.get(language) {
            Some(strategy) => strategy.is_available_async().await,
            None => false,
        }
    }

    /// Whether running the language needs an authenticated user
    pub fn requires_auth(&self, language: &str) -> bool {
        self.strategies
            .get(language)
            .is_some_and(FallbackStrategy::requires_auth)
    }

    /// Languages with a fallback chain, sorted
    pub fn supported_languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self.strategies.keys().cloned().collect();
        languages.sort_unstable();
        languages
    }

    /// Availability of every language and its backends
    pub fn language_status(&self) -> BTreeMap<String, LanguageStatus> {
        self.strategies
            .iter()
            .map(|(language, strategy)| {
                let status = LanguageStatus {
                    available: strategy.is_available(),
                    requires_auth: strategy.requires_auth(),
                    backends: strategy.backend_status(),
                };
                (language.clone(), status)
            })
            .collect()
    }

    pub fn runtime_status(&self) -> Vec<RuntimeStatus> {
        self.runtime_manager.runtime_status()
    }

    /// Load every interpreter runtime; failures are logged and skipped
    pub async fn load_runtimes(&self) {
        self.runtime_manager.load_all().await;
    }
}

fn format_output(result: &CodeExecutionResult, mode: ExecutionMode) -> String {
    let title = if mode.is_submit() {
        "Full Evaluation Results"
    } else {
        "Sample Test Results"
    };
    let lines: Vec<String> = result
        .test_results
        .iter()
        .map(|r| {
            let mark = if r.passed { "✅" } else { "❌" };
            format!("{mark} {}", r.test_case)
        })
        .collect();

    format!(
        "{title} ({}/{} passed):\n{}\n\n{}",
        result.passed_count(),
        result.total_count(),
        lines.join("\n"),
        result.output
    )
}
