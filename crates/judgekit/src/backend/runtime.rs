use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::backend::{Backend, BackendError};
use crate::evaluate::error_text;
use crate::runtime::RuntimeManager;
use crate::types::{CodeExecutionResult, TestCase, TestResult};

/// Backend running code on a local interpreter runtime
///
/// Available once the language's runtime has loaded. Never needs auth.
#[derive(Debug, Clone)]
pub struct RuntimeBackend {
    language: String,
    manager: Arc<RuntimeManager>,
}

impl RuntimeBackend {
    pub const NAME: &'static str = "Interpreter";

    pub fn new(language: impl Into<String>, manager: Arc<RuntimeManager>) -> Self {
        Self {
            language: language.into(),
            manager,
        }
    }
}

#[async_trait]
impl Backend for RuntimeBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn is_available(&self) -> bool {
        self.manager.is_loaded_sync(&self.language)
    }

    async fn is_available_async(&self) -> bool {
        self.manager.is_loaded(&self.language).await
    }

    fn requires_auth(&self) -> bool {
        false
    }

    #[instrument(skip(self, code, tests, cancel), fields(language = %self.language))]
    async fn execute(
        &self,
        code: &str,
        tests: &[TestCase],
        cancel: &CancellationToken,
    ) -> Result<CodeExecutionResult, BackendError> {
        if !self.manager.is_loaded(&self.language).await {
            return Err(BackendError::RuntimeUnavailable(self.language.clone()));
        }

        match self
            .manager
            .run_code(&self.language, code, tests, cancel)
            .await
        {
            Ok(result) => Ok(result),
            Err(e) => {
                // The runtime ran nothing; report every case as failed
                warn!(error = %e, "runtime execution failed");
                let message = e.to_string();
                Ok(CodeExecutionResult {
                    output: format!("Runtime execution failed: {message}"),
                    test_results: tests
                        .iter()
                        .map(|test| TestResult {
                            test_case: test.description.clone(),
                            expected: "Error".to_string(),
                            actual: error_text(&message),
                            passed: false,
                            input: String::new(),
                        })
                        .collect(),
                    execution_time: None,
                    backend: None,
                })
            }
        }
    }
}
