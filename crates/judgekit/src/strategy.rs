//! Ordered fallback across the backends of one language

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::backend::{Backend, BackendError, BackendStatus};
use crate::types::{CodeExecutionResult, TestCase};

/// Errors that occur when no backend produced a result
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("a strategy needs at least one backend")]
    NoBackends,

    #[error("No available backends for {0}")]
    NoBackendsAvailable(String),

    #[error("All backends failed for {language}: {last}")]
    AllBackendsFailed {
        language: String,
        #[source]
        last: BackendError,
    },

    #[error("Execution cancelled")]
    Cancelled,
}

/// Tries the backends of one language in registration order
///
/// The first available backend that succeeds serves the call. Which backend
/// that is gets decided again on every call.
#[derive(Debug)]
pub struct FallbackStrategy {
    language: String,
    backends: Vec<Arc<dyn Backend>>,
}

impl FallbackStrategy {
    pub fn new(
        language: impl Into<String>,
        backends: Vec<Arc<dyn Backend>>,
    ) -> Result<Self, StrategyError> {
        if backends.is_empty() {
            return Err(StrategyError::NoBackends);
        }
        Ok(Self {
            language: language.into(),
            backends,
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Whether any backend reports itself available right now
    pub fn is_available(&self) -> bool {
        self.backends.iter().any(|b| b.is_available())
    }

    /// Whether any backend is available once pending readiness work finishes
    pub async fn is_available_async(&self) -> bool {
        for backend in &self.backends {
            if backend.is_available_async().await {
                return true;
            }
        }
        false
    }

    /// Whether running this language needs an authenticated user
    ///
    /// False as soon as one currently available backend works without auth.
    /// With nothing available, true if any backend could be unlocked by auth.
    pub fn requires_auth(&self) -> bool {
        let available: Vec<_> = self.available_backends();
        if available.is_empty() {
            return self.backends.iter().any(|b| b.requires_auth());
        }
        available.iter().all(|b| b.requires_auth())
    }

    /// Run the code on the first backend that succeeds
    #[instrument(skip(self, code, tests, cancel), fields(language = %self.language))]
    pub async fn execute(
        &self,
        code: &str,
        tests: &[TestCase],
        cancel: &CancellationToken,
    ) -> Result<CodeExecutionResult, StrategyError> {
        let mut available = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            if backend.is_available_async().await {
                available.push(backend.clone());
            }
        }
        if available.is_empty() {
            return Err(StrategyError::NoBackendsAvailable(self.language.clone()));
        }

        let mut last_error = None;
        for backend in available {
            if cancel.is_cancelled() {
                return Err(StrategyError::Cancelled);
            }

            debug!(backend = backend.name(), "trying backend");
            match backend.execute(code, tests, cancel).await {
                Ok(mut result) => {
                    result.output.push_str(&format!(
                        "\n\n--- Executed using: {} ({}) ---",
                        self.language,
                        backend.name()
                    ));
                    result.backend = Some(backend.name().to_string());
                    return Ok(result);
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "backend failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(last) => Err(StrategyError::AllBackendsFailed {
                language: self.language.clone(),
                last,
            }),
            None => Err(StrategyError::NoBackendsAvailable(self.language.clone())),
        }
    }

    /// Append a backend to the end of the chain
    pub fn add_backend(&mut self, backend: Arc<dyn Backend>) {
        self.backends.push(backend);
    }

    /// Insert a backend at `index`, clamped to the end of the chain
    pub fn insert_backend(&mut self, index: usize, backend: Arc<dyn Backend>) {
        let index = index.min(self.backends.len());
        self.backends.insert(index, backend);
    }

    /// Remove a backend by identity, returning whether it was registered
    ///
    /// The last backend cannot be removed.
    pub fn remove_backend(&mut self, backend: &Arc<dyn Backend>) -> bool {
        if self.backends.len() <= 1 {
            return false;
        }
        let before = self.backends.len();
        self.backends.retain(|b| !Arc::ptr_eq(b, backend));
        self.backends.len() != before
    }

    /// Status of every backend in chain order
    pub fn backend_status(&self) -> Vec<BackendStatus> {
        self.backends.iter().map(|b| b.status()).collect()
    }

    /// The backend a call would try first, by cached availability
    pub fn first_available_backend(&self) -> Option<Arc<dyn Backend>> {
        self.backends.iter().find(|b| b.is_available()).cloned()
    }

    /// Backends that are available right now, in chain order
    pub fn available_backends(&self) -> Vec<Arc<dyn Backend>> {
        self.backends
            .iter()
            .filter(|b| b.is_available())
            .cloned()
            .collect()
    }

    /// Every backend in chain order
    pub fn all_backends(&self) -> &[Arc<dyn Backend>] {
        &self.backends
    }
}
