//! Registry of runtimes keyed by language

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::fetch::{ResourceFetcher, ResourceLoader};
use crate::runtime::{InterpreterRuntime, Runtime, RuntimeError, RuntimeStatus};
use crate::types::{CodeExecutionResult, TestCase};

static GLOBAL: OnceLock<Arc<RuntimeManager>> = OnceLock::new();

/// Registry of language runtimes
///
/// Loading is explicit: `run_code` refuses to run a language whose runtime
/// has not finished loading.
#[derive(Debug, Default)]
pub struct RuntimeManager {
    runtimes: RwLock<HashMap<String, Arc<dyn Runtime>>>,
}

impl RuntimeManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager with an interpreter runtime for every configured language
    pub fn from_config(config: &Config, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        let manager = Self::new();
        for (id, language) in &config.languages {
            if let Some(ref runtime) = language.runtime {
                manager.add_runtime(Arc::new(InterpreterRuntime::new(
                    id.clone(),
                    runtime.clone(),
                    &config.default_limits,
                    fetcher.clone(),
                )));
            }
        }
        manager
    }

    /// Process-wide manager built from the default configuration
    ///
    /// Shared by every service that is not given its own manager, so each
    /// interpreter is only discovered once per process.
    pub fn global() -> Arc<RuntimeManager> {
        GLOBAL
            .get_or_init(|| {
                let config = Config::default();
                let fetcher = Arc::new(ResourceLoader::new(config.resource_root.clone()));
                Arc::new(Self::from_config(&config, fetcher))
            })
            .clone()
    }

    /// Register a runtime, replacing any runtime for the same language
    pub fn add_runtime(&self, runtime: Arc<dyn Runtime>) {
        let language = runtime.language().to_string();
        debug!(%language, "registering runtime");
        self.runtimes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(language, runtime);
    }

    /// Unregister the runtime for a language
    pub fn remove_runtime(&self, language: &str) -> Option<Arc<dyn Runtime>> {
        self.runtimes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(language)
    }

    /// Get the runtime for a language
    pub fn get(&self, language: &str) -> Option<Arc<dyn Runtime>> {
        self.runtimes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(language)
            .cloned()
    }

    /// Check if a runtime is registered for a language
    pub fn supports(&self, language: &str) -> bool {
        self.get(language).is_some()
    }

    /// Registered languages in sorted order
    pub fn supported_languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self
            .runtimes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        languages.sort_unstable();
        languages
    }

    /// Whether the language's runtime is loaded, waiting for an in-flight load
    pub async fn is_loaded(&self, language: &str) -> bool {
        match self.get(language) {
            Some(runtime) => runtime.wait_loaded().await,
            None => false,
        }
    }

    /// Whether the language's runtime is loaded right now
    pub fn is_loaded_sync(&self, language: &str) -> bool {
        self.get(language).is_some_and(|runtime| runtime.is_loaded())
    }

    /// Load the runtime for a language
    pub async fn load(&self, language: &str) -> Result<(), RuntimeError> {
        let runtime = self
            .get(language)
            .ok_or_else(|| RuntimeError::UnsupportedLanguage(language.to_string()))?;
        runtime.load().await
    }

    /// Load every registered runtime in parallel
    ///
    /// Failures are logged and do not stop the other loads.
    #[instrument(skip(self))]
    pub async fn load_all(&self) {
        let runtimes: Vec<Arc<dyn Runtime>> = self
            .runtimes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let loads = runtimes.iter().map(|runtime| async move {
            (runtime.language().to_string(), runtime.load().await)
        });
        for (language, result) in futures::future::join_all(loads).await {
            match result {
                Ok(()) => info!(%language, "runtime ready"),
                Err(e) => warn!(%language, error = %e, "failed to load runtime"),
            }
        }
    }

    /// Run code on a loaded runtime
    pub async fn run_code(
        &self,
        language: &str,
        code: &str,
        tests: &[TestCase],
        cancel: &CancellationToken,
    ) -> Result<CodeExecutionResult, RuntimeError> {
        let runtime = self
            .get(language)
            .ok_or_else(|| RuntimeError::UnsupportedLanguage(language.to_string()))?;
        if !runtime.is_loaded() {
            return Err(RuntimeError::NotLoaded(language.to_string()));
        }
        runtime.execute(code, tests, cancel).await
    }

    /// Load state of every registered runtime, sorted by language
    pub fn runtime_status(&self) -> Vec<RuntimeStatus> {
        let mut status: Vec<RuntimeStatus> = self
            .runtimes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|runtime| runtime.status())
            .collect();
        status.sort_by(|a, b| a.language.cmp(&b.language));
        status
    }
}
