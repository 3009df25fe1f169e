//! Local interpreter runtimes
//!
//! A [`Runtime`] executes code for one language. It is loaded once
//! (interpreter discovery), then runs each test case in a fresh interpreter
//! process. The [`RuntimeManager`] keeps one runtime per language.

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use crate::runtime::interpreter::InterpreterRuntime;
pub use crate::runtime::manager::RuntimeManager;
pub use crate::runtime::process::{ProgramOutput, ProgramStatus, run_program};
use crate::types::{CodeExecutionResult, TestCase};

mod interpreter;
mod manager;
mod process;

/// Errors that occur while loading or running a runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("{0} runtime is not loaded")]
    NotLoaded(String),

    #[error("failed to load {language} runtime: {message}")]
    LoadFailed { language: String, message: String },

    #[error("command '{0}' not found in PATH")]
    CommandNotFound(String),

    #[error("empty command")]
    EmptyCommand,

    #[error("failed to spawn interpreter: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("runtime slot pool closed")]
    PoolClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Snapshot of a runtime's load state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeStatus {
    pub language: String,
    pub loaded: bool,
    pub version: Option<String>,
}

/// An execution engine for one language
#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    /// Language this runtime executes
    fn language(&self) -> &str;

    /// Whether loading has completed successfully (non-blocking)
    fn is_loaded(&self) -> bool;

    /// Wait for an in-flight load, if any, then report whether the runtime is loaded
    ///
    /// Never starts a load.
    async fn wait_loaded(&self) -> bool;

    /// Load the runtime
    ///
    /// Idempotent. Concurrent callers share one load, and a failed load is
    /// reported to every caller, now and later.
    async fn load(&self) -> Result<(), RuntimeError>;

    /// Engine version discovered while loading
    fn version(&self) -> Option<String> {
        None
    }

    /// Run `code` against each test case in order
    ///
    /// Per-case failures become failed results; an `Err` means nothing ran.
    async fn execute(
        &self,
        code: &str,
        tests: &[TestCase],
        cancel: &CancellationToken,
    ) -> Result<CodeExecutionResult, RuntimeError>;

    fn status(&self) -> RuntimeStatus {
        RuntimeStatus {
            language: self.language().to_string(),
            loaded: self.is_loaded(),
            version: self.version(),
        }
    }
}

/// Resolve the program in a command to an absolute path using the host's PATH.
///
/// Runs are started with a cleared environment, so the interpreter is
/// resolved once up front. Commands that already contain a `/` (like
/// `./run` or `/usr/bin/python3`) are left unchanged.
pub fn resolve_command(command: &mut [String]) -> Result<(), RuntimeError> {
    let first = match command.first_mut() {
        Some(first) => first,
        None => return Err(RuntimeError::EmptyCommand),
    };

    // Already an absolute or relative path
    if first.contains('/') {
        return Ok(());
    }

    let path_var = std::env::var("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path_var) {
        let candidate = Path::new(&dir).join(&*first);
        if candidate.is_file() {
            *first = candidate.to_string_lossy().into_owned();
            return Ok(());
        }
    }

    Err(RuntimeError::CommandNotFound(first.clone()))
}
