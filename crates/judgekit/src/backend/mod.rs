//! Execution backends
//!
//! A backend is one way of running code for a language: a local interpreter
//! runtime ([`RuntimeBackend`]) or the remote judge ([`JudgeBackend`]).

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use crate::backend::judge::{JudgeBackend, JudgeVerdict, RuntimeErrorKind};
pub use crate::backend::runtime::RuntimeBackend;
use crate::runtime::RuntimeError;
use crate::types::{CodeExecutionResult, TestCase};

mod judge;
mod runtime;

/// Errors that make a backend unable to produce a result at all
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0} runtime is not loaded")]
    RuntimeUnavailable(String),

    #[error("Authentication required for {0} execution")]
    AuthRequired(String),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("{0}")]
    Failed(String),
}

/// Availability summary of a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    pub name: String,
    pub language: String,
    pub is_available: bool,
    pub requires_auth: bool,
}

/// A mechanism that runs code against test cases for one language
#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Short name used in logs and result annotations
    fn name(&self) -> &str;

    /// Language this backend executes
    fn language(&self) -> &str;

    /// Best-effort availability from cached state
    fn is_available(&self) -> bool;

    /// Availability after waiting for any pending readiness work
    async fn is_available_async(&self) -> bool {
        self.is_available()
    }

    /// Whether the backend needs an authenticated user
    fn requires_auth(&self) -> bool;

    /// Run `code` against `tests`
    ///
    /// Returns one result per test case in order. Per-case problems are
    /// reported inside the results; an `Err` means the backend could not run.
    async fn execute(
        &self,
        code: &str,
        tests: &[TestCase],
        cancel: &CancellationToken,
    ) -> Result<CodeExecutionResult, BackendError>;

    fn status(&self) -> BackendStatus {
        BackendStatus {
            name: self.name().to_string(),
            language: self.language().to_string(),
            is_available: self.is_available(),
            requires_auth: self.requires_auth(),
        }
    }
}
