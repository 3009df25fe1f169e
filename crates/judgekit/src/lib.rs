//! A library for judging code against test cases.
//!
//! Judgekit runs learner-submitted code for a language through an ordered
//! chain of execution backends and reports a verdict per test case. Local
//! interpreter runtimes are tried first; the remote judge serves languages
//! without a local interpreter, or takes over when the interpreter fails.
//!
//! # Features
//!
//! - **Fallback execution** — Per-language chains of backends, re-probed on every call.
//! - **Interpreter runtimes** — Lazily discovered interpreters, one fresh process per test case.
//! - **Remote judge** — Submit-and-poll client for a Judge0-compatible service.
//! - **Submissions** — Full evaluations recorded with pass counts and an overall status.
//! - **TOML configuration** — Per-language runtime and judge settings with env overrides.

pub use auth::Credential;
pub use backend::{Backend, BackendError, BackendStatus, JudgeBackend, RuntimeBackend};
pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Language};
pub use fetch::{FetchError, MemoryFetcher, ResourceFetcher, ResourceLoader};
pub use runtime::{InterpreterRuntime, Runtime, RuntimeError, RuntimeManager, RuntimeStatus};
pub use service::{ExecutionError, ExecutionService, ExecutionServiceBuilder, LanguageStatus};
pub use strategy::{FallbackStrategy, StrategyError};
pub use submission::{
    DirectorySubmissionStore, MemorySubmissionStore, OverallStatus, SubmissionError,
    SubmissionResult, SubmissionStore,
};
pub use types::{CodeExecutionResult, ExecutionMode, ResourceLimits, TestCase, TestResult};

pub mod auth;
pub mod backend;
pub mod config;
pub mod evaluate;
pub mod fetch;
pub mod runtime;
pub mod service;
pub mod strategy;
pub mod submission;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;
