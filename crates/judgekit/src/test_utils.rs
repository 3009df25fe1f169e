//! Shared test doubles: a scripted judge server and stub backends

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, BackendError};
use crate::types::{CodeExecutionResult, TestCase, TestResult};

#[derive(Clone, Default)]
struct MockJudgeState {
    /// Poll responses, served in order; an empty queue answers 503
    polls: Arc<Mutex<VecDeque<Value>>>,
    poll_count: Arc<AtomicUsize>,
    submissions: Arc<Mutex<Vec<Value>>>,
    api_keys: Arc<Mutex<Vec<String>>>,
    reject: Arc<AtomicBool>,
}

async fn create_submission(
    State(state): State<MockJudgeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if state.reject.load(Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    if let Some(key) = headers.get("x-rapidapi-key").and_then(|v| v.to_str().ok()) {
        state.api_keys.lock().unwrap().push(key.to_string());
    }
    let mut submissions = state.submissions.lock().unwrap();
    submissions.push(body);
    Ok(Json(json!({ "token": format!("token-{}", submissions.len()) })))
}

async fn get_submission(
    State(state): State<MockJudgeState>,
    Path(_token): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    state.poll_count.fetch_add(1, Ordering::SeqCst);
    match state.polls.lock().unwrap().pop_front() {
        Some(response) => Ok(Json(response)),
        None => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

/// In-process judge server replaying scripted poll responses
pub(crate) struct MockJudge {
    addr: SocketAddr,
    state: MockJudgeState,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl MockJudge {
    pub(crate) async fn start(polls: Vec<Value>) -> Self {
        let state = MockJudgeState {
            polls: Arc::new(Mutex::new(VecDeque::from(polls))),
            ..Default::default()
        };

        let app = Router::new()
            .route("/submissions", post(create_submission))
            .route("/submissions/{token}", get(get_submission))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock judge");
        let addr = listener.local_addr().expect("mock judge has no address");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .ok();
        });

        Self {
            addr,
            state,
            shutdown_tx,
        }
    }

    pub(crate) fn address(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answer every following submission with a 500
    pub(crate) fn reject_submissions(&self) {
        self.state.reject.store(true, Ordering::SeqCst);
    }

    pub(crate) fn polls(&self) -> usize {
        self.state.poll_count.load(Ordering::SeqCst)
    }

    pub(crate) fn submissions(&self) -> Vec<Value> {
        self.state.submissions.lock().unwrap().clone()
    }

    pub(crate) fn api_keys(&self) -> Vec<String> {
        self.state.api_keys.lock().unwrap().clone()
    }

    pub(crate) async fn shutdown(self) {
        self.shutdown_tx.send(()).ok();
    }
}

/// Backend with scripted availability and outcome
#[derive(Debug)]
pub(crate) struct StubBackend {
    name: String,
    language: String,
    available: bool,
    requires_auth: bool,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_cancel: Mutex<Option<CancellationToken>>,
}

impl StubBackend {
    /// An available backend whose every case passes
    pub(crate) fn passing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            language: "python".to_string(),
            available: true,
            requires_auth: false,
            fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
            last_cancel: Mutex::new(None),
        }
    }

    /// An available backend whose execute call errors
    pub(crate) fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::passing(name)
        }
    }

    pub(crate) fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub(crate) fn with_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// Sleep before answering, giving up early when cancelled
    pub(crate) fn sleeping(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn for_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Token handed to the most recent execute call
    pub(crate) fn last_cancel(&self) -> Option<CancellationToken> {
        self.last_cancel.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for StubBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    async fn execute(
        &self,
        _code: &str,
        tests: &[TestCase],
        cancel: &CancellationToken,
    ) -> Result<CodeExecutionResult, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_cancel.lock().unwrap() = Some(cancel.clone());
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    return Err(BackendError::Failed(format!("{} cancelled", self.name)));
                }
            }
        }
        if self.fail {
            return Err(BackendError::Failed(format!("{} exploded", self.name)));
        }
        Ok(CodeExecutionResult {
            output: format!("{} output", self.name),
            test_results: tests
                .iter()
                .map(|t| TestResult::evaluated(t, String::new(), "ok".into(), "ok".into()))
                .collect(),
            execution_time: None,
            backend: None,
        })
    }
}
