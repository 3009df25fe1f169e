//! Process spawning and I/O for interpreter runs
//!
//! Runs one command with the test input on stdin, captures bounded stdout and
//! stderr, and kills the process on timeout or cancellation.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::runtime::RuntimeError;
use crate::types::ResourceLimits;

/// How a program run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramStatus {
    /// The process exited on its own (None when killed by a signal)
    Exited(Option<i32>),

    /// The wall time limit was reached and the process was killed
    TimedOut,

    /// Output exceeded the configured cap
    OutputLimitExceeded,

    /// The run was cancelled and the process was killed
    Cancelled,
}

/// Captured result of a program run
#[derive(Debug, Clone)]
pub struct ProgramOutput {
    pub status: ProgramStatus,
    pub stdout: String,
    pub stderr: String,
    pub wall_time: Duration,
}

impl ProgramOutput {
    /// Check if the program exited with code 0
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ProgramStatus::Exited(Some(0))
    }

    /// Last non-empty line of stderr, where interpreters put the error summary
    pub fn error_summary(&self) -> Option<&str> {
        self.stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
    }
}

enum Interrupt {
    TimedOut,
    Cancelled,
}

/// Run a command with `stdin_data` as input
///
/// The child starts with a cleared environment except for `PATH` and `env`,
/// in `working_dir`. It is killed when the wall time limit passes, when
/// `cancel` fires, or when this future is dropped.
#[instrument(skip(env, stdin_data, cancel))]
pub async fn run_program(
    command: &[String],
    working_dir: &Path,
    env: &HashMap<String, String>,
    stdin_data: &[u8],
    limits: &ResourceLimits,
    cancel: &CancellationToken,
) -> Result<ProgramOutput, RuntimeError> {
    let (program, args) = command.split_first().ok_or(RuntimeError::EmptyCommand)?;
    let max_output = limits.max_output_bytes();
    let wall_time = limits.wall_time();

    let mut child = Command::new(program)
        .args(args)
        .current_dir(working_dir)
        .env_clear()
        .env("PATH", std::env::var("PATH").unwrap_or_default())
        .envs(env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(RuntimeError::SpawnFailed)?;

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let started = tokio::time::Instant::now();

    let run = async {
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // The program may exit without reading its input
                if let Err(e) = stdin.write_all(stdin_data).await {
                    debug!(error = %e, "stdin closed early");
                }
            }
        };
        let ((), stdout, stderr) = tokio::join!(
            feed,
            read_capped(stdout, max_output),
            read_capped(stderr, max_output)
        );
        let status = child.wait().await?;
        Ok::<_, std::io::Error>((status, stdout?, stderr?))
    };

    let outcome = tokio::select! {
        result = run => Ok(result?),
        _ = tokio::time::sleep(wall_time) => Err(Interrupt::TimedOut),
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
    };
    let elapsed = started.elapsed();

    let output = match outcome {
        Ok((status, (stdout, stdout_exceeded), (stderr, stderr_exceeded))) => {
            let status = if stdout_exceeded || stderr_exceeded {
                ProgramStatus::OutputLimitExceeded
            } else {
                ProgramStatus::Exited(status.code())
            };
            ProgramOutput {
                status,
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                wall_time: elapsed,
            }
        }
        Err(interrupt) => {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill interpreter process");
            }
            let status = match interrupt {
                Interrupt::TimedOut => ProgramStatus::TimedOut,
                Interrupt::Cancelled => ProgramStatus::Cancelled,
            };
            ProgramOutput {
                status,
                stdout: String::new(),
                stderr: String::new(),
                wall_time: elapsed,
            }
        }
    };

    debug!(
        status = ?output.status,
        wall_time = format_args!("{:.3}s", output.wall_time.as_secs_f64()),
        stdout_len = output.stdout.len(),
        "program finished"
    );

    Ok(output)
}

/// Read a stream to its end, keeping at most `limit` bytes
///
/// Stops reading (and closes the pipe) once the limit is passed, so a runaway
/// writer gets a broken pipe instead of blocking forever.
async fn read_capped<R>(reader: Option<R>, limit: usize) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok((Vec::new(), false));
    };

    let mut buf = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut buf)
        .await?;

    let exceeded = buf.len() > limit;
    buf.truncate(limit);
    Ok((buf, exceeded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    async fn run(script: &str, input: &[u8], limits: ResourceLimits) -> ProgramOutput {
        let dir = tempfile::tempdir().unwrap();
        run_program(
            &sh(script),
            dir.path(),
            &HashMap::new(),
            input,
            &limits,
            &CancellationToken::new(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn echoes_stdin() {
        let output = run("cat", b"hello\n", ResourceLimits::default()).await;
        assert!(output.is_success());
        assert_eq!(output.stdout, "hello\n");
    }

    #[tokio::test]
    async fn reports_exit_code_and_stderr() {
        let output = run(
            "echo partial; echo 'Traceback' >&2; echo 'ValueError: bad' >&2; exit 3",
            b"",
            ResourceLimits::default(),
        )
        .await;
        assert_eq!(output.status, ProgramStatus::Exited(Some(3)));
        assert_eq!(output.stdout, "partial\n");
        assert_eq!(output.error_summary(), Some("ValueError: bad"));
    }

    #[tokio::test]
    async fn kills_on_wall_time_limit() {
        let limits = ResourceLimits::new().with_wall_time_limit(0.2);
        let output = run("sleep 5", b"", limits).await;
        assert_eq!(output.status, ProgramStatus::TimedOut);
        assert!(output.wall_time < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn caps_output() {
        let limits = ResourceLimits::new().with_max_output(1);
        let output = run("yes", b"", limits.with_wall_time_limit(5.0)).await;
        assert_eq!(output.status, ProgramStatus::OutputLimitExceeded);
        assert!(output.stdout.len() <= 1024);
    }

    #[tokio::test]
    async fn cancellation_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let output = run_program(
            &sh("sleep 5"),
            dir.path(),
            &HashMap::new(),
            b"",
            &ResourceLimits::default(),
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(output.status, ProgramStatus::Cancelled);
    }

    #[tokio::test]
    async fn environment_is_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = HashMap::new();
        env.insert("JUDGEKIT_TEST_VAR".to_string(), "visible".to_string());

        let output = run_program(
            &sh("echo \"$JUDGEKIT_TEST_VAR:${HOME:-unset}\""),
            dir.path(),
            &env,
            b"",
            &ResourceLimits::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(output.stdout.trim(), "visible:unset");
    }

    #[tokio::test]
    async fn spawn_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_program(
            &["/nonexistent/interpreter".to_string()],
            dir.path(),
            &HashMap::new(),
            b"",
            &ResourceLimits::default(),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(RuntimeError::SpawnFailed(_))));
    }
}
