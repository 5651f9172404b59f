//! Deployment executor
//!
//! Resolves a template into a shell command, runs it under a time budget and
//! reports the outcome. Each attempt runs in its own task; attempts never
//! wait on one another.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn, Instrument};

use crate::deploy::attempt::{DeployAttempt, Outcome};
use crate::report::audit::{AuditNotice, AuditStatus};
use crate::report::messages;
use crate::report::reporter::StatusReporter;

pub const LOCATION_PLACEHOLDER: &str = "${LOCATION}";
pub const BRANCH_PLACEHOLDER: &str = "${BRANCH}";

/// How long output is still collected once the command has exited or been killed
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Executor options
#[derive(Debug, Clone)]
pub struct Options {
    /// Execution budget per attempt
    pub timeout: Duration,

    /// Shell used as `<shell> -c <command>`
    pub shell: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120), // 2 minutes
            shell: "bash".to_string(),
        }
    }
}

/// Substitute every placeholder in a template
pub fn resolve_template(template: &str, location: &str, branch: &str) -> String {
    template
        .replace(LOCATION_PLACEHOLDER, location)
        .replace(BRANCH_PLACEHOLDER, branch)
}

/// How a command run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Exit code 0
    Succeeded,
    /// Non-zero exit; `None` when killed by a signal
    Exited(Option<i32>),
    /// Budget expired and the process was killed
    TimedOut(Duration),
    /// The shell could not be started
    SpawnFailed(String),
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Succeeded => write!(f, "exit status 0"),
            ExecutionStatus::Exited(Some(code)) => write!(f, "exit status {}", code),
            ExecutionStatus::Exited(None) => write!(f, "terminated by signal"),
            ExecutionStatus::TimedOut(budget) => write!(f, "timed out after {:?}", budget),
            ExecutionStatus::SpawnFailed(e) => write!(f, "failed to start: {}", e),
        }
    }
}

/// Result of running a command
#[derive(Debug, Clone)]
pub struct Execution {
    pub status: ExecutionStatus,
    /// stdout and stderr interleaved as written; partial on timeout
    pub output: String,
}

impl Execution {
    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }
}

/// Runs a resolved command line
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, timeout: Duration) -> Execution;
}

/// Runs commands through a shell subprocess
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self { shell: shell.into() }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, timeout: Duration) -> Execution {
        // stderr joins stdout so the captured lines keep their write order
        let script = format!("exec 2>&1\n{}", command);
        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                return Execution {
                    status: ExecutionStatus::SpawnFailed(e.to_string()),
                    output: String::new(),
                }
            }
        };

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(collect_output(stdout, buffer.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(collect_output(stderr, buffer.clone())));
        }

        let waited = tokio::time::timeout(timeout, child.wait()).await;
        let status = match waited {
            Ok(Ok(status)) if status.success() => ExecutionStatus::Succeeded,
            Ok(Ok(status)) => ExecutionStatus::Exited(status.code()),
            Ok(Err(e)) => ExecutionStatus::SpawnFailed(e.to_string()),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out command: {}", e);
                }
                ExecutionStatus::TimedOut(timeout)
            }
        };

        // Background processes started by the command can hold the pipe open
        for reader in readers {
            let abort = reader.abort_handle();
            if tokio::time::timeout(OUTPUT_DRAIN_GRACE, reader).await.is_err() {
                abort.abort();
            }
        }

        let output = String::from_utf8_lossy(&buffer.lock().await).into_owned();
        Execution { status, output }
    }
}

async fn collect_output<R>(mut pipe: R, buffer: Arc<Mutex<Vec<u8>>>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buffer.lock().await.extend_from_slice(&chunk[..n]),
            Err(e) => {
                debug!("Stopped reading command output: {}", e);
                break;
            }
        }
    }
}

/// Runs one attempt from acknowledgement to audit
#[derive(Clone)]
pub struct DeploymentExecutor {
    runner: Arc<dyn CommandRunner>,
    reporter: StatusReporter,
    options: Options,
    environment: String,
    canonical_branch: String,
}

impl DeploymentExecutor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        reporter: StatusReporter,
        options: Options,
        environment: impl Into<String>,
        canonical_branch: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            reporter,
            options,
            environment: environment.into(),
            canonical_branch: canonical_branch.into(),
        }
    }

    /// Run the attempt's command and report the result.
    ///
    /// `ack_id` is the "in progress" message to edit with the outcome.
    pub async fn execute(&self, mut attempt: DeployAttempt, ack_id: Option<String>) -> DeployAttempt {
        let span = tracing::info_span!("deploy", attempt = %attempt.id, key = %attempt.key);

        async move {
            let execution = self.runner.run(&attempt.command, self.options.timeout).await;

            let (status, content) = if execution.succeeded() {
                info!(
                    "Deployment succeeded: `{}` by {} ({})",
                    attempt.command,
                    attempt.author.tag,
                    attempt.author.id
                );
                record(attempt.succeed(execution.output));
                (
                    AuditStatus::Success,
                    messages::success(&attempt.branch, &self.canonical_branch, &attempt.key),
                )
            } else {
                error!(
                    "Deployment failed: `{}` by {} ({}): {}\n{}",
                    attempt.command,
                    attempt.author.tag,
                    attempt.author.id,
                    execution.status,
                    execution.output
                );
                let error = execution.status.to_string();
                let content = messages::failure(&error, &execution.output);
                record(attempt.fail(error, execution.output));
                (AuditStatus::Failed, content)
            };

            self.reporter
                .edit_or_reply(&attempt.channel_id, ack_id.as_deref(), &content)
                .await;
            self.reporter
                .audit(AuditNotice {
                    status,
                    environment: self.environment.clone(),
                    branch: attempt.branch.clone(),
                    author: attempt.author.identity(),
                    timestamp: Utc::now(),
                })
                .await;

            debug_assert!(attempt.outcome() != Outcome::Pending);
            attempt
        }
        .instrument(span)
        .await
    }
}

fn record(result: Result<(), String>) {
    if let Err(e) = result {
        warn!("{}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_template_replaces_every_placeholder() {
        let resolved = resolve_template(
            "cd ${LOCATION} && git fetch && git checkout ${BRANCH} && ls ${LOCATION}",
            "/srv/app",
            "main",
        );
        assert_eq!(resolved, "cd /srv/app && git fetch && git checkout main && ls /srv/app");
    }

    #[test]
    fn test_resolve_template_without_placeholders() {
        assert_eq!(resolve_template("systemctl restart app", "/srv", "main"), "systemctl restart app");
    }

    #[test]
    fn test_execution_status_display() {
        assert_eq!(ExecutionStatus::Exited(Some(2)).to_string(), "exit status 2");
        assert_eq!(
            ExecutionStatus::TimedOut(Duration::from_secs(120)).to_string(),
            "timed out after 120s"
        );
    }

    #[tokio::test]
    async fn test_shell_runner_captures_output() {
        let runner = ShellRunner::new("bash");
        let execution = runner
            .run("echo out; echo err >&2", Duration::from_secs(10))
            .await;

        assert!(execution.succeeded());
        assert_eq!(execution.output, "out\nerr\n");
    }

    #[tokio::test]
    async fn test_shell_runner_non_zero_exit() {
        let runner = ShellRunner::new("bash");
        let execution = runner.run("echo nope; exit 3", Duration::from_secs(10)).await;

        assert_eq!(execution.status, ExecutionStatus::Exited(Some(3)));
        assert_eq!(execution.output, "nope\n");
    }

    #[tokio::test]
    async fn test_shell_runner_keeps_stream_order() {
        let runner = ShellRunner::new("bash");
        let execution = runner
            .run("echo a; echo b >&2; echo c; exit 1", Duration::from_secs(10))
            .await;

        assert_eq!(execution.status, ExecutionStatus::Exited(Some(1)));
        assert_eq!(execution.output, "a\nb\nc\n");
    }

    #[tokio::test]
    async fn test_shell_runner_timeout_keeps_partial_output() {
        let runner = ShellRunner::new("bash");
        let started = std::time::Instant::now();
        let execution = runner
            .run("echo step-1-done; sleep 30", Duration::from_millis(500))
            .await;

        assert_eq!(execution.status, ExecutionStatus::TimedOut(Duration::from_millis(500)));
        assert!(execution.output.contains("step-1-done"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_shell_runner_missing_shell() {
        let runner = ShellRunner::new("/nonexistent/shell");
        let execution = runner.run("true", Duration::from_secs(1)).await;

        assert!(matches!(execution.status, ExecutionStatus::SpawnFailed(_)));
    }
}
