// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{path::PathBuf, process::Stdio, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use relay_types::{ExecutionMode, Task, TaskMetrics, TaskResult};
use smart_default::SmartDefault;
use snafu::ResultExt;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout},
};
use tracing::{info, warn};

use crate::{
    artifacts::snapshot_workspace,
    error::{OtherSnafu, ReadStdoutSnafu, Result, SpawnSnafu, TerminatedSnafu, WriteStdinSnafu},
    executor::{Executor, ExecutorState, ExecutorStatus, Lifecycle},
};

const OUTPUT_START_SENTINEL: &str = "=== OUTPUT START ===";
const OUTPUT_END_SENTINEL: &str = "=== OUTPUT END ===";

/// Static configuration for a reusable pooled process, taken from the
/// worker's `processPool` config block (`maxProcesses`, `processTimeout`,
/// `claudeCodePath`, `reuseProcesses`).
#[derive(Clone, Debug, SmartDefault)]
pub struct ProcessPoolConfig {
    /// Executable to spawn for each pooled process.
    pub command:        String,
    pub args:           Vec<String>,
    /// Root directory under which each executor gets its own per-task
    /// subdirectory so concurrent executors never collide on disk.
    pub workspace_root: PathBuf,
    /// Wall-clock budget for one `execute` call when the task doesn't
    /// specify its own `timeout_secs`.
    #[default(_code = "Duration::from_secs(300)")]
    pub process_timeout: Duration,
    /// Grace period between SIGTERM and SIGKILL on timeout.
    #[default(_code = "Duration::from_secs(10)")]
    pub kill_grace: Duration,
}

/// Wraps a reusable child process that speaks a line-oriented protocol: one
/// task per stdin write, output framed between sentinel markers on stdout.
///
/// The process is reused across tasks as long as it stays healthy; each
/// call gets its own per-task workspace subdirectory so artifacts from
/// concurrent or successive tasks never mix.
pub struct ProcessPoolExecutor {
    lifecycle: Lifecycle,
    config:    ProcessPoolConfig,
    child:     Option<Child>,
    stdin:     Option<ChildStdin>,
    stdout:    Option<BufReader<ChildStdout>>,
    healthy:   bool,
}

impl ProcessPoolExecutor {
    /// Spawns the pooled child process immediately, ready to accept tasks.
    pub async fn spawn(id: impl Into<String>, config: ProcessPoolConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.workspace_root).ok();

        let mut command = tokio::process::Command::new(&config.command);
        command
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().context(SpawnSnafu)?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take().map(BufReader::new);

        info!(pid = ?child.id(), "process-pool executor spawned");

        Ok(Self {
            lifecycle: Lifecycle::new(id.into(), ExecutionMode::ProcessPool),
            config,
            child: Some(child),
            stdin,
            stdout,
            healthy: true,
        })
    }

    fn task_timeout(&self, task: &Task) -> Duration {
        task.context
            .resource_limits
            .as_ref()
            .and_then(|limits| limits.timeout_secs)
            .or(task.context.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(self.config.process_timeout)
    }

    fn task_workspace(&self, task: &Task) -> PathBuf {
        self.config.workspace_root.join(task.id.as_str())
    }

    async fn send_prompt(&mut self, task: &Task, workspace: &std::path::Path) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| TerminatedSnafu.build())?;
        let prompt = serde_json::json!({
            "task_id": task.id.as_str(),
            "title": task.title,
            "description": task.description,
            "workspace_dir": workspace.display().to_string(),
            "repo_url": task.context.repo_url,
        });
        let mut line = serde_json::to_string(&prompt).unwrap_or_default();
        line.push('\n');
        stdin.write_all(line.as_bytes()).await.context(WriteStdinSnafu)?;
        stdin.flush().await.context(WriteStdinSnafu)?;
        Ok(())
    }

    /// Reads stdout lines until the end sentinel, collecting everything
    /// between the start and end markers as the task's output.
    async fn read_until_sentinel(&mut self) -> Result<String> {
        let stdout = self.stdout.as_mut().ok_or_else(|| TerminatedSnafu.build())?;

        let mut collecting = false;
        let mut output = String::new();
        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read = stdout.read_line(&mut line).await.context(ReadStdoutSnafu)?;
            if bytes_read == 0 {
                return OtherSnafu { message: "child process closed stdout before emitting output".to_string() }
                    .fail();
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed == OUTPUT_START_SENTINEL {
                collecting = true;
                continue;
            }
            if trimmed == OUTPUT_END_SENTINEL {
                break;
            }
            if collecting {
                output.push_str(trimmed);
                output.push('\n');
            }
        }
        Ok(output)
    }

    /// Sends SIGTERM, waits the configured grace period, then SIGKILL if the
    /// child is still alive. Marks the executor unhealthy so the pool evicts
    /// it rather than reusing a process that may be in a bad state.
    async fn kill_with_grace(&mut self) {
        self.healthy = false;
        let Some(child) = self.child.as_mut() else { return };
        let Some(pid) = child.id() else { return };

        send_term(pid);
        let deadline = tokio::time::Instant::now() + self.config.kill_grace;
        loop {
            if matches!(child.try_wait(), Ok(Some(_))) {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        warn!(pid, "executor did not exit within grace period, sending SIGKILL");
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

/// Sends SIGTERM on unix, giving the child a chance to exit cleanly before
/// `kill_with_grace`'s deadline forces a `Child::start_kill`. Non-unix
/// platforms have no SIGTERM equivalent, so the grace period there just
/// runs out before the forceful kill.
#[cfg(unix)]
fn send_term(pid: u32) {
    use nix::{sys::signal, unistd::Pid};

    // `signal::kill` here is nix's safe wrapper, not the libc FFI call.
    let _ = signal::kill(Pid::from_raw(pid as i32), signal::Signal::SIGTERM);
}

#[cfg(not(unix))]
fn send_term(_pid: u32) {}

#[async_trait]
impl Executor for ProcessPoolExecutor {
    async fn execute(&mut self, task: &Task) -> TaskResult {
        let start_time = Utc::now();
        if !self.healthy {
            let metrics = TaskMetrics::new(start_time, Utc::now());
            return TaskResult::failed(task.id.clone(), "executor-terminated", "executor is unhealthy", metrics);
        }

        self.lifecycle.state = ExecutorState::Executing;
        let workspace = self.task_workspace(task);
        if let Err(err) = std::fs::create_dir_all(&workspace) {
            let metrics = TaskMetrics::new(start_time, Utc::now());
            return TaskResult::failed(task.id.clone(), "internal", err.to_string(), metrics);
        }

        let timeout = self.task_timeout(task);
        let run = async {
            self.send_prompt(task, &workspace).await?;
            self.read_until_sentinel().await
        };

        let outcome = tokio::time::timeout(timeout, run).await;
        let end_time = Utc::now();
        let metrics = TaskMetrics::new(start_time, end_time);

        match outcome {
            Ok(Ok(output)) => {
                self.lifecycle.state = ExecutorState::Idle;
                self.lifecycle.tasks_completed += 1;
                let artifacts = snapshot_workspace(&workspace).unwrap_or_default();
                TaskResult::completed(task.id.clone(), output, metrics).with_artifacts(artifacts)
            }
            Ok(Err(err)) => {
                self.kill_with_grace().await;
                TaskResult::failed(task.id.clone(), err.kind().as_ref(), err.to_string(), metrics)
            }
            Err(_elapsed) => {
                self.kill_with_grace().await;
                TaskResult::failed(
                    task.id.clone(),
                    "timed-out",
                    format!("task exceeded {}s timeout", timeout.as_secs()),
                    metrics,
                )
            }
        }
    }

    async fn terminate(&mut self) {
        if self.lifecycle.state == ExecutorState::Terminated {
            return;
        }
        self.kill_with_grace().await;
        self.lifecycle.state = ExecutorState::Terminated;
        self.child = None;
        self.stdin = None;
        self.stdout = None;
    }

    fn is_healthy(&self) -> bool { self.healthy && self.lifecycle.state != ExecutorState::Terminated }

    fn status(&self) -> ExecutorStatus { self.lifecycle.status(None) }
}

#[cfg(test)]
mod tests {
    use relay_types::{TaskCategory, TaskId, TaskPriority};

    use super::*;

    fn sample_task() -> Task {
        Task::new(TaskId::from("t1"), "say hello", TaskCategory::Coding, TaskPriority::Normal)
    }

    #[tokio::test]
    async fn executes_echo_script_and_captures_sentinel_output() {
        let workspace_root = std::env::temp_dir().join("relay-executor-process-test");
        let config = ProcessPoolConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), format!(
                "while IFS= read -r line; do echo '{OUTPUT_START_SENTINEL}'; echo hello from child; echo '{OUTPUT_END_SENTINEL}'; done"
            )],
            workspace_root,
            process_timeout: Duration::from_secs(5),
            kill_grace: Duration::from_millis(200),
        };
        let mut executor = ProcessPoolExecutor::spawn("exec-1", config).await.unwrap();

        let result = executor.execute(&sample_task()).await;
        assert_eq!(result.status, relay_types::TaskStatus::Completed);
        assert!(result.output.contains("hello from child"));

        executor.terminate().await;
        assert!(!executor.is_healthy());
    }

    #[tokio::test]
    async fn timeout_marks_executor_unhealthy() {
        let workspace_root = std::env::temp_dir().join("relay-executor-timeout-test");
        let config = ProcessPoolConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), "while IFS= read -r line; do sleep 10; done".to_string()],
            workspace_root,
            process_timeout: Duration::from_millis(100),
            kill_grace: Duration::from_millis(100),
        };
        let mut executor = ProcessPoolExecutor::spawn("exec-2", config).await.unwrap();

        let result = executor.execute(&sample_task()).await;
        assert_eq!(result.status, relay_types::TaskStatus::Failed);
        assert_eq!(result.error_kind.as_deref(), Some("timed-out"));
        assert!(!executor.is_healthy());
    }
}
