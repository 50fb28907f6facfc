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

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use bollard::Docker;
use relay_types::{ExecutionMode, Task, TaskResult};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::info;

use crate::{
    container::{ContainerConfig, ContainerExecutor},
    error::{ModeUnsupportedSnafu, Result},
    executor::{Executor, ExecutorStatus},
    process::{ProcessPoolConfig, ProcessPoolExecutor},
};

/// The closed sum type behind [`Executor`]: exactly two variants, no
/// subclassing. Dispatch itself is a plain `match`, not a trait object. Each
/// variant carries the [`OwnedSemaphorePermit`] acquired when the executor
/// was checked out of [`ExecutionProvider`] — it travels with the executor
/// for as long as the caller holds it and is only released (dropped) by
/// [`ExecutionProvider::release`], which is what actually makes
/// `maxProcesses`/`maxContainers` a bound on concurrent *executions* rather
/// than just on concurrent *checkouts*.
pub enum AnyExecutor {
    ProcessPool { executor: ProcessPoolExecutor, permit: OwnedSemaphorePermit },
    Container { executor: ContainerExecutor, permit: OwnedSemaphorePermit },
}

impl AnyExecutor {
    fn as_executor_mut(&mut self) -> &mut dyn Executor {
        match self {
            Self::ProcessPool { executor, .. } => executor,
            Self::Container { executor, .. } => executor,
        }
    }

    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        match self {
            Self::ProcessPool { .. } => ExecutionMode::ProcessPool,
            Self::Container { .. } => ExecutionMode::ContainerAgentic,
        }
    }
}

/// Dispatches straight through to whichever variant is held; a worker
/// holding an `AnyExecutor` never needs to match on it itself.
#[async_trait]
impl Executor for AnyExecutor {
    async fn execute(&mut self, task: &Task) -> TaskResult { self.as_executor_mut().execute(task).await }

    async fn terminate(&mut self) { self.as_executor_mut().terminate().await }

    fn is_healthy(&self) -> bool {
        match self {
            Self::ProcessPool { executor, .. } => executor.is_healthy(),
            Self::Container { executor, .. } => executor.is_healthy(),
        }
    }

    fn status(&self) -> ExecutorStatus {
        match self {
            Self::ProcessPool { executor, .. } => executor.status(),
            Self::Container { executor, .. } => executor.status(),
        }
    }
}

/// Which execution modes a worker is willing to serve, and how to build an
/// executor for each.
#[derive(Clone)]
pub struct ProviderConfig {
    pub default_mode:    ExecutionMode,
    pub process_pool:    Option<ProcessPoolConfig>,
    pub container:       Option<ContainerConfig>,
    pub max_processes:   usize,
    pub max_containers:  usize,
}

/// Supplies the right executor per task under a single mode policy, bounds
/// resource usage with a semaphore per mode, and reclaims executors on
/// completion.
///
/// Process-mode executors are pooled and returned to a free list on
/// [`ExecutionProvider::release`]; container-mode executors are always
/// one-shot and terminated on release.
pub struct ExecutionProvider {
    docker:          Option<Docker>,
    config:          ProviderConfig,
    process_permits: Arc<Semaphore>,
    container_permits: Arc<Semaphore>,
    process_pool:    Mutex<Vec<ProcessPoolExecutor>>,
    executor_seq:    AtomicU64,
}

impl ExecutionProvider {
    #[must_use]
    pub fn new(config: ProviderConfig, docker: Option<Docker>) -> Self {
        Self {
            docker,
            process_permits: Arc::new(Semaphore::new(config.max_processes.max(1))),
            container_permits: Arc::new(Semaphore::new(config.max_containers.max(1))),
            config,
            process_pool: Mutex::new(Vec::new()),
            executor_seq: AtomicU64::new(0),
        }
    }

    fn resolve_mode(&self, task: &Task, options_mode: Option<ExecutionMode>) -> ExecutionMode {
        task.context.execution_mode.or(options_mode).unwrap_or(self.config.default_mode)
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.executor_seq.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns a healthy executor for `task`, blocking (FIFO, per-mode) until
    /// a slot is free. Mode is chosen via `task.context.executionMode` →
    /// `options_mode` → the worker's configured default.
    pub async fn get_executor(&self, task: &Task, options_mode: Option<ExecutionMode>) -> Result<AnyExecutor> {
        let mode = self.resolve_mode(task, options_mode);
        match mode {
            ExecutionMode::ProcessPool => self.get_process_executor().await,
            ExecutionMode::ContainerAgentic => self.get_container_executor(None).await,
        }
    }

    /// Session-bound variant of [`Self::get_executor`]: always container
    /// mode, and reuses the caller-supplied `session_id` as the executor's
    /// label so repeated calls route to the same underlying container.
    pub async fn get_session_executor(&self, session_id: &str) -> Result<AnyExecutor> {
        self.get_container_executor(Some(session_id.to_string())).await
    }

    async fn get_process_executor(&self) -> Result<AnyExecutor> {
        let Some(config) = self.config.process_pool.clone() else {
            return ModeUnsupportedSnafu { mode: "process_pool".to_string() }.fail();
        };
        let permit = self.process_permits.clone().acquire_owned().await.expect("semaphore not closed");

        {
            let mut pool = self.process_pool.lock().await;
            while let Some(executor) = pool.pop() {
                if executor.is_healthy() {
                    return Ok(AnyExecutor::ProcessPool { executor, permit });
                }
            }
        }

        let id = self.next_id("process");
        info!(id, "spawning new pooled process executor");
        let executor = ProcessPoolExecutor::spawn(id, config).await?;
        Ok(AnyExecutor::ProcessPool { executor, permit })
    }

    async fn get_container_executor(&self, session_id: Option<String>) -> Result<AnyExecutor> {
        let Some(config) = self.config.container.clone() else {
            return ModeUnsupportedSnafu { mode: "container_agentic".to_string() }.fail();
        };
        let Some(docker) = self.docker.clone() else {
            return ModeUnsupportedSnafu { mode: "container_agentic".to_string() }.fail();
        };
        let permit = self.container_permits.clone().acquire_owned().await.expect("semaphore not closed");

        let id = self.next_id("container");
        Ok(AnyExecutor::Container { executor: ContainerExecutor::new(id, docker, config, session_id), permit })
    }

    /// Returns `executor` to the pool (process mode, if still healthy) or
    /// terminates and drops it (container mode, always one-shot). Either
    /// way, the executor's semaphore permit is dropped at the end of this
    /// call, freeing the concurrency slot it held since checkout.
    pub async fn release(&self, mut executor: AnyExecutor) {
        let reusable = matches!(&executor, AnyExecutor::ProcessPool { executor: inner, .. } if inner.is_healthy());
        if reusable {
            if let AnyExecutor::ProcessPool { executor: inner, permit } = executor {
                self.process_pool.lock().await.push(inner);
                drop(permit);
            }
            return;
        }
        executor.as_executor_mut().terminate().await;
    }

    /// Terminates every pooled process executor. Idempotent; called on
    /// worker shutdown.
    pub async fn cleanup(&self) {
        let mut pool = self.process_pool.lock().await;
        for mut executor in pool.drain(..) {
            executor.terminate().await;
        }
    }

    /// True iff at least one configured mode can still produce an executor.
    #[must_use]
    pub fn is_healthy(&self) -> bool { self.config.process_pool.is_some() || self.config.container.is_some() }
}

#[cfg(test)]
mod tests {
    use relay_types::{TaskCategory, TaskId, TaskPriority};

    use super::*;

    #[test]
    fn resolve_mode_prefers_task_context_over_options_over_default() {
        let provider = ExecutionProvider::new(
            ProviderConfig {
                default_mode: ExecutionMode::ContainerAgentic,
                process_pool: None,
                container: None,
                max_processes: 1,
                max_containers: 1,
            },
            None,
        );
        let mut task = Task::new(TaskId::from("t1"), "x", TaskCategory::Coding, TaskPriority::Normal);
        assert_eq!(provider.resolve_mode(&task, None), ExecutionMode::ContainerAgentic);
        assert_eq!(provider.resolve_mode(&task, Some(ExecutionMode::ProcessPool)), ExecutionMode::ProcessPool);
        task.context.execution_mode = Some(ExecutionMode::ContainerAgentic);
        assert_eq!(provider.resolve_mode(&task, Some(ExecutionMode::ProcessPool)), ExecutionMode::ContainerAgentic);
    }

    #[tokio::test]
    async fn unsupported_mode_fails_with_mode_unsupported() {
        let provider = ExecutionProvider::new(
            ProviderConfig {
                default_mode: ExecutionMode::ProcessPool,
                process_pool: None,
                container: None,
                max_processes: 1,
                max_containers: 1,
            },
            None,
        );
        let task = Task::new(TaskId::from("t1"), "x", TaskCategory::Coding, TaskPriority::Normal);
        let err = provider.get_executor(&task, None).await.unwrap_err();
        assert_eq!(err.kind(), relay_types::ErrorKind::ModeUnsupported);
    }
}
