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

use std::time::Instant;

use async_trait::async_trait;
use relay_types::{ExecutionMode, Task, TaskResult};

/// Lifecycle state of a single executor slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Executing,
    Terminated,
}

/// A point-in-time snapshot of one executor's state and counters, returned
/// by [`Executor::status`] and surfaced through `GET /health`.
#[derive(Clone, Debug)]
pub struct ExecutorStatus {
    pub id:              String,
    pub mode:            ExecutionMode,
    pub state:           ExecutorState,
    pub uptime_secs:     u64,
    pub tasks_completed:    u64,
    pub last_memory_bytes:  Option<u64>,
}

/// A single in-flight execution slot for one task.
///
/// Two variants satisfy this contract: a long-lived pooled process
/// ([`crate::process::ProcessPoolExecutor`]), and a freshly created isolated
/// container ([`crate::container::ContainerExecutor`]). The execution
/// provider holds these behind the closed sum type [`crate::AnyExecutor`]
/// rather than a boxed trait object, since there are exactly two variants
/// and no third is expected.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs `task` to completion, blocking until it finishes, times out, or
    /// is cancelled. Never fails the call itself — a terminal error is
    /// folded into `TaskResult::failed`.
    async fn execute(&mut self, task: &Task) -> TaskResult;

    /// Idempotently releases OS resources (child process, container).
    /// Further `execute` calls after this must fail.
    async fn terminate(&mut self);

    /// Fast, non-blocking health check. `false` means the caller must
    /// discard this executor rather than return it to the pool.
    fn is_healthy(&self) -> bool;

    /// A snapshot of this executor's current state and counters.
    fn status(&self) -> ExecutorStatus;
}

/// Shared bookkeeping used by both executor variants to fill in the common
/// fields of [`ExecutorStatus`].
#[derive(Debug)]
pub(crate) struct Lifecycle {
    pub id:              String,
    pub mode:            ExecutionMode,
    pub state:           ExecutorState,
    pub started_at:      Instant,
    pub tasks_completed: u64,
}

impl Lifecycle {
    pub(crate) fn new(id: String, mode: ExecutionMode) -> Self {
        Self { id, mode, state: ExecutorState::Idle, started_at: Instant::now(), tasks_completed: 0 }
    }

    pub(crate) fn status(&self, last_memory_bytes: Option<u64>) -> ExecutorStatus {
        ExecutorStatus {
            id: self.id.clone(),
            mode: self.mode,
            state: self.state,
            uptime_secs: self.started_at.elapsed().as_secs(),
            tasks_completed: self.tasks_completed,
            last_memory_bytes,
        }
    }
}
