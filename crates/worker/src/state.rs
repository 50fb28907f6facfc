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

//! In-memory bookkeeping behind the worker's HTTP surface.
//!
//! `execute()` on an [`relay_executor::Executor`] blocks to terminal
//! completion, so `POST /tasks` can't call it inline. Instead it spawns the
//! call in the background and [`WorkerState`] tracks the running `TaskId`s
//! in `tasks`; `GET /tasks/{id}` and `DELETE /tasks/{id}` read and cancel
//! against that map rather than the executor directly.

use std::{collections::HashMap, sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use relay_error::{NotFoundSnafu, SessionExpiredSnafu};
use relay_executor::{ExecutionProvider, Executor};
use relay_types::{
    DEFAULT_SESSION_TIMEOUT_SECS, ExecutionMode, Progress, SessionId, Task, TaskId, TaskMetrics, TaskResult, TaskStatus, WorkerCapabilities, WorkerId,
};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// One task's in-flight or terminal state, as observed by `GET /tasks/{id}`.
#[derive(Clone, Debug)]
pub struct TaskRecord {
    pub status: TaskStatus,
    pub progress: Progress,
    pub current_step: Option<String>,
    pub result: Option<TaskResult>,
    pub started_at: Instant,
    cancel: CancellationToken,
}

impl TaskRecord {
    fn running(cancel: CancellationToken) -> Self {
        Self { status: TaskStatus::Running, progress: Progress::ZERO, current_step: Some("executing".to_string()), result: None, started_at: Instant::now(), cancel }
    }
}

/// A session-bound container executor, held open across multiple
/// `POST /sessions/{id}/execute` calls until `DELETE /sessions/{id}`.
struct SessionEntry {
    executor:   relay_executor::AnyExecutor,
    expires_at: DateTime<Utc>,
}

pub struct WorkerState {
    pub id: WorkerId,
    pub endpoint: String,
    pub capabilities: WorkerCapabilities,
    pub provider: ExecutionProvider,
    tasks: RwLock<HashMap<TaskId, TaskRecord>>,
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
    pub started_at: Instant,
}

impl WorkerState {
    #[must_use]
    pub fn new(id: WorkerId, endpoint: String, capabilities: WorkerCapabilities, provider: ExecutionProvider) -> Self {
        Self { id, endpoint, capabilities, provider, tasks: RwLock::new(HashMap::new()), sessions: Mutex::new(HashMap::new()), started_at: Instant::now() }
    }

    pub async fn is_active(&self, task_id: &TaskId) -> bool {
        self.tasks.read().await.get(task_id).is_some_and(|r| !r.status.is_terminal())
    }

    pub async fn active_count(&self) -> u32 {
        self.tasks.read().await.values().filter(|r| !r.status.is_terminal()).count() as u32
    }

    pub async fn get_task(&self, task_id: &TaskId) -> Option<TaskRecord> { self.tasks.read().await.get(task_id).cloned() }

    /// Spawns `task` on a background executor slot, tracked under `task.id`.
    /// Returns the cancellation token so the caller doesn't need a second
    /// map lookup to wire `DELETE /tasks/{id}`.
    pub async fn spawn_task(self: &Arc<Self>, task: Task, options_mode: Option<ExecutionMode>) {
        let cancel = CancellationToken::new();
        self.tasks.write().await.insert(task.id.clone(), TaskRecord::running(cancel.clone()));

        let state = self.clone();
        tokio::spawn(async move {
            let result = match state.provider.get_executor(&task, options_mode).await {
                Ok(mut executor) => {
                    let outcome = run_cancellable(&mut executor, &task, &cancel).await;
                    state.provider.release(executor).await;
                    outcome
                }
                Err(error) => TaskResult::failed(task.id.clone(), error.kind().as_ref(), error.to_string(), TaskMetrics::new(Utc::now(), Utc::now())),
            };
            state.finish(&task.id, result).await;
        });
    }

    /// Runs `task` synchronously on a session-bound executor, reusing the
    /// session's container across calls. An unknown `session_id` is a 404;
    /// one that outlived its lifetime is evicted and reported as a 410 so
    /// callers can tell "never existed" apart from "existed, now gone".
    pub async fn execute_in_session(&self, session_id: &SessionId, task: &Task, options_mode: Option<ExecutionMode>) -> relay_error::Result<TaskResult> {
        let mut sessions = self.sessions.lock().await;
        let Some(entry) = sessions.get_mut(session_id) else {
            return NotFoundSnafu { resource: "session", id: session_id.to_string() }.fail();
        };
        if entry.expires_at < Utc::now() {
            let mut entry = sessions.remove(session_id).expect("just looked up");
            drop(sessions);
            entry.executor.terminate().await;
            return SessionExpiredSnafu { session_id: session_id.to_string() }.fail();
        }
        let _ = options_mode;
        Ok(entry.executor.execute(task).await)
    }

    pub async fn open_session(&self, session_id: SessionId) -> relay_error::Result<()> {
        let executor = self.provider.get_session_executor(session_id.as_str()).await.map_err(|e| relay_error::Error::internal(e.to_string()))?;
        let expires_at = Utc::now() + chrono::Duration::seconds(DEFAULT_SESSION_TIMEOUT_SECS);
        self.sessions.lock().await.insert(session_id, SessionEntry { executor, expires_at });
        Ok(())
    }

    pub async fn close_session(&self, session_id: &SessionId) -> bool {
        if let Some(mut entry) = self.sessions.lock().await.remove(session_id) {
            entry.executor.terminate().await;
            return true;
        }
        false
    }

    pub async fn cancel_task(&self, task_id: &TaskId) -> bool {
        let mut tasks = self.tasks.write().await;
        let Some(record) = tasks.get_mut(task_id) else { return false };
        if record.status.is_terminal() {
            return true;
        }
        record.cancel.cancel();
        true
    }

    async fn finish(&self, task_id: &TaskId, result: TaskResult) {
        let mut tasks = self.tasks.write().await;
        if let Some(record) = tasks.get_mut(task_id) {
            record.status = result.status;
            record.progress = Progress::COMPLETE;
            record.current_step = None;
            record.result = Some(result);
        }
    }
}

async fn run_cancellable(executor: &mut relay_executor::AnyExecutor, task: &Task, cancel: &CancellationToken) -> TaskResult {
    tokio::select! {
        result = executor.execute(task) => result,
        () = cancel.cancelled() => {
            executor.terminate().await;
            TaskResult::cancelled(task.id.clone(), TaskMetrics::new(Utc::now(), Utc::now()))
        }
    }
}
