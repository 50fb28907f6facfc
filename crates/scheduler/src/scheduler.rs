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

use std::{collections::HashMap, path::PathBuf, time::Duration};

use chrono::Utc;
use relay_error::{DuplicateTaskSnafu, ModeUnsupportedSnafu, NoWorkersAvailableSnafu, NotFoundSnafu, Result, SessionExpiredSnafu};
use relay_types::{
    ErrorKind, ExecutionPlan, MergeStrategy, PendingMerge, Progress, ProgressRecord, SchedulerStats, Session, SessionId,
    SessionOptions, Task, TaskId, TaskResult, TaskStatus, WorkerDescriptor, WorkerId,
};
use tokio::sync::{Mutex, broadcast};
use tracing::{info, warn};

use crate::{
    checkpoint::Checkpoint,
    client::WorkerClient,
    config::SchedulerConfig,
    decompose::{self, merge_results, should_decompose},
    registry::WorkerRegistry,
    session::SessionRegistry,
    types::{ExecutionContext, QueuedTask},
};

/// Fan-out events, one stream per kind in spirit but collapsed into a
/// single broadcast channel the way a small service wires up pub/sub
/// without pulling in a dedicated event bus.
#[derive(Clone, Debug)]
pub enum SchedulerEvent {
    TaskStarted { task_id: TaskId, worker_id: WorkerId },
    TaskProgress { task_id: TaskId, progress: Progress },
    TaskCompleted { task_id: TaskId, status: TaskStatus },
    WorkerHealthChanged { worker_id: WorkerId, healthy: bool },
    StatsUpdated(SchedulerStats),
}

struct PendingMergeEntry {
    merge: PendingMerge,
    children_in_order: Vec<TaskId>,
}

#[derive(Default)]
struct Inner {
    queue: Vec<QueuedTask>,
    contexts: HashMap<TaskId, ExecutionContext>,
    results: HashMap<TaskId, TaskResult>,
    plans: HashMap<TaskId, ExecutionPlan>,
    workers: WorkerRegistry,
    sessions: SessionRegistry,
    pending_merges: HashMap<TaskId, PendingMergeEntry>,
    child_parent: HashMap<TaskId, TaskId>,
    parent_task: HashMap<TaskId, Task>,
    stats: SchedulerStats,
    expired_sessions: u64,
}

impl Inner {
    fn known(&self, id: &TaskId) -> bool {
        self.queue.iter().any(|q| &q.task.id == id) || self.contexts.contains_key(id) || self.results.contains_key(id)
    }

    fn task_status(&self, id: &TaskId) -> Option<TaskStatus> {
        if let Some(result) = self.results.get(id) {
            return Some(result.status);
        }
        if let Some(ctx) = self.contexts.get(id) {
            return Some(ctx.status);
        }
        self.queue.iter().find(|q| &q.task.id == id).map(|q| q.task.status)
    }
}

/// The driver's scheduling core: task queue, worker and session registries,
/// execution contexts and stats, all behind one lock (the single-writer
/// model the concurrency design calls for). Background loops call the
/// `tick_*` methods on their own interval; callers only ever see consistent
/// snapshots.
pub struct Scheduler {
    config: SchedulerConfig,
    client: WorkerClient,
    events: broadcast::Sender<SchedulerEvent>,
    started_at: chrono::DateTime<Utc>,
    inner: Mutex<Inner>,
}

impl Scheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            client: WorkerClient::new(Duration::from_secs(30)),
            events,
            started_at: Utc::now(),
            inner: Mutex::new(Inner::default()),
            config,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> { self.events.subscribe() }

    fn emit(&self, event: SchedulerEvent) { let _ = self.events.send(event); }

    // ---- external operations -------------------------------------------------

    /// Submits a task. Returns the task as recorded: `pending` if queued,
    /// or its terminal state if it was routed synchronously through a
    /// session.
    pub async fn submit_task(&self, task: Task) -> Result<Task> {
        {
            let inner = self.inner.lock().await;
            if inner.known(&task.id) {
                return DuplicateTaskSnafu { task_id: task.id.to_string() }.fail();
            }
        }

        if let Some(session_id) = task.context.session_id.clone() {
            return self.submit_to_session(task, session_id).await;
        }

        let mut inner = self.inner.lock().await;
        if inner.known(&task.id) {
            return DuplicateTaskSnafu { task_id: task.id.to_string() }.fail();
        }
        if self.config.enable_task_decomposition && should_decompose(&task) {
            return Ok(self.submit_decomposed(&mut inner, task));
        }

        inner.queue.push(QueuedTask::new(task.clone()));
        info!(task_id = %task.id, category = %task.category, priority = %task.priority, "task queued");
        Ok(task)
    }

    /// Session-bound tasks bypass the queue entirely: the driver calls the
    /// session's worker directly and records whatever terminal result comes
    /// back, synchronously from the submitter's point of view.
    async fn submit_to_session(&self, task: Task, session_id: SessionId) -> Result<Task> {
        let endpoint = {
            let inner = self.inner.lock().await;
            let session = inner.sessions.get(&session_id).cloned().context_not_found("session", session_id.as_str())?;
            if session.is_expired_at(Utc::now()) {
                return SessionExpiredSnafu { session_id: session_id.to_string() }.fail();
            }
            let worker = inner.workers.get(&session.worker_id).context_not_found("worker", session.worker_id.as_str())?;
            if let Some(mode) = task.context.execution_mode {
                if !worker.capabilities.execution_modes.contains(&mode) {
                    return ModeUnsupportedSnafu { worker_id: session.worker_id.to_string(), mode: mode.to_string() }.fail();
                }
            }
            worker.endpoint.clone()
        };

        let options = relay_types::TaskOptions { execution_mode: task.context.execution_mode };
        let response = self.client.execute_in_session(&endpoint, &session_id, &task, options).await?;

        let mut inner = self.inner.lock().await;
        inner.sessions.touch(&session_id, Utc::now());
        let metrics = relay_types::TaskMetrics::new(task.created_at, Utc::now());
        let result = match response.status {
            TaskStatus::Completed => {
                TaskResult::completed(task.id.clone(), response.output.unwrap_or_default(), metrics).with_artifacts(response.artifacts.unwrap_or_default())
            }
            TaskStatus::Failed => {
                let kind = response.error.as_ref().map(|e| e.error.to_string()).unwrap_or_else(|| "internal".to_string());
                let message = response.error.map(|e| e.message).unwrap_or_default();
                TaskResult::failed(task.id.clone(), kind, message, metrics)
            }
            _ => TaskResult::cancelled(task.id.clone(), metrics),
        };
        let mut finished = task.clone();
        finished.status = result.status;
        finished.updated_at = Utc::now();
        inner.results.insert(task.id.clone(), result);
        drop(inner);
        self.emit(SchedulerEvent::TaskCompleted { task_id: finished.id.clone(), status: finished.status });
        Ok(finished)
    }

    fn submit_decomposed(&self, inner: &mut Inner, mut task: Task) -> Task {
        let children = decompose::decompose(&task);
        let child_ids: Vec<TaskId> = children.iter().map(|c| c.id.clone()).collect();
        for child in &child_ids {
            inner.child_parent.insert(child.clone(), task.id.clone());
        }
        inner.pending_merges.insert(
            task.id.clone(),
            PendingMergeEntry { merge: PendingMerge::new(task.id.clone(), child_ids.clone(), MergeStrategy::Concat), children_in_order: child_ids },
        );
        task.status = TaskStatus::Running;
        inner.parent_task.insert(task.id.clone(), task.clone());
        for child in children {
            inner.queue.push(QueuedTask::new(child));
        }
        info!(task_id = %task.id, "decomposed into child tasks");
        task
    }

    pub async fn cancel_task(&self, id: &TaskId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(pos) = inner.queue.iter().position(|q| &q.task.id == id) {
            let queued = inner.queue.remove(pos);
            let metrics = relay_types::TaskMetrics::new(queued.queued_at, Utc::now());
            inner.results.insert(id.clone(), TaskResult::cancelled(id.clone(), metrics));
            self.emit(SchedulerEvent::TaskCompleted { task_id: id.clone(), status: TaskStatus::Cancelled });
            return Ok(());
        }
        if let Some(ctx) = inner.contexts.remove(id) {
            let endpoint = inner.workers.get(&ctx.worker_id).map(|w| w.endpoint.clone());
            inner.workers.record_completion(&ctx.worker_id, id);
            let metrics = relay_types::TaskMetrics::new(ctx.start_time, Utc::now());
            inner.results.insert(id.clone(), TaskResult::cancelled(id.clone(), metrics));
            drop(inner);
            if let Some(endpoint) = endpoint {
                let _ = self.client.cancel_task(&endpoint, id).await;
            }
            self.emit(SchedulerEvent::TaskCompleted { task_id: id.clone(), status: TaskStatus::Cancelled });
            return Ok(());
        }
        NotFoundSnafu { resource: "task", id: id.to_string() }.fail()
    }

    pub async fn register_worker(&self, worker: WorkerDescriptor) {
        let mut inner = self.inner.lock().await;
        info!(worker_id = %worker.id, endpoint = %worker.endpoint, "worker registered");
        inner.workers.register(worker);
    }

    /// Unregisters a worker and requeues its in-flight tasks (bounded by
    /// `retryAttempts`), per the worker-loss contract.
    pub async fn unregister_worker(&self, id: &WorkerId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.workers.unregister(id).context_not_found("worker", id.as_str())?;
        self.requeue_or_fail_for_worker(&mut inner, id, "worker-lost");
        warn!(worker_id = %id, "worker unregistered; in-flight tasks requeued");
        Ok(())
    }

    /// Requeues every task dispatched to `worker_id`, using the dispatched
    /// `Task` and retry count carried on its `ExecutionContext` rather than
    /// trying to recover either from the queue (which no longer holds it)
    /// or a blank placeholder.
    fn requeue_or_fail_for_worker(&self, inner: &mut Inner, worker_id: &WorkerId, reason: &str) {
        let stranded: Vec<TaskId> = inner.contexts.iter().filter(|(_, c)| &c.worker_id == worker_id).map(|(id, _)| id.clone()).collect();
        for task_id in stranded {
            let Some(ctx) = inner.contexts.remove(&task_id) else { continue };
            if ctx.retry_count < self.config.retry_attempts {
                let mut task = ctx.task;
                task.status = TaskStatus::Pending;
                let mut q = QueuedTask::new(task);
                q.retry_count = ctx.retry_count + 1;
                q.last_attempt = Some(Utc::now());
                inner.queue.push(q);
            } else {
                let metrics = relay_types::TaskMetrics::new(ctx.start_time, Utc::now());
                inner.results.insert(task_id.clone(), TaskResult::failed(task_id.clone(), reason, format!("{reason}: retries exhausted"), metrics));
                self.emit(SchedulerEvent::TaskCompleted { task_id: task_id.clone(), status: TaskStatus::Failed });
            }
        }
    }

    pub async fn create_session(&self, options: SessionOptions) -> Result<Session> {
        let inner = self.inner.lock().await;
        let worker_id = inner.workers.select_for_session().context_no_workers("session-create")?;
        let endpoint = inner.workers.get(&worker_id).map(|w| w.endpoint.clone()).expect("selected worker must be registered");
        drop(inner);

        let created = self.client.create_session(&endpoint).await?;
        let mut session = Session::new(worker_id, options);
        session.id = created.session_id;

        let mut inner = self.inner.lock().await;
        inner.sessions.insert(session.clone());
        info!(session_id = %session.id, worker_id = %session.worker_id, "session created");
        Ok(session)
    }

    pub async fn end_session(&self, id: &SessionId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let session = inner.sessions.end(id).context_not_found("session", id.as_str())?;
        let endpoint = inner.workers.get(&session.worker_id).map(|w| w.endpoint.clone());
        drop(inner);
        if let Some(endpoint) = endpoint {
            let _ = self.client.end_session(&endpoint, id).await;
        }
        Ok(())
    }

    pub async fn get_session(&self, id: &SessionId) -> Result<Session> {
        let inner = self.inner.lock().await;
        inner.sessions.get(id).cloned().context_not_found("session", id.as_str())
    }

    pub async fn get_active_sessions(&self) -> Vec<Session> {
        let inner = self.inner.lock().await;
        inner.sessions.active().cloned().collect()
    }

    pub async fn get_task_status(&self, id: &TaskId) -> Result<TaskStatus> {
        let inner = self.inner.lock().await;
        inner.task_status(id).context_not_found("task", id.as_str())
    }

    pub async fn get_task_result(&self, id: &TaskId) -> Result<TaskResult> {
        let inner = self.inner.lock().await;
        inner.results.get(id).cloned().context_not_found("task result", id.as_str())
    }

    pub async fn get_task_progress(&self, id: &TaskId) -> Result<ProgressRecord> {
        let inner = self.inner.lock().await;
        if let Some(ctx) = inner.contexts.get(id) {
            return Ok(ProgressRecord { task_id: id.clone(), status: ctx.status, progress: ctx.progress, current_step: None, observed_at: Utc::now() });
        }
        if let Some(result) = inner.results.get(id) {
            return Ok(ProgressRecord { task_id: id.clone(), status: result.status, progress: Progress::COMPLETE, current_step: None, observed_at: Utc::now() });
        }
        if inner.queue.iter().any(|q| &q.task.id == id) {
            return Ok(ProgressRecord { task_id: id.clone(), status: TaskStatus::Pending, progress: Progress::ZERO, current_step: None, observed_at: Utc::now() });
        }
        NotFoundSnafu { resource: "task", id: id.to_string() }.fail()
    }

    pub async fn get_stats(&self) -> SchedulerStats {
        let inner = self.inner.lock().await;
        inner.stats
    }

    /// Snapshot of everything still sitting in the queue, in dispatch order.
    pub async fn get_queue(&self) -> Vec<Task> {
        let inner = self.inner.lock().await;
        inner.queue.iter().map(|q| q.task.clone()).collect()
    }

    /// Every recorded execution plan, most recent dispatch first.
    pub async fn get_plans(&self) -> Vec<ExecutionPlan> {
        let inner = self.inner.lock().await;
        inner.plans.values().cloned().collect()
    }

    /// Snapshot of the worker registry.
    pub async fn get_workers(&self) -> Vec<WorkerDescriptor> {
        let inner = self.inner.lock().await;
        inner.workers.iter().cloned().collect()
    }

    pub async fn get_worker(&self, id: &WorkerId) -> Result<WorkerDescriptor> {
        let inner = self.inner.lock().await;
        inner.workers.get(id).cloned().context_not_found("worker", id.as_str())
    }

    // ---- background ticks -----------------------------------------------------

    /// Matches ready tasks to available workers and dispatches them.
    pub async fn tick_schedule(&self) {
        let assignments = {
            let mut inner = self.inner.lock().await;
            self.plan_assignments(&mut inner)
        };

        for (task, worker_id, endpoint) in assignments {
            let options = relay_types::TaskOptions { execution_mode: task.context.execution_mode };
            match self.client.submit_task(&endpoint, &task, options).await {
                Ok(_accepted) => {
                    self.emit(SchedulerEvent::TaskStarted { task_id: task.id.clone(), worker_id: worker_id.clone() });
                }
                Err(error) => {
                    warn!(task_id = %task.id, %worker_id, %error, "dispatch failed, requeuing");
                    let mut inner = self.inner.lock().await;
                    inner.contexts.remove(&task.id);
                    inner.workers.record_completion(&worker_id, &task.id);
                    self.requeue_or_fail_for_worker(&mut inner, &worker_id, "executor-terminated");
                }
            }
        }
    }

    fn plan_assignments(&self, inner: &mut Inner) -> Vec<(Task, WorkerId, String)> {
        let now = Utc::now();
        let retry_delay = chrono::Duration::from_std(self.config.retry_delay).unwrap_or(chrono::Duration::seconds(30));

        let mut ready_idx: Vec<usize> = (0..inner.queue.len())
            .filter(|&i| {
                let q = &inner.queue[i];
                q.is_ready(&|dep| inner.results.get(dep).is_some_and(|r| r.status == TaskStatus::Completed), retry_delay, now)
            })
            .collect();
        ready_idx.sort_by(|&a, &b| {
            let ta = &inner.queue[a].task;
            let tb = &inner.queue[b].task;
            self.config
                .priority_weight(tb.priority)
                .cmp(&self.config.priority_weight(ta.priority))
                .then(inner.queue[a].queued_at.cmp(&inner.queue[b].queued_at))
        });

        let mut assignments = Vec::new();
        let mut consumed = Vec::new();
        for idx in ready_idx {
            let (category, mode) = {
                let task = &inner.queue[idx].task;
                (task.category, task.context.execution_mode)
            };
            let Some(worker_id) = inner.workers.select(category, mode, &self.config) else { continue };
            let Some(endpoint) = inner.workers.get(&worker_id).map(|w| w.endpoint.clone()) else { continue };

            let queued = &inner.queue[idx];
            let plan = ExecutionPlan::new(
                queued.task.id.clone(),
                worker_id.clone(),
                self.config.priority_weight(queued.task.priority),
                queued.task.dependencies.clone(),
                queued.retry_count,
            );
            inner.plans.insert(queued.task.id.clone(), plan);
            inner.workers.record_assignment(&worker_id, queued.task.id.clone());
            let mut task = queued.task.clone();
            task.status = TaskStatus::Running;
            let retry_count = queued.retry_count;
            inner.contexts.insert(task.id.clone(), ExecutionContext::new(task.clone(), worker_id.clone(), retry_count));
            assignments.push((task, worker_id, endpoint));
            consumed.push(idx);
        }

        consumed.sort_unstable_by(|a, b| b.cmp(a));
        for idx in consumed {
            inner.queue.remove(idx);
        }
        assignments
    }

    /// Polls every in-flight task's worker for status, records terminal
    /// results, and drives retry / dependency-cascade / merge logic.
    pub async fn tick_poll(&self) {
        let in_flight: Vec<(TaskId, WorkerId, String)> = {
            let inner = self.inner.lock().await;
            inner
                .contexts
                .iter()
                .filter_map(|(id, ctx)| inner.workers.get(&ctx.worker_id).map(|w| (id.clone(), ctx.worker_id.clone(), w.endpoint.clone())))
                .collect()
        };

        for (task_id, worker_id, endpoint) in in_flight {
            match self.client.poll_task(&endpoint, &task_id).await {
                Ok(response) => self.handle_poll_response(task_id, worker_id, response).await,
                Err(error) => warn!(%task_id, %worker_id, %error, "poll failed"),
            }
        }
    }

    async fn handle_poll_response(&self, task_id: TaskId, worker_id: WorkerId, response: relay_types::TaskPollResponse) {
        let mut inner = self.inner.lock().await;
        let Some(ctx) = inner.contexts.get_mut(&task_id) else { return };
        if ctx.progress.record(response.progress.value()) {
            warn!(%task_id, %worker_id, observed = response.progress.value(), "worker reported a progress regression");
        }
        ctx.status = response.status;
        self.emit(SchedulerEvent::TaskProgress { task_id: task_id.clone(), progress: ctx.progress });

        if !response.status.is_terminal() {
            return;
        }

        let ctx = inner.contexts.remove(&task_id).expect("checked above");
        inner.workers.record_completion(&worker_id, &task_id);
        let metrics = relay_types::TaskMetrics::new(ctx.start_time, Utc::now());

        let result = match response.status {
            TaskStatus::Completed => {
                let artifacts = response.artifacts.unwrap_or_default();
                TaskResult::completed(task_id.clone(), response.output.unwrap_or_default(), metrics).with_artifacts(artifacts)
            }
            TaskStatus::Failed => {
                let kind = response.error.as_ref().map(|e| e.error.to_string()).unwrap_or_else(|| "internal".to_string());
                let message = response.error.map(|e| e.message).unwrap_or_default();
                if self.config.retry_failed_tasks && ctx.retry_count < self.config.retry_attempts {
                    let mut task = ctx.task.clone();
                    task.status = TaskStatus::Pending;
                    let mut q = QueuedTask::new(task);
                    q.retry_count = ctx.retry_count + 1;
                    q.last_attempt = Some(Utc::now());
                    inner.queue.push(q);
                    return;
                }
                TaskResult::failed(task_id.clone(), kind, message, metrics)
            }
            _ => TaskResult::cancelled(task_id.clone(), metrics),
        };

        self.record_terminal(&mut inner, task_id.clone(), result);
    }

    fn record_terminal(&self, inner: &mut Inner, task_id: TaskId, result: TaskResult) {
        let status = result.status;
        if status == TaskStatus::Failed {
            self.cascade_dependency_failures(inner, &task_id);
        }
        if let Some(parent_id) = inner.child_parent.get(&task_id).cloned() {
            self.record_child_result(inner, parent_id, task_id.clone(), result.clone());
        }
        inner.results.insert(task_id.clone(), result);
        self.emit(SchedulerEvent::TaskCompleted { task_id, status });
    }

    fn record_child_result(&self, inner: &mut Inner, parent_id: TaskId, child_id: TaskId, result: TaskResult) {
        inner.results.insert(child_id.clone(), result);
        let Some(entry) = inner.pending_merges.get_mut(&parent_id) else { return };
        let complete = entry.merge.record(child_id);
        if !complete {
            return;
        }
        let entry = inner.pending_merges.remove(&parent_id).expect("checked above");
        let children: Vec<TaskResult> = entry.children_in_order.iter().filter_map(|id| inner.results.get(id).cloned()).collect();
        let merged = merge_results(parent_id.clone(), entry.merge.merge_strategy, &children);
        inner.parent_task.remove(&parent_id);
        let status = merged.status;
        inner.results.insert(parent_id.clone(), merged);
        self.emit(SchedulerEvent::TaskCompleted { task_id: parent_id, status });
    }

    fn cascade_dependency_failures(&self, inner: &mut Inner, failed_id: &TaskId) {
        let mut to_fail = vec![failed_id.clone()];
        while let Some(id) = to_fail.pop() {
            let blocked: Vec<usize> =
                inner.queue.iter().enumerate().filter(|(_, q)| q.task.dependencies.contains(&id)).map(|(i, _)| i).collect();
            for idx in blocked.into_iter().rev() {
                let queued = inner.queue.remove(idx);
                let metrics = relay_types::TaskMetrics::new(queued.queued_at, Utc::now());
                let result =
                    TaskResult::failed(queued.task.id.clone(), ErrorKind::DependencyFailed.as_ref(), format!("dependency {id} failed"), metrics);
                to_fail.push(queued.task.id.clone());
                inner.results.insert(queued.task.id.clone(), result);
                self.emit(SchedulerEvent::TaskCompleted { task_id: queued.task.id, status: TaskStatus::Failed });
            }
        }
    }

    /// Pings every worker's `/health`; workers that stop responding are
    /// marked offline and their in-flight tasks requeued.
    pub async fn tick_health_check(&self) {
        let endpoints: Vec<(WorkerId, String, relay_types::WorkerStatus)> =
            { self.inner.lock().await.workers.iter().map(|w| (w.id.clone(), w.endpoint.clone(), w.status)).collect() };

        for (worker_id, endpoint, previous_status) in endpoints {
            let healthy = self.client.health(&endpoint).await.is_ok();
            let mut inner = self.inner.lock().await;
            let was_available = previous_status.is_available();
            if let Some(descriptor) = inner.workers.get_mut(&worker_id) {
                descriptor.status = if healthy { relay_types::WorkerStatus::Idle } else { relay_types::WorkerStatus::Offline };
                descriptor.health.last_seen = Utc::now();
            }
            if was_available && !healthy {
                self.requeue_or_fail_for_worker(&mut inner, &worker_id, "worker-lost");
                self.emit(SchedulerEvent::WorkerHealthChanged { worker_id, healthy: false });
            } else if !was_available && healthy {
                self.emit(SchedulerEvent::WorkerHealthChanged { worker_id, healthy: true });
            }
        }
    }

    /// Ends sessions past their `expires_at`, best-effort notifying their
    /// worker.
    pub async fn tick_session_sweep(&self) {
        let expired = {
            let mut inner = self.inner.lock().await;
            let swept = inner.sessions.sweep_expired(Utc::now());
            inner.expired_sessions += swept.len() as u64;
            swept
        };
        for session in expired {
            let endpoint = { self.inner.lock().await.workers.get(&session.worker_id).map(|w| w.endpoint.clone()) };
            if let Some(endpoint) = endpoint {
                let _ = self.client.end_session(&endpoint, &session.id).await;
            }
            warn!(session_id = %session.id, "session expired and removed");
        }
    }

    /// Recomputes the aggregated counters exposed via `GET /stats`.
    pub async fn tick_stats(&self) {
        let mut inner = self.inner.lock().await;
        let completed = inner.results.values().filter(|r| r.status == TaskStatus::Completed).count() as u64;
        let failed = inner.results.values().filter(|r| r.status == TaskStatus::Failed).count() as u64;
        let durations: Vec<i64> = inner.results.values().filter(|r| r.status == TaskStatus::Completed).map(|r| r.metrics.duration_ms).collect();
        let average = if durations.is_empty() { 0.0 } else { durations.iter().sum::<i64>() as f64 / durations.len() as f64 };
        let uptime_secs = (Utc::now() - self.started_at).num_seconds().max(0) as u64;

        let stats = SchedulerStats {
            total_tasks: (inner.queue.len() + inner.contexts.len() + inner.results.len()) as u64,
            completed_tasks: completed,
            failed_tasks: failed,
            running_tasks: inner.contexts.len() as u64,
            queued_tasks: inner.queue.len() as u64,
            total_workers: inner.workers.len() as u64,
            available_workers: inner.workers.iter().filter(|w| w.is_available()).count() as u64,
            average_task_duration_ms: average,
            success_rate: 0.0,
            throughput: if uptime_secs == 0 { 0.0 } else { completed as f64 / uptime_secs as f64 },
            uptime_secs,
            active_sessions: inner.sessions.active().count() as u64,
            total_sessions: inner.sessions.active().count() as u64 + inner.expired_sessions,
            expired_sessions: inner.expired_sessions,
        }
        .recompute_rates();
        inner.stats = stats;
        drop(inner);
        self.emit(SchedulerEvent::StatsUpdated(stats));
    }

    /// Writes a best-effort checkpoint if `checkpointPath` is configured.
    pub async fn tick_checkpoint(&self) {
        let Some(path) = self.config.checkpoint_path.clone() else { return };
        let inner = self.inner.lock().await;
        crate::checkpoint::write_best_effort(&path, &inner.queue, &inner.workers, &inner.sessions).await;
    }

    /// Loads a checkpoint at `path` if present, demoting any task recorded
    /// as `running` back to `pending`.
    pub async fn restore_checkpoint(&self, path: &PathBuf) -> std::io::Result<()> {
        let Some(checkpoint) = Checkpoint::load(path).await? else { return Ok(()) };
        let mut inner = self.inner.lock().await;
        inner.queue.extend(checkpoint.clone().into_queued_tasks());
        for session in checkpoint.sessions() {
            info!(session_id = %session.id, "restored session from checkpoint (worker binding not re-verified)");
        }
        Ok(())
    }
}

trait OptionExt<T> {
    fn context_not_found(self, resource: &str, id: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn context_not_found(self, resource: &str, id: &str) -> Result<T> {
        self.ok_or_else(|| NotFoundSnafu { resource: resource.to_string(), id: id.to_string() }.build())
    }
}

trait WorkerIdOptionExt {
    fn context_no_workers(self, task_id: &str) -> Result<WorkerId>;
}

impl WorkerIdOptionExt for Option<WorkerId> {
    fn context_no_workers(self, task_id: &str) -> Result<WorkerId> {
        self.ok_or_else(|| NoWorkersAvailableSnafu { task_id: task_id.to_string() }.build())
    }
}
