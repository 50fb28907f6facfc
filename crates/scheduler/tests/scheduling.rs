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

//! End-to-end scheduler behavior against a fake worker (the same
//! real-TCP-listener + axum pattern the client's own tests use), rather than
//! unit-testing each collaborator in isolation.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use relay_scheduler::{LoadBalancingStrategy, Scheduler, SchedulerConfig};
use relay_types::{
    ExecutionMode, ExecutorPoolStats, Progress, SessionCreated, SessionExecuteRequest, SessionId, SessionOptions,
    Task, TaskAccepted, TaskCategory, TaskId, TaskPollResponse, TaskPriority, TaskStatus, TaskSubmission,
    WorkerCapabilities, WorkerDescriptor, WorkerHealth, WorkerHealthReport, WorkerId, WorkerStatus,
};

#[derive(Default)]
struct FakeWorkerState {
    tasks: Mutex<HashMap<TaskId, TaskStatus>>,
}

/// A worker that completes every task the instant it's submitted, and
/// accepts session creation when asked.
async fn spawn_fake_worker() -> (String, Arc<FakeWorkerState>) {
    let state = Arc::new(FakeWorkerState::default());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let router = Router::new()
        .route(
            "/tasks",
            post(|State(state): State<Arc<FakeWorkerState>>, Json(body): Json<TaskSubmission>| async move {
                state.tasks.lock().unwrap().insert(body.task.id.clone(), TaskStatus::Completed);
                (StatusCode::ACCEPTED, Json(TaskAccepted { task_id: body.task.id, status: TaskStatus::Running }))
            }),
        )
        .route(
            "/tasks/{id}",
            get(|State(state): State<Arc<FakeWorkerState>>, Path(id): Path<TaskId>| async move {
                let status = state.tasks.lock().unwrap().get(&id).copied().unwrap_or(TaskStatus::Running);
                Json(TaskPollResponse {
                    task_id: id,
                    status,
                    progress: if status == TaskStatus::Completed { Progress::COMPLETE } else { Progress::ZERO },
                    current_step: None,
                    output: Some(String::new()),
                    artifacts: Some(Vec::new()),
                    error: None,
                    metadata: Default::default(),
                })
            })
            .delete(|State(_): State<Arc<FakeWorkerState>>, Path(_id): Path<TaskId>| async move { StatusCode::OK }),
        )
        .route(
            "/sessions",
            post(|| async move { (StatusCode::CREATED, Json(SessionCreated { session_id: SessionId::generate(), endpoint: String::new() })) }),
        )
        .route("/sessions/{id}", delete(|| async move { StatusCode::OK }))
        .route(
            "/sessions/{id}/execute",
            post(|Json(body): Json<SessionExecuteRequest>| async move {
                Json(TaskPollResponse {
                    task_id: body.task.id,
                    status: TaskStatus::Completed,
                    progress: Progress::COMPLETE,
                    current_step: None,
                    output: Some("session output".to_string()),
                    artifacts: Some(Vec::new()),
                    error: None,
                    metadata: Default::default(),
                })
            }),
        )
        .route(
            "/health",
            get(|| async move {
                Json(WorkerHealthReport {
                    status: WorkerStatus::Idle,
                    active_tasks: 0,
                    executor_pool: ExecutorPoolStats { active: 0, idle: 4 },
                    uptime_secs: 1,
                    resource_usage: relay_types::ResourceUsage::default(),
                })
            }),
        )
        .with_state(state.clone());
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    (format!("http://127.0.0.1:{port}"), state)
}

fn descriptor(id: &str, endpoint: &str, max: u32, supports_container: bool) -> WorkerDescriptor {
    WorkerDescriptor {
        id: WorkerId::from(id),
        endpoint: endpoint.to_string(),
        status: WorkerStatus::Idle,
        capabilities: WorkerCapabilities {
            supported_categories: BTreeSet::from([TaskCategory::Coding]),
            max_concurrent_tasks: max,
            supports_container_execution: supports_container,
            execution_modes: BTreeSet::from([ExecutionMode::ProcessPool]),
        },
        health: WorkerHealth { last_seen: chrono::Utc::now(), response_time_ms: 1 },
        current_tasks: BTreeSet::new(),
    }
}

async fn poll_until_terminal(scheduler: &Scheduler, id: &TaskId) -> relay_types::TaskResult {
    for _ in 0..20 {
        scheduler.tick_poll().await;
        if let Ok(result) = scheduler.get_task_result(id).await {
            return result;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {id} never reached a terminal result");
}

#[tokio::test]
async fn single_process_mode_task_is_dispatched_and_completes() {
    let (endpoint, _worker_state) = spawn_fake_worker().await;
    let scheduler = Scheduler::new(SchedulerConfig::default());
    scheduler.register_worker(descriptor("w1", &endpoint, 4, false)).await;

    let task = Task::new(TaskId::from("t1"), "run the build", TaskCategory::Coding, TaskPriority::Normal);
    scheduler.submit_task(task.clone()).await.unwrap();
    scheduler.tick_schedule().await;

    let result = poll_until_terminal(&scheduler, &task.id).await;
    assert_eq!(result.status, TaskStatus::Completed);
}

#[tokio::test]
async fn dependency_chain_blocks_the_child_until_the_parent_completes() {
    let (endpoint, _worker_state) = spawn_fake_worker().await;
    let config = SchedulerConfig { enable_task_decomposition: true, ..SchedulerConfig::default() };
    let scheduler = Scheduler::new(config);
    scheduler.register_worker(descriptor("w1", &endpoint, 4, false)).await;

    let parent = Task::new(TaskId::from("p1"), "implement the widget", TaskCategory::Coding, TaskPriority::Normal);
    scheduler.submit_task(parent.clone()).await.unwrap();

    // first tick only dispatches the "plan" step; "execute" depends on it
    scheduler.tick_schedule().await;
    let queue_after_first_tick = scheduler.get_queue().await;
    assert!(queue_after_first_tick.iter().any(|t| t.id == TaskId::from("p1-execute")));

    let plan_result = poll_until_terminal(&scheduler, &TaskId::from("p1-plan")).await;
    assert_eq!(plan_result.status, TaskStatus::Completed);

    scheduler.tick_schedule().await;
    let execute_result = poll_until_terminal(&scheduler, &TaskId::from("p1-execute")).await;
    assert_eq!(execute_result.status, TaskStatus::Completed);

    let merged = poll_until_terminal(&scheduler, &parent.id).await;
    assert_eq!(merged.status, TaskStatus::Completed);
}

#[tokio::test]
async fn higher_priority_task_is_dispatched_before_lower_priority_ones() {
    let (endpoint, _worker_state) = spawn_fake_worker().await;
    let config = SchedulerConfig { strategy: LoadBalancingStrategy::LeastLoaded, ..SchedulerConfig::default() };
    let scheduler = Scheduler::new(config);
    scheduler.register_worker(descriptor("w1", &endpoint, 1, false)).await;

    let low = Task::new(TaskId::from("low"), "tidy up comments", TaskCategory::Coding, TaskPriority::Low);
    let critical = Task::new(TaskId::from("critical"), "fix the outage", TaskCategory::Coding, TaskPriority::Critical);
    scheduler.submit_task(low.clone()).await.unwrap();
    scheduler.submit_task(critical.clone()).await.unwrap();

    scheduler.tick_schedule().await;

    let remaining = scheduler.get_queue().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, low.id);
}

#[tokio::test]
async fn unregistering_a_worker_requeues_its_in_flight_task() {
    let (endpoint, _worker_state) = spawn_fake_worker().await;
    let scheduler = Scheduler::new(SchedulerConfig::default());
    scheduler.register_worker(descriptor("w1", &endpoint, 4, false)).await;

    let task = Task::new(TaskId::from("t1"), "run the build", TaskCategory::Coding, TaskPriority::Normal);
    scheduler.submit_task(task.clone()).await.unwrap();
    scheduler.tick_schedule().await;
    assert!(scheduler.get_queue().await.is_empty());

    scheduler.unregister_worker(&WorkerId::from("w1")).await.unwrap();

    let requeued = scheduler.get_queue().await;
    assert_eq!(requeued.len(), 1);
    assert_eq!(requeued[0].id, task.id);
    assert_eq!(scheduler.get_task_status(&task.id).await.unwrap(), TaskStatus::Pending);
}

#[tokio::test]
async fn expired_session_is_removed_on_sweep() {
    let (endpoint, _worker_state) = spawn_fake_worker().await;
    let scheduler = Scheduler::new(SchedulerConfig::default());
    scheduler.register_worker(descriptor("w1", &endpoint, 4, true)).await;

    let session = scheduler.create_session(SessionOptions { timeout_secs: Some(0), ..SessionOptions::default() }).await.unwrap();
    assert_eq!(scheduler.get_active_sessions().await.len(), 1);

    tokio::time::sleep(Duration::from_millis(10)).await;
    scheduler.tick_session_sweep().await;

    assert!(scheduler.get_active_sessions().await.is_empty());
    assert!(scheduler.get_session(&session.id).await.is_err());
}
