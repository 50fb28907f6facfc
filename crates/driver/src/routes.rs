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

//! HTTP handlers for the driver's external surface (§6): task submission and
//! introspection, worker registration, session lifecycle, and scheduler
//! stats. All state lives behind the [`relay_scheduler::Scheduler`] passed in
//! as [`axum::extract::State`]; handlers are thin adapters over its public
//! methods.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use relay_error::{Result, ValidationSnafu};
use relay_scheduler::Scheduler;
use relay_types::{
    ProgressRecord, SchedulerStats, Session, SessionOptions, Task, TaskId, TaskResult, TaskStatus, WorkerDescriptor,
    WorkerId,
};
use serde::{Deserialize, Serialize};

pub fn router(scheduler: Arc<Scheduler>) -> Router {
    Router::new()
        .route("/tasks", post(submit_task).get(list_tasks))
        .route("/tasks/batch", post(submit_batch))
        .route("/tasks/{id}", get(get_task).delete(cancel_task))
        .route("/tasks/{id}/result", get(get_task_result))
        .route("/tasks/{id}/progress", get(get_task_progress))
        .route("/workers", post(register_worker).get(list_workers))
        .route("/workers/{id}", get(get_worker).delete(unregister_worker))
        .route("/workers/{id}/health", get(get_worker_health))
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/{id}", delete(end_session))
        .route("/driver", get(driver_summary))
        .route("/metrics", get(get_stats))
        .route("/stats", get(get_stats))
        .route("/scheduler/stats", get(get_stats))
        .route("/scheduler/queue", get(get_queue))
        .route("/scheduler/plans", get(get_plans))
        .route("/health", get(health))
        .route("/health/ready", get(health))
        .route("/health/live", get(health))
        .with_state(scheduler)
}

type AppState = State<Arc<Scheduler>>;

async fn submit_task(State(scheduler): AppState, Json(task): Json<Task>) -> Result<(StatusCode, Json<Task>)> {
    if task.title.trim().is_empty() {
        return ValidationSnafu { message: "task title must not be empty".to_string() }.fail();
    }
    let submitted = scheduler.submit_task(task).await?;
    let status = if submitted.status.is_terminal() { StatusCode::OK } else { StatusCode::ACCEPTED };
    Ok((status, Json(submitted)))
}

#[derive(Deserialize)]
pub struct BatchSubmission {
    tasks: Vec<Task>,
    #[serde(default = "default_parallel")]
    parallel: bool,
}

const fn default_parallel() -> bool { true }

#[derive(Serialize)]
struct BatchItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Submits many tasks in one call. `parallel=false` still submits each
/// asynchronously; it only forces the submissions themselves to happen one
/// at a time rather than concurrently, so an earlier duplicate-id failure
/// can't race a later one for the same id.
async fn submit_batch(State(scheduler): AppState, Json(body): Json<BatchSubmission>) -> (StatusCode, Json<Vec<BatchItem>>) {
    let mut items = Vec::with_capacity(body.tasks.len());
    if body.parallel {
        let futures = body.tasks.into_iter().map(|task| {
            let scheduler = scheduler.clone();
            async move { scheduler.submit_task(task).await }
        });
        for result in futures::future::join_all(futures).await {
            items.push(to_batch_item(result));
        }
    } else {
        for task in body.tasks {
            items.push(to_batch_item(scheduler.submit_task(task).await));
        }
    }
    (StatusCode::ACCEPTED, Json(items))
}

fn to_batch_item(result: Result<Task>) -> BatchItem {
    match result {
        Ok(task) => BatchItem { task: Some(task), error: None },
        Err(error) => BatchItem { task: None, error: Some(error.to_string()) },
    }
}

#[derive(Serialize)]
struct TaskListEntry {
    task_id: TaskId,
    status: TaskStatus,
}

async fn list_tasks(State(scheduler): AppState) -> Json<Vec<TaskListEntry>> {
    let queued = scheduler.get_queue().await;
    let entries = queued.into_iter().map(|t| TaskListEntry { task_id: t.id, status: t.status }).collect();
    Json(entries)
}

async fn get_task(State(scheduler): AppState, Path(id): Path<TaskId>) -> Result<Json<ProgressRecord>> {
    scheduler.get_task_progress(&id).await.map(Json)
}

async fn get_task_result(State(scheduler): AppState, Path(id): Path<TaskId>) -> Result<Json<TaskResult>> {
    scheduler.get_task_result(&id).await.map(Json)
}

async fn get_task_progress(State(scheduler): AppState, Path(id): Path<TaskId>) -> Result<Json<ProgressRecord>> {
    scheduler.get_task_progress(&id).await.map(Json)
}

async fn cancel_task(State(scheduler): AppState, Path(id): Path<TaskId>) -> Result<StatusCode> {
    scheduler.cancel_task(&id).await?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
pub struct RegisterWorkerRequest {
    worker: WorkerDescriptor,
}

async fn register_worker(State(scheduler): AppState, Json(body): Json<RegisterWorkerRequest>) -> (StatusCode, Json<WorkerDescriptor>) {
    scheduler.register_worker(body.worker.clone()).await;
    (StatusCode::CREATED, Json(body.worker))
}

async fn unregister_worker(State(scheduler): AppState, Path(id): Path<WorkerId>) -> Result<StatusCode> {
    scheduler.unregister_worker(&id).await?;
    Ok(StatusCode::OK)
}

async fn list_workers(State(scheduler): AppState) -> Json<Vec<WorkerDescriptor>> { Json(scheduler.get_workers().await) }

async fn get_worker(State(scheduler): AppState, Path(id): Path<WorkerId>) -> Result<Json<WorkerDescriptor>> {
    scheduler.get_worker(&id).await.map(Json)
}

async fn get_worker_health(State(scheduler): AppState, Path(id): Path<WorkerId>) -> Result<Json<WorkerDescriptor>> {
    scheduler.get_worker(&id).await.map(Json)
}

async fn create_session(State(scheduler): AppState, Json(options): Json<SessionOptions>) -> Result<(StatusCode, Json<Session>)> {
    let session = scheduler.create_session(options).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn list_sessions(State(scheduler): AppState) -> Json<Vec<Session>> { Json(scheduler.get_active_sessions().await) }

async fn end_session(State(scheduler): AppState, Path(id): Path<relay_types::SessionId>) -> Result<StatusCode> {
    scheduler.end_session(&id).await?;
    Ok(StatusCode::OK)
}

#[derive(Serialize)]
struct DriverSummary {
    stats: SchedulerStats,
    workers: usize,
    queued: usize,
}

async fn driver_summary(State(scheduler): AppState) -> Json<DriverSummary> {
    let stats = scheduler.get_stats().await;
    Json(DriverSummary { stats, workers: stats.total_workers as usize, queued: stats.queued_tasks as usize })
}

async fn get_stats(State(scheduler): AppState) -> Json<SchedulerStats> { Json(scheduler.get_stats().await) }

async fn get_queue(State(scheduler): AppState) -> Json<Vec<Task>> { Json(scheduler.get_queue().await) }

async fn get_plans(State(scheduler): AppState) -> Json<Vec<relay_types::ExecutionPlan>> { Json(scheduler.get_plans().await) }

async fn health() -> StatusCode { StatusCode::OK }

#[cfg(test)]
mod tests {
    use relay_scheduler::SchedulerConfig;
    use relay_types::{TaskCategory, TaskPriority, WorkerCapabilities, WorkerStatus};

    use super::*;

    /// Binds the driver router to an ephemeral port and returns its base url.
    async fn spawn() -> String {
        let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let app = router(scheduler);
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://127.0.0.1:{port}")
    }

    fn descriptor(id: &str) -> WorkerDescriptor {
        WorkerDescriptor {
            id: WorkerId::from(id),
            endpoint: "http://127.0.0.1:9".to_string(),
            status: WorkerStatus::Idle,
            capabilities: WorkerCapabilities {
                supported_categories: std::iter::once(TaskCategory::Coding).collect(),
                max_concurrent_tasks: 1,
                supports_container_execution: false,
                execution_modes: std::iter::once(relay_types::ExecutionMode::ProcessPool).collect(),
            },
            health: relay_types::WorkerHealth { last_seen: chrono::Utc::now(), response_time_ms: 0 },
            current_tasks: Default::default(),
        }
    }

    #[tokio::test]
    async fn submit_task_rejects_blank_title() {
        let endpoint = spawn().await;
        let task = Task::new(TaskId::from("t1"), "   ", TaskCategory::Coding, TaskPriority::Normal);
        let response = reqwest::Client::new().post(format!("{endpoint}/tasks")).json(&task).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn submit_task_queues_a_valid_task() {
        let endpoint = spawn().await;
        let task = Task::new(TaskId::from("t1"), "do the thing", TaskCategory::Coding, TaskPriority::Normal);
        let response = reqwest::Client::new().post(format!("{endpoint}/tasks")).json(&task).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let submitted: Task = response.json().await.unwrap();
        assert_eq!(submitted.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn register_then_list_workers_round_trips() {
        let endpoint = spawn().await;
        let client = reqwest::Client::new();
        let response = client.post(format!("{endpoint}/workers")).json(&RegisterWorkerRequest { worker: descriptor("w1") }).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let workers: Vec<WorkerDescriptor> = client.get(format!("{endpoint}/workers")).send().await.unwrap().json().await.unwrap();
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].id, WorkerId::from("w1"));
    }

    #[tokio::test]
    async fn unknown_worker_health_is_not_found() {
        let endpoint = spawn().await;
        let response = reqwest::get(format!("{endpoint}/workers/ghost/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let endpoint = spawn().await;
        let response = reqwest::get(format!("{endpoint}/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
