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

//! HTTP handlers matching the driver's [`relay_scheduler::WorkerClient`]
//! contract exactly: submit/poll/cancel a task, open/execute/close a
//! session, report health and capabilities.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use relay_error::{DuplicateTaskSnafu, ModeUnsupportedSnafu, NotFoundSnafu, Result};
use relay_types::{
    ExecutorPoolStats, SessionCreated, SessionExecuteRequest, SessionId, TaskAccepted, TaskId, TaskPollResponse,
    TaskStatus, TaskSubmission, WorkerCapabilities, WorkerHealthReport, WorkerStatus,
};

use crate::state::WorkerState;

pub fn router(state: Arc<WorkerState>) -> Router {
    Router::new()
        .route("/tasks", post(submit_task))
        .route("/tasks/{id}", get(poll_task).delete(cancel_task))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}/execute", post(execute_in_session))
        .route("/sessions/{id}", delete(end_session))
        .route("/health", get(health))
        .route("/capabilities", get(capabilities))
        .with_state(state)
}

type AppState = State<Arc<WorkerState>>;

async fn submit_task(State(state): AppState, Json(body): Json<TaskSubmission>) -> Result<(StatusCode, Json<TaskAccepted>)> {
    let TaskSubmission { task, options } = body;
    if state.is_active(&task.id).await {
        return DuplicateTaskSnafu { task_id: task.id.to_string() }.fail();
    }
    let task_id = task.id.clone();
    state.spawn_task(task, options.execution_mode).await;
    Ok((StatusCode::ACCEPTED, Json(TaskAccepted { task_id, status: TaskStatus::Accepted })))
}

async fn poll_task(State(state): AppState, Path(id): Path<TaskId>) -> Result<Json<TaskPollResponse>> {
    let record = state.get_task(&id).await.ok_or_else(|| NotFoundSnafu { resource: "task", id: id.to_string() }.build())?;
    let (output, artifacts, error) = match &record.result {
        Some(result) => (
            Some(result.output.clone()),
            Some(result.artifacts.clone()),
            result.error_kind.as_ref().map(|kind| relay_types::TaskError::new(kind.parse().unwrap_or(relay_types::ErrorKind::Internal), result.error_message.clone().unwrap_or_default())),
        ),
        None => (None, None, None),
    };
    Ok(Json(TaskPollResponse {
        task_id: id,
        status: record.status,
        progress: record.progress,
        current_step: record.current_step,
        output,
        artifacts,
        error,
        metadata: Default::default(),
    }))
}

async fn cancel_task(State(state): AppState, Path(id): Path<TaskId>) -> Result<StatusCode> {
    if state.cancel_task(&id).await {
        return Ok(StatusCode::OK);
    }
    NotFoundSnafu { resource: "task", id: id.to_string() }.fail()
}

async fn create_session(State(state): AppState) -> Result<(StatusCode, Json<SessionCreated>)> {
    if !state.capabilities.supports_container_execution {
        return ModeUnsupportedSnafu { worker_id: state.id.to_string(), mode: "container_agentic".to_string() }.fail();
    }
    let session_id = SessionId::generate();
    state.open_session(session_id.clone()).await?;
    Ok((StatusCode::CREATED, Json(SessionCreated { session_id, endpoint: state.endpoint.clone() })))
}

async fn execute_in_session(
    State(state): AppState,
    Path(id): Path<SessionId>,
    Json(body): Json<SessionExecuteRequest>,
) -> Result<Json<TaskPollResponse>> {
    let SessionExecuteRequest { task, options } = body;
    let task_id = task.id.clone();
    let result = state.execute_in_session(&id, &task, options.execution_mode).await?;
    Ok(Json(TaskPollResponse {
        task_id,
        status: result.status,
        progress: relay_types::Progress::COMPLETE,
        current_step: None,
        output: Some(result.output),
        artifacts: Some(result.artifacts),
        error: result.error_kind.map(|kind| relay_types::TaskError::new(kind.parse().unwrap_or(relay_types::ErrorKind::Internal), result.error_message.unwrap_or_default())),
        metadata: Default::default(),
    }))
}

async fn end_session(State(state): AppState, Path(id): Path<SessionId>) -> Result<StatusCode> {
    if state.close_session(&id).await {
        return Ok(StatusCode::OK);
    }
    NotFoundSnafu { resource: "session", id: id.to_string() }.fail()
}

async fn health(State(state): AppState) -> Json<WorkerHealthReport> {
    let active = state.active_count().await;
    let status = if !state.provider.is_healthy() { WorkerStatus::Error } else if active >= state.capabilities.max_concurrent_tasks { WorkerStatus::Busy } else { WorkerStatus::Idle };
    Json(WorkerHealthReport {
        status,
        active_tasks: active,
        executor_pool: ExecutorPoolStats { active, idle: state.capabilities.max_concurrent_tasks.saturating_sub(active) },
        uptime_secs: state.started_at.elapsed().as_secs(),
        resource_usage: relay_types::ResourceUsage::default(),
    })
}

async fn capabilities(State(state): AppState) -> Json<WorkerCapabilities> { Json(state.capabilities.clone()) }

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, time::Duration};

    use relay_executor::{ExecutionProvider, ProcessPoolConfig, ProviderConfig};
    use relay_types::{ExecutionMode, Task, TaskCategory, TaskPriority, WorkerId};

    use super::*;

    fn unrunnable_capabilities() -> WorkerCapabilities {
        WorkerCapabilities {
            supported_categories: BTreeSet::from([TaskCategory::Coding]),
            max_concurrent_tasks: 2,
            supports_container_execution: false,
            execution_modes: BTreeSet::from([ExecutionMode::ProcessPool]),
        }
    }

    async fn spawn() -> String {
        let provider_config = ProviderConfig {
            default_mode: ExecutionMode::ProcessPool,
            process_pool: Some(ProcessPoolConfig { command: "relay-cmd-does-not-exist".to_string(), ..Default::default() }),
            container: None,
            max_processes: 2,
            max_containers: 0,
        };
        let provider = ExecutionProvider::new(provider_config, None);
        let state = Arc::new(WorkerState::new(WorkerId::from("w1"), "http://127.0.0.1:0".to_string(), unrunnable_capabilities(), provider));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let app = router(state);
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://127.0.0.1:{port}")
    }

    #[tokio::test]
    async fn submit_task_eventually_fails_when_the_command_cannot_be_spawned() {
        let endpoint = spawn().await;
        let task = Task::new(TaskId::from("t1"), "do the thing", TaskCategory::Coding, TaskPriority::Normal);
        let client = reqwest::Client::new();
        let response = client
            .post(format!("{endpoint}/tasks"))
            .json(&TaskSubmission { task: task.clone(), options: relay_types::TaskOptions::default() })
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        for _ in 0..50 {
            let poll: TaskPollResponse = client.get(format!("{endpoint}/tasks/{}", task.id)).send().await.unwrap().json().await.unwrap();
            if poll.status == TaskStatus::Failed {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("task never reached a terminal failed status");
    }

    #[tokio::test]
    async fn poll_unknown_task_is_not_found() {
        let endpoint = spawn().await;
        let response = reqwest::get(format!("{endpoint}/tasks/ghost")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_unknown_task_is_not_found() {
        let endpoint = spawn().await;
        let response = reqwest::Client::new().delete(format!("{endpoint}/tasks/ghost")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_session_without_container_support_fails() {
        let endpoint = spawn().await;
        let response = reqwest::Client::new().post(format!("{endpoint}/sessions")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_and_capabilities_reflect_worker_state() {
        let endpoint = spawn().await;
        let health: WorkerHealthReport = reqwest::get(format!("{endpoint}/health")).await.unwrap().json().await.unwrap();
        assert_eq!(health.active_tasks, 0);

        let capabilities: WorkerCapabilities = reqwest::get(format!("{endpoint}/capabilities")).await.unwrap().json().await.unwrap();
        assert_eq!(capabilities.max_concurrent_tasks, 2);
    }
}
