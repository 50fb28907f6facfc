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

use std::time::Duration;

use relay_error::{Error, InternalSnafu, NotFoundSnafu, Result};
use relay_types::{
    SessionCreated, SessionExecuteRequest, SessionId, Task, TaskAccepted, TaskId, TaskOptions, TaskPollResponse,
    TaskSubmission, WorkerHealthReport,
};

/// Talks the worker-facing HTTP contract (`/tasks`, `/sessions`, `/health`)
/// on behalf of the scheduler. One client is shared across every worker;
/// `endpoint` is passed per call rather than baked into the client.
#[derive(Clone)]
pub struct WorkerClient {
    http: reqwest::Client,
}

impl WorkerClient {
    #[must_use]
    pub fn new(request_timeout: Duration) -> Self {
        Self { http: reqwest::Client::builder().timeout(request_timeout).build().unwrap_or_default() }
    }

    pub async fn submit_task(&self, endpoint: &str, task: &Task, options: TaskOptions) -> Result<TaskAccepted> {
        let body = TaskSubmission { task: task.clone(), options };
        self.post(&format!("{endpoint}/tasks"), &body).await
    }

    pub async fn poll_task(&self, endpoint: &str, task_id: &TaskId) -> Result<TaskPollResponse> {
        self.get(&format!("{endpoint}/tasks/{task_id}")).await
    }

    pub async fn cancel_task(&self, endpoint: &str, task_id: &TaskId) -> Result<()> {
        self.delete(&format!("{endpoint}/tasks/{task_id}")).await
    }

    pub async fn create_session(&self, endpoint: &str) -> Result<SessionCreated> {
        self.post(&format!("{endpoint}/sessions"), &()).await
    }

    /// Session-bound execution is synchronous from the driver's point of
    /// view: the worker runs the task in its session's container and the
    /// response body already carries the terminal outcome.
    pub async fn execute_in_session(
        &self,
        endpoint: &str,
        session_id: &SessionId,
        task: &Task,
        options: TaskOptions,
    ) -> Result<TaskPollResponse> {
        let body = SessionExecuteRequest { task: task.clone(), options };
        self.post(&format!("{endpoint}/sessions/{session_id}/execute"), &body).await
    }

    pub async fn end_session(&self, endpoint: &str, session_id: &SessionId) -> Result<()> {
        self.delete(&format!("{endpoint}/sessions/{session_id}")).await
    }

    pub async fn health(&self, endpoint: &str) -> Result<WorkerHealthReport> {
        self.get(&format!("{endpoint}/health")).await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.http.get(url).send().await.map_err(|e| Error::internal(e.to_string()))?;
        Self::parse(response).await
    }

    async fn post<T: serde::de::DeserializeOwned, B: serde::Serialize>(&self, url: &str, body: &B) -> Result<T> {
        let response = self.http.post(url).json(body).send().await.map_err(|e| Error::internal(e.to_string()))?;
        Self::parse(response).await
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let response = self.http.delete(url).send().await.map_err(|e| Error::internal(e.to_string()))?;
        if response.status().is_success() {
            return Ok(());
        }
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return NotFoundSnafu { resource: "resource", id: url.to_string() }.fail();
        }
        InternalSnafu { message: format!("worker returned {}", response.status()) }.fail()
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            let url = response.url().to_string();
            return NotFoundSnafu { resource: "resource", id: url }.fail();
        }
        if !response.status().is_success() {
            let status = response.status();
            return InternalSnafu { message: format!("worker returned {status}") }.fail();
        }
        response.json::<T>().await.map_err(|e| Error::internal(format!("malformed worker response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, routing::get};
    use relay_types::{TaskCategory, TaskPriority, TaskStatus};

    use super::*;

    async fn spawn_fake_worker() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let router = Router::new().route(
            "/tasks/{id}",
            get(|| async {
                Json(TaskPollResponse {
                    task_id: TaskId::from("t1"),
                    status: TaskStatus::Running,
                    progress: relay_types::Progress::ZERO,
                    current_step: None,
                    output: None,
                    artifacts: None,
                    error: None,
                    metadata: Default::default(),
                })
            }),
        );
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://127.0.0.1:{port}")
    }

    #[tokio::test]
    async fn poll_task_deserializes_worker_response() {
        let endpoint = spawn_fake_worker().await;
        let client = WorkerClient::new(Duration::from_secs(5));
        let response = client.poll_task(&endpoint, &TaskId::from("t1")).await.unwrap();
        assert_eq!(response.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn unreachable_route_surfaces_as_not_found() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let router = Router::new();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        let endpoint = format!("http://127.0.0.1:{port}");

        let client = WorkerClient::new(Duration::from_secs(5));
        let err = client.poll_task(&endpoint, &TaskId::from("t1")).await.unwrap_err();
        assert_eq!(err.kind(), relay_types::ErrorKind::NotFound);
    }

    #[test]
    fn task_submission_carries_supplied_options() {
        let task = Task::new(TaskId::from("t1"), "title", TaskCategory::Coding, TaskPriority::Normal);
        let submission = TaskSubmission { task, options: TaskOptions { execution_mode: Some(relay_types::ExecutionMode::ContainerAgentic) } };
        assert_eq!(submission.options.execution_mode, Some(relay_types::ExecutionMode::ContainerAgentic));
    }
}
