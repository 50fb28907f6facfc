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

//! Wire DTOs for the worker-facing HTTP surface (`POST /tasks`,
//! `GET /tasks/{id}`, `POST /sessions`, `POST /sessions/{id}/execute`,
//! `GET /health`). These are the shapes the driver's scheduler sends and
//! parses on one side and a worker's HTTP handlers accept and produce on the
//! other, so both sides import them from here rather than keeping two
//! independently-drifting copies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Artifact, ExecutionMode, Progress, ResourceUsage, SessionId, Task, TaskError, TaskId, TaskStatus, WorkerStatus};

/// Per-call override accompanying a task submission or session-execute
/// request. Distinct from `TaskContext`, which travels inside the task
/// itself; this only ever carries a mode override supplied by the caller at
/// dispatch time rather than at task-authoring time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct TaskOptions {
    pub execution_mode: Option<ExecutionMode>,
}

/// Body of `POST /tasks`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TaskSubmission {
    pub task: Task,
    #[serde(default)]
    pub options: TaskOptions,
}

/// Response to `POST /tasks`: 202 `{taskId, status: accepted}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TaskAccepted {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

/// Response to `GET /tasks/{id}` on the worker: the driver's poll loop reads
/// this every ~2s cadence while a task is in flight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TaskPollResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub progress: Progress,
    pub current_step: Option<String>,
    pub output: Option<String>,
    pub artifacts: Option<Vec<Artifact>>,
    pub error: Option<TaskError>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Response to `POST /sessions`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionCreated {
    pub session_id: SessionId,
    pub endpoint: String,
}

/// Body of `POST /sessions/{id}/execute`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionExecuteRequest {
    pub task: Task,
    #[serde(default)]
    pub options: TaskOptions,
}

/// Executor pool occupancy, embedded in `GET /health`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct ExecutorPoolStats {
    pub active: u32,
    pub idle: u32,
}

/// Body of `GET /health`: health payload (status, active task count,
/// executor pool stats, uptime, resource usage).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerHealthReport {
    pub status: WorkerStatus,
    pub active_tasks: u32,
    pub executor_pool: ExecutorPoolStats,
    pub uptime_secs: u64,
    pub resource_usage: ResourceUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_poll_response_round_trips_with_optional_fields_absent() {
        let response = TaskPollResponse {
            task_id: TaskId::from("t1"),
            status: TaskStatus::Running,
            progress: Progress::new(0.4),
            current_step: Some("executing".to_string()),
            output: None,
            artifacts: None,
            error: None,
            metadata: BTreeMap::new(),
        };
        let json = serde_json::to_string(&response).unwrap();
        let back: TaskPollResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, response);
    }
}
