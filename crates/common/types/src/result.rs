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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ArtifactId, TaskId, TaskStatus};

/// A file produced in a task's workspace, captured after execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Artifact {
    pub id: ArtifactId,
    pub artifact_type: String,
    pub name: String,
    pub relative_path: String,
    pub size_bytes: u64,
    /// Hex-encoded content hash, stable across identical content.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub mime_type: Option<String>,
}

/// Resources consumed while a task ran, as observed by its executor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct ResourceUsage {
    pub peak_memory_bytes: Option<u64>,
    pub cpu_time_ms: Option<u64>,
}

/// Timing and resource accounting for one task execution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TaskMetrics {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub resource_usage: Option<ResourceUsage>,
}

impl TaskMetrics {
    #[must_use]
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self { start_time, end_time, duration_ms: (end_time - start_time).num_milliseconds(), resource_usage: None }
    }
}

/// The immutable outcome of a terminal task. Written exactly once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TaskResult {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    pub metrics: TaskMetrics,
    /// Present iff `status == failed`; the stable error kind, see `relay-error`.
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

impl TaskResult {
    #[must_use]
    pub fn completed(task_id: TaskId, output: impl Into<String>, metrics: TaskMetrics) -> Self {
        Self {
            task_id,
            status: TaskStatus::Completed,
            output: output.into(),
            artifacts: Vec::new(),
            metrics,
            error_kind: None,
            error_message: None,
        }
    }

    #[must_use]
    pub fn failed(task_id: TaskId, kind: impl Into<String>, message: impl Into<String>, metrics: TaskMetrics) -> Self {
        Self {
            task_id,
            status: TaskStatus::Failed,
            output: String::new(),
            artifacts: Vec::new(),
            metrics,
            error_kind: Some(kind.into()),
            error_message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn cancelled(task_id: TaskId, metrics: TaskMetrics) -> Self {
        Self {
            task_id,
            status: TaskStatus::Cancelled,
            output: String::new(),
            artifacts: Vec::new(),
            metrics,
            error_kind: None,
            error_message: None,
        }
    }

    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Vec<Artifact>) -> Self {
        self.artifacts = artifacts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_compute_duration() {
        let start = Utc::now();
        let end = start + chrono::Duration::milliseconds(250);
        let metrics = TaskMetrics::new(start, end);
        assert_eq!(metrics.duration_ms, 250);
    }

    #[test]
    fn failed_result_carries_error_kind() {
        let metrics = TaskMetrics::new(Utc::now(), Utc::now());
        let result = TaskResult::failed(TaskId::from("t1"), "timed-out", "exceeded taskTimeout", metrics);
        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.error_kind.as_deref(), Some("timed-out"));
    }
}
