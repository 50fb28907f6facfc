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

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{SessionId, TaskId};

/// What kind of work a task represents. Drives `capability-based` worker
/// selection.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Coding,
    Analysis,
    Refactoring,
    Testing,
    Documentation,
    System,
}

/// Scheduling priority. Higher priorities jump ahead of lower ones within a
/// tick's sorted ready list; see `priority_weight`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Critical,
    High,
    Normal,
    Low,
    Background,
}

impl TaskPriority {
    /// Default priority weight used for sorting the ready list, overridable
    /// via scheduler config.
    #[must_use]
    pub const fn default_weight(self) -> u32 {
        match self {
            Self::Critical => 100,
            Self::High => 75,
            Self::Normal => 50,
            Self::Low => 25,
            Self::Background => 10,
        }
    }
}

/// Lifecycle status of a task, as seen by both the scheduler and the client.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Accepted,
    Running,
    Completed,
    Failed,
    Cancelled,
    Unknown,
}

impl TaskStatus {
    /// A terminal status never transitions further.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Which executor family should run a task: a reusable process, or a
/// one-shot isolated container.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRefStr, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    ProcessPool,
    ContainerAgentic,
}

/// Per-task resource caps passed through to whichever executor runs it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct ResourceLimits {
    /// Memory cap in bytes; `None` defers to the worker's configured default.
    pub memory_bytes: Option<u64>,
    /// CPU share, in fractional cores (e.g. `1.5`).
    pub cpu_cores: Option<f64>,
    /// Wall-clock timeout in seconds; `None` defers to `taskTimeout`.
    pub timeout_secs: Option<u64>,
}

/// Per-task execution context: everything the executor needs besides the
/// task's own title/description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct TaskContext {
    pub working_directory: Option<String>,
    pub repo_url: Option<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    pub resource_limits: Option<ResourceLimits>,
    /// When set, the task bypasses the queue and runs synchronously inside
    /// this session's container executor.
    pub session_id: Option<SessionId>,
    /// Explicit mode override; takes precedence over the worker's default.
    pub execution_mode: Option<ExecutionMode>,
    pub timeout_secs: Option<u64>,
    /// Opt out of the decomposition heuristic for a title that would
    /// otherwise match it. Defaults to `true` (decomposition allowed).
    #[serde(default = "default_allow_decomposition")]
    pub allow_decomposition: bool,
}

const fn default_allow_decomposition() -> bool { true }

impl TaskContext {
    #[must_use]
    pub fn new() -> Self { Self { allow_decomposition: true, ..Self::default() } }
}

/// A unit of work submitted to the driver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: TaskCategory,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    #[serde(default)]
    pub dependencies: BTreeSet<TaskId>,
    #[serde(default)]
    pub context: TaskContext,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Builds a freshly-submitted task in `pending` status, stamped with the
    /// current time for both `created_at` and `updated_at`.
    #[must_use]
    pub fn new(id: TaskId, title: impl Into<String>, category: TaskCategory, priority: TaskPriority) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            description: String::new(),
            category,
            priority,
            status: TaskStatus::Pending,
            dependencies: BTreeSet::new(),
            context: TaskContext::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies = dependencies.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: TaskContext) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_weights_match_defaults() {
        assert_eq!(TaskPriority::Critical.default_weight(), 100);
        assert_eq!(TaskPriority::Background.default_weight(), 10);
    }

    #[test]
    fn terminal_statuses_are_sticky() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn task_round_trips_through_json_with_snake_case_fields() {
        let task = Task::new(TaskId::from("t1"), "hello", TaskCategory::Coding, TaskPriority::Normal);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["category"], "coding");
        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn context_defaults_allow_decomposition() {
        assert!(TaskContext::new().allow_decomposition);
        let parsed: TaskContext = serde_json::from_str("{}").unwrap();
        assert!(parsed.allow_decomposition);
    }
}
