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
use relay_types::{Progress, Task, TaskId, TaskStatus, WorkerId};

/// A task sitting in the scheduler's queue, not yet terminal. Lives only on
/// the driver; never serialized to a worker.
#[derive(Clone, Debug, PartialEq)]
pub struct QueuedTask {
    pub task: Task,
    pub queued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub assigned_worker: Option<WorkerId>,
}

impl QueuedTask {
    #[must_use]
    pub fn new(task: Task) -> Self {
        Self { task, queued_at: Utc::now(), retry_count: 0, last_attempt: None, assigned_worker: None }
    }

    /// A queued task is ready once it's unassigned, every dependency has
    /// resolved to `completed`, and its retry cooldown (if any) has elapsed.
    #[must_use]
    pub fn is_ready(&self, completed: &impl Fn(&TaskId) -> bool, retry_delay: chrono::Duration, now: DateTime<Utc>) -> bool {
        if self.assigned_worker.is_some() {
            return false;
        }
        if !self.task.dependencies.iter().all(completed) {
            return false;
        }
        match self.last_attempt {
            Some(last) => now - last >= retry_delay,
            None => true,
        }
    }
}

/// One task currently dispatched to a worker; tracks what the driver has
/// observed on its last poll. Keeps a copy of the dispatched `Task` so a
/// worker loss can requeue it without re-deriving its fields from scratch.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionContext {
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub task: Task,
    pub retry_count: u32,
    pub start_time: DateTime<Utc>,
    pub progress: Progress,
    pub status: TaskStatus,
}

impl ExecutionContext {
    #[must_use]
    pub fn new(task: Task, worker_id: WorkerId, retry_count: u32) -> Self {
        Self {
            task_id: task.id.clone(),
            worker_id,
            task,
            retry_count,
            start_time: Utc::now(),
            progress: Progress::ZERO,
            status: TaskStatus::Running,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use relay_types::{TaskCategory, TaskPriority};

    use super::*;

    #[test]
    fn ready_requires_all_dependencies_completed() {
        let task = Task::new(TaskId::from("t2"), "x", TaskCategory::Coding, TaskPriority::Normal)
            .with_dependencies(BTreeSet::from([TaskId::from("t1")]));
        let queued = QueuedTask::new(task);
        assert!(!queued.is_ready(&|_| false, chrono::Duration::seconds(30), Utc::now()));
        assert!(queued.is_ready(&|_| true, chrono::Duration::seconds(30), Utc::now()));
    }

    #[test]
    fn ready_respects_retry_cooldown() {
        let task = Task::new(TaskId::from("t1"), "x", TaskCategory::Coding, TaskPriority::Normal);
        let mut queued = QueuedTask::new(task);
        queued.last_attempt = Some(Utc::now());
        assert!(!queued.is_ready(&|_| true, chrono::Duration::seconds(30), Utc::now()));
        let later = Utc::now() + chrono::Duration::seconds(31);
        assert!(queued.is_ready(&|_| true, chrono::Duration::seconds(30), later));
    }

    #[test]
    fn assigned_task_is_never_ready() {
        let task = Task::new(TaskId::from("t1"), "x", TaskCategory::Coding, TaskPriority::Normal);
        let mut queued = QueuedTask::new(task);
        queued.assigned_worker = Some(WorkerId::from("w1"));
        assert!(!queued.is_ready(&|_| true, chrono::Duration::seconds(30), Utc::now()));
    }

    #[test]
    fn execution_context_starts_at_zero_progress() {
        let task = Task::new(TaskId::from("t1"), "x", TaskCategory::Coding, TaskPriority::Normal);
        let ctx = ExecutionContext::new(task, WorkerId::from("w1"), 0);
        assert_eq!(ctx.status, TaskStatus::Running);
        assert_eq!(ctx.progress, Progress::ZERO);
    }
}
