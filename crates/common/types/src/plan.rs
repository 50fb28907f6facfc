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

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{TaskId, WorkerId};

/// The immutable record of one scheduling decision: which worker got which
/// task, and why. Never mutated after creation; a retry produces a new plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionPlan {
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub estimated_duration_ms: Option<u64>,
    pub priority_score: u32,
    pub scheduled_at: DateTime<Utc>,
    pub dependencies: BTreeSet<TaskId>,
    pub retry_count: u32,
}

impl ExecutionPlan {
    #[must_use]
    pub fn new(
        task_id: TaskId,
        worker_id: WorkerId,
        priority_score: u32,
        dependencies: BTreeSet<TaskId>,
        retry_count: u32,
    ) -> Self {
        Self {
            task_id,
            worker_id,
            estimated_duration_ms: None,
            priority_score,
            scheduled_at: Utc::now(),
            dependencies,
            retry_count,
        }
    }
}

/// Strategy used to synthesize a decomposed parent task's result once all
/// its children reach a terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    #[default]
    Concat,
    Merge,
    Reduce,
    Custom,
}

/// Records a parent task split into children awaiting merge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PendingMerge {
    pub parent_id: TaskId,
    pub expected_child_ids: Vec<TaskId>,
    pub merge_strategy: MergeStrategy,
    #[serde(default)]
    pub received: BTreeSet<TaskId>,
}

impl PendingMerge {
    #[must_use]
    pub fn new(parent_id: TaskId, expected_child_ids: Vec<TaskId>, merge_strategy: MergeStrategy) -> Self {
        Self { parent_id, expected_child_ids, merge_strategy, received: BTreeSet::new() }
    }

    /// Records a child's terminal result. Returns `true` once every expected
    /// child has reported in, at which point the caller should synthesize
    /// the parent's result.
    pub fn record(&mut self, child_id: TaskId) -> bool {
        self.received.insert(child_id);
        self.expected_child_ids.iter().all(|id| self.received.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_merge_completes_once_all_children_report() {
        let mut merge = PendingMerge::new(
            TaskId::from("parent"),
            vec![TaskId::from("c1"), TaskId::from("c2")],
            MergeStrategy::Concat,
        );
        assert!(!merge.record(TaskId::from("c1")));
        assert!(merge.record(TaskId::from("c2")));
    }
}
