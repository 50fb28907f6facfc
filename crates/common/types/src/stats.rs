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

use serde::{Deserialize, Serialize};

/// Aggregated counters and rates, recomputed on the stats-update interval
/// (~10s) and exposed via `GET /stats` and `GET /scheduler/stats`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerStats {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub running_tasks: u64,
    pub queued_tasks: u64,
    pub total_workers: u64,
    pub available_workers: u64,
    pub average_task_duration_ms: f64,
    pub success_rate: f64,
    /// Completed tasks per second over the trailing window.
    pub throughput: f64,
    pub uptime_secs: u64,
    pub active_sessions: u64,
    pub total_sessions: u64,
    pub expired_sessions: u64,
}

impl SchedulerStats {
    #[must_use]
    pub fn recompute_rates(mut self) -> Self {
        let resolved = self.completed_tasks + self.failed_tasks;
        self.success_rate = if resolved == 0 { 0.0 } else { self.completed_tasks as f64 / resolved as f64 };
        self
    }
}
