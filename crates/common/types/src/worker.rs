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
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{ExecutionMode, TaskCategory, TaskId, WorkerId};

/// A worker's availability as last observed by the driver.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Busy,
    Error,
    Offline,
}

impl WorkerStatus {
    /// Workers in one of these states are eligible for new assignments.
    #[must_use]
    pub const fn is_available(self) -> bool { matches!(self, Self::Idle | Self::Busy) }
}

/// What a worker declares it can do, advertised at registration time and
/// echoed back from `GET /capabilities`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerCapabilities {
    pub supported_categories: BTreeSet<TaskCategory>,
    pub max_concurrent_tasks: u32,
    pub supports_container_execution: bool,
    pub execution_modes: BTreeSet<ExecutionMode>,
}

impl WorkerCapabilities {
    #[must_use]
    pub fn supports_category(&self, category: TaskCategory) -> bool {
        self.supported_categories.contains(&category)
    }
}

/// Liveness signal, refreshed on every health-check poll.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerHealth {
    pub last_seen: DateTime<Utc>,
    pub response_time_ms: u64,
}

/// The driver's view of a registered worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerDescriptor {
    pub id: WorkerId,
    pub endpoint: String,
    pub status: WorkerStatus,
    pub capabilities: WorkerCapabilities,
    pub health: WorkerHealth,
    #[serde(default)]
    pub current_tasks: BTreeSet<TaskId>,
}

impl WorkerDescriptor {
    #[must_use]
    pub fn current_load(&self) -> u32 {
        u32::try_from(self.current_tasks.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn load_ratio(&self) -> f64 {
        if self.capabilities.max_concurrent_tasks == 0 {
            return 1.0;
        }
        f64::from(self.current_load()) / f64::from(self.capabilities.max_concurrent_tasks)
    }

    #[must_use]
    pub fn is_saturated(&self) -> bool { self.current_load() >= self.capabilities.max_concurrent_tasks }

    #[must_use]
    pub fn is_available(&self) -> bool { self.status.is_available() && !self.is_saturated() }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn descriptor(max: u32, current: usize) -> WorkerDescriptor {
        WorkerDescriptor {
            id: WorkerId::from("w1"),
            endpoint: "http://127.0.0.1:9000".into(),
            status: WorkerStatus::Idle,
            capabilities: WorkerCapabilities {
                supported_categories: BTreeSet::from([TaskCategory::Coding]),
                max_concurrent_tasks: max,
                supports_container_execution: false,
                execution_modes: BTreeSet::from([ExecutionMode::ProcessPool]),
            },
            health: WorkerHealth { last_seen: Utc::now(), response_time_ms: 10 },
            current_tasks: (0..current).map(|i| TaskId::from(format!("t{i}"))).collect(),
        }
    }

    #[test]
    fn saturated_worker_is_not_available() {
        let w = descriptor(2, 2);
        assert!(w.is_saturated());
        assert!(!w.is_available());
    }

    #[test]
    fn load_ratio_divides_current_by_capacity() {
        let w = descriptor(4, 1);
        assert!((w.load_ratio() - 0.25).abs() < f64::EPSILON);
    }
}
