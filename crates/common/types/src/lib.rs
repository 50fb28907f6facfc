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

//! Shared domain model and wire types for the orchestration core.
//!
//! Every type here derives `serde::Serialize`/`Deserialize` with
//! `snake_case` field names and is meant to round-trip through JSON without
//! loss, since this crate is what the driver and worker HTTP surfaces speak
//! to each other and to clients.

mod error_kind;
mod ids;
mod plan;
mod progress;
mod result;
mod session;
mod size;
mod stats;
mod task;
mod wire;
mod worker;

pub use error_kind::{ErrorKind, TaskError};
pub use ids::{ArtifactId, SessionId, TaskId, WorkerId};
pub use plan::{ExecutionPlan, MergeStrategy, PendingMerge};
pub use progress::{Progress, ProgressRecord};
pub use result::{Artifact, ResourceUsage, TaskMetrics, TaskResult};
pub use session::{Session, SessionOptions, DEFAULT_SESSION_TIMEOUT_SECS};
pub use size::ReadableSize;
pub use stats::SchedulerStats;
pub use task::{ExecutionMode, ResourceLimits, Task, TaskCategory, TaskContext, TaskPriority, TaskStatus};
pub use wire::{
    ExecutorPoolStats, SessionCreated, SessionExecuteRequest, TaskAccepted, TaskOptions, TaskPollResponse,
    TaskSubmission, WorkerHealthReport,
};
pub use worker::{WorkerCapabilities, WorkerDescriptor, WorkerHealth, WorkerStatus};
