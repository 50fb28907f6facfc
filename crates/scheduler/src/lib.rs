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

//! The driver's scheduling core: queueing, worker/session selection,
//! decomposition and merge, and the worker-facing HTTP client.
//!
//! [`Scheduler`] owns all mutable state behind a single lock and exposes two
//! kinds of methods: request/response operations called from the driver's
//! HTTP handlers (`submit_task`, `cancel_task`, `create_session`, ...) and
//! `tick_*` methods a background loop drives on its own interval
//! (`tick_schedule`, `tick_poll`, `tick_health_check`, `tick_session_sweep`,
//! `tick_stats`, `tick_checkpoint`). Callers observe state changes either by
//! polling the getters or by subscribing to [`SchedulerEvent`].

mod checkpoint;
mod client;
mod config;
mod decompose;
mod registry;
mod scheduler;
mod session;
mod types;

pub use checkpoint::Checkpoint;
pub use client::WorkerClient;
pub use config::{LoadBalancingStrategy, SchedulerConfig};
pub use registry::WorkerRegistry;
pub use scheduler::{Scheduler, SchedulerEvent};
pub use session::SessionRegistry;
pub use types::{ExecutionContext, QueuedTask};
