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

//! The driver process: a REST control plane over [`relay_scheduler::Scheduler`]
//! plus the background loops that keep it moving.
//!
//! [`DriverHandle::start`] binds the HTTP server and spawns the six
//! scheduling tasklets (`schedule`, `poll`, `health-check`, `session-sweep`,
//! `stats`, `checkpoint`) on a private [`LoopManager`]. Callers get back a
//! handle that can wait for startup and drive an orderly shutdown of both
//! the server and the tasklets.

mod routes;
mod ticks;

use std::sync::Arc;

use relay_common_worker::LoopManager;
use relay_scheduler::{Scheduler, SchedulerConfig};
use relay_server::{
    ServiceHandler,
    http::{RestServerConfig, start_rest_server},
};
use smart_default::SmartDefault;
use tracing::info;

pub use crate::ticks::TickIntervals;

/// Top-level configuration for one driver process.
#[derive(Clone, Debug, SmartDefault)]
pub struct DriverConfig {
    pub server: RestServerConfig,
    pub scheduler: SchedulerConfig,
}

/// A running driver: its HTTP server and its background scheduling loops.
pub struct DriverHandle {
    pub scheduler: Arc<Scheduler>,
    server: ServiceHandler,
    tasklets: LoopManager<()>,
}

impl DriverHandle {
    /// Builds the scheduler, binds the REST server and spawns the
    /// scheduling tasklets. Returns once the server has started accepting
    /// connections.
    pub async fn start(config: DriverConfig) -> relay_server::Result<Self> {
        let scheduler = Arc::new(Scheduler::new(config.scheduler.clone()));
        let router = routes::router(scheduler.clone());
        let mut server = start_rest_server(config.server, router).await?;
        server.wait_for_start().await?;

        let mut tasklets = LoopManager::<()>::new();
        let intervals = TickIntervals::from(&config.scheduler);
        ticks::spawn_ticks(&mut tasklets, scheduler.clone(), &intervals);

        info!("driver started");
        Ok(Self { scheduler, server, tasklets })
    }

    /// Signals the HTTP server and all scheduling tasklets to stop, then
    /// waits for both to finish.
    pub async fn shutdown(self) {
        self.server.shutdown();
        let _ = self.server.wait_for_stop().await;
        self.tasklets.shutdown().await;
        info!("driver stopped");
    }
}
