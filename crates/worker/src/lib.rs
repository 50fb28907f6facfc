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

//! The worker process: a REST surface over [`relay_executor::ExecutionProvider`].
//!
//! A worker never decides what to run next — it only accepts what the
//! driver hands it, runs it on a process-pool or container executor, and
//! reports status back on poll. [`WorkerHandle::start`] binds the HTTP
//! server and returns a handle for orderly shutdown, mirroring
//! `relay-driver`'s `DriverHandle`.

mod routes;
mod state;

use std::sync::Arc;

use relay_error::Result as RelayResult;
use relay_executor::{ExecutionProvider, ProviderConfig};
use relay_server::{
    ServiceHandler,
    http::{RestServerConfig, start_rest_server},
};
use relay_types::{WorkerCapabilities, WorkerId};

pub use crate::state::WorkerState;

/// Configuration for one worker process.
pub struct WorkerConfig {
    pub id: WorkerId,
    pub server: RestServerConfig,
    pub provider: ProviderConfig,
    pub capabilities: WorkerCapabilities,
}

/// A running worker: its HTTP server and the execution provider backing it.
pub struct WorkerHandle {
    pub state: Arc<WorkerState>,
    server: ServiceHandler,
}

impl WorkerHandle {
    pub async fn start(config: WorkerConfig) -> relay_server::Result<Self> {
        let bind_address = config.server.bind_address.clone();
        let docker = bollard::Docker::connect_with_local_defaults().ok();
        let provider = ExecutionProvider::new(config.provider, docker);
        let state = Arc::new(WorkerState::new(config.id, format!("http://{bind_address}"), config.capabilities, provider));

        let router = routes::router(state.clone());
        let mut server = start_rest_server(config.server, router).await?;
        server.wait_for_start().await?;
        Ok(Self { state, server })
    }

    /// Signals the HTTP server to stop and drains the process-pool executor.
    pub async fn shutdown(self) {
        self.server.shutdown();
        let _ = self.server.wait_for_stop().await;
        self.state.provider.cleanup().await;
    }
}

/// Exercised by integration tests that want the worker's health contract
/// without going through HTTP.
pub async fn health_report(state: &WorkerState) -> RelayResult<relay_types::WorkerHealthReport> {
    Ok(relay_types::WorkerHealthReport {
        status: if state.provider.is_healthy() { relay_types::WorkerStatus::Idle } else { relay_types::WorkerStatus::Error },
        active_tasks: state.active_count().await,
        executor_pool: relay_types::ExecutorPoolStats::default(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        resource_usage: relay_types::ResourceUsage::default(),
    })
}
