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

//! Process lifecycle for both relay roles: a driver (scheduler + control
//! plane) or a worker (execution provider + task surface). [`App::run`]
//! starts whichever role its [`AppConfig`] names and blocks until it
//! receives a shutdown signal (Ctrl+C, SIGTERM, or an explicit
//! [`AppHandle::shutdown`] call).

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use relay_driver::{DriverConfig, DriverHandle};
use relay_worker::{WorkerConfig, WorkerHandle};
use snafu::{ResultExt, Whatever};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Which role this process plays, and that role's configuration.
pub enum RoleConfig {
    Driver(DriverConfig),
    Worker(WorkerConfig),
}

/// Top-level configuration for one relay process.
pub struct AppConfig {
    pub role: RoleConfig,
    pub enable_graceful_shutdown: bool,
}

impl AppConfig {
    #[must_use]
    pub fn driver(config: DriverConfig) -> Self { Self { role: RoleConfig::Driver(config), enable_graceful_shutdown: true } }

    #[must_use]
    pub fn worker(config: WorkerConfig) -> Self { Self { role: RoleConfig::Worker(config), enable_graceful_shutdown: true } }

    #[must_use]
    pub fn without_graceful_shutdown(mut self) -> Self {
        self.enable_graceful_shutdown = false;
        self
    }
}

enum RunningRole {
    Driver(DriverHandle),
    Worker(WorkerHandle),
}

impl RunningRole {
    async fn shutdown(self) {
        match self {
            Self::Driver(handle) => handle.shutdown().await,
            Self::Worker(handle) => handle.shutdown().await,
        }
    }
}

/// Represents the running process, owning the role handle until shutdown.
pub struct App {
    pub config: AppConfig,
    running: Arc<AtomicBool>,
    cancellation_token: CancellationToken,
}

/// Handle for controlling a running application from outside its own task.
pub struct AppHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    running: Arc<AtomicBool>,
    cancellation_token: CancellationToken,
}

impl AppHandle {
    /// Gracefully shuts the application down: stops the role's server,
    /// cancels its background loops, and unblocks `wait_for_shutdown`.
    pub fn shutdown(&mut self) {
        info!("initiating graceful shutdown");
        self.running.store(false, Ordering::SeqCst);
        self.cancellation_token.cancel();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool { self.running.load(Ordering::SeqCst) }

    pub async fn wait_for_shutdown(&self) { self.cancellation_token.cancelled().await; }
}

impl App {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self { config, running: Arc::new(AtomicBool::new(false)), cancellation_token: CancellationToken::new() }
    }

    pub async fn start(self) -> Result<AppHandle, Whatever> {
        let role_name = match &self.config.role {
            RoleConfig::Driver(_) => "driver",
            RoleConfig::Worker(_) => "worker",
        };
        let _guards = relay_common_telemetry::init_tracing_subscriber(&format!("relay-{role_name}"));
        info!(role = role_name, "starting relay process");

        self.running.store(true, Ordering::SeqCst);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = AppHandle {
            shutdown_tx: Some(shutdown_tx),
            running: Arc::clone(&self.running),
            cancellation_token: self.cancellation_token.clone(),
        };

        let role = match self.config.role {
            RoleConfig::Driver(config) => RunningRole::Driver(DriverHandle::start(config).await.whatever_context("failed to start driver")?),
            RoleConfig::Worker(config) => RunningRole::Worker(WorkerHandle::start(config).await.whatever_context("failed to start worker")?),
        };

        info!("relay process started");

        let running = Arc::clone(&self.running);
        let cancellation_token = self.cancellation_token.clone();
        let enable_graceful_shutdown = self.config.enable_graceful_shutdown;

        tokio::spawn(async move {
            if enable_graceful_shutdown {
                shutdown_signal(shutdown_rx).await;
            } else {
                let _ = shutdown_rx.await;
            }

            running.store(false, Ordering::SeqCst);
            cancellation_token.cancel();

            info!("shutting down role");
            role.shutdown().await;
            info!("relay process shutdown complete");
        });

        Ok(handle)
    }

    /// Runs the configured role, blocking until it's shut down.
    pub async fn run(self) -> Result<(), Whatever> {
        let handle = self.start().await?;
        handle.wait_for_shutdown().await;
        Ok(())
    }
}

async fn shutdown_signal(shutdown_rx: oneshot::Receiver<()>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received Ctrl+C signal"); },
        () = terminate => { info!("received terminate signal"); },
        _ = shutdown_rx => { info!("received shutdown signal"); },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use relay_server::http::RestServerConfig;
    use relay_types::WorkerCapabilities;
    use relay_worker::WorkerConfig;

    use super::*;

    #[tokio::test]
    async fn worker_role_starts_and_shuts_down_cleanly() {
        let config = WorkerConfig {
            id: relay_types::WorkerId::generate(),
            server: RestServerConfig { bind_address: "127.0.0.1:0".to_string(), ..Default::default() },
            provider: relay_executor::ProviderConfig { default_mode: relay_types::ExecutionMode::ProcessPool, process_pool: None, container: None, max_processes: 0, max_containers: 0 },
            capabilities: WorkerCapabilities {
                supported_categories: BTreeSet::new(),
                max_concurrent_tasks: 1,
                supports_container_execution: false,
                execution_modes: BTreeSet::from([relay_types::ExecutionMode::ProcessPool]),
            },
        };

        let app = App::new(AppConfig::worker(config).without_graceful_shutdown());
        let mut handle = app.start().await.unwrap();
        assert!(handle.is_running());
        handle.shutdown();
        handle.wait_for_shutdown().await;
        assert!(!handle.is_running());
    }
}
