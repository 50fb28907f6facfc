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

use clap::{Args, Parser, Subcommand};
use relay_app::{App, AppConfig};
use relay_driver::DriverConfig;
use relay_executor::ProviderConfig as ExecutorProviderConfig;
use relay_server::http::RestServerConfig;
use relay_types::{ExecutionMode, TaskCategory, WorkerCapabilities, WorkerId};
use relay_worker::WorkerConfig;
use snafu::{ResultExt, Whatever};

mod build_info;

#[derive(Debug, Parser)]
#[clap(name = "relay", about = "relay-cmd", author = build_info::AUTHOR, version = build_info::FULL_VERSION)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start a driver process: the scheduler and its REST control plane.
    Driver(DriverArgs),
    /// Start a worker process: a task execution surface over a process pool
    /// or container runtime.
    Worker(WorkerArgs),
    /// Submit a task to a running driver and print its assigned id.
    Submit(SubmitArgs),
    /// Print a running driver's scheduler stats, or one task's status.
    Status(StatusArgs),
}

#[derive(Debug, Clone, Args)]
struct DriverArgs {
    #[arg(long, default_value = "127.0.0.1:7000")]
    bind: String,
}

impl DriverArgs {
    async fn run(&self) -> Result<(), Whatever> {
        let config = DriverConfig { server: RestServerConfig { bind_address: self.bind.clone(), ..Default::default() }, ..Default::default() };
        App::new(AppConfig::driver(config)).run().await
    }
}

#[derive(Debug, Clone, Args)]
struct WorkerArgs {
    #[arg(long, default_value = "127.0.0.1:7100")]
    bind: String,
    #[arg(long)]
    id: Option<String>,
    /// Command to run for process-mode tasks, e.g. `claude`.
    #[arg(long, default_value = "claude")]
    process_command: String,
    /// Container image to run for container-mode tasks, when Docker is
    /// reachable on this host.
    #[arg(long)]
    image: Option<String>,
    #[arg(long, default_value_t = 4)]
    max_processes: usize,
    #[arg(long, default_value_t = 2)]
    max_containers: usize,
    #[arg(long, default_value_t = 4)]
    max_concurrent_tasks: u32,
}

impl WorkerArgs {
    async fn run(&self) -> Result<(), Whatever> {
        let id = self.id.clone().map_or_else(WorkerId::generate, |raw| WorkerId::from(raw.as_str()));
        let supports_container_execution = self.image.is_some();
        let mut execution_modes = BTreeSet::from([ExecutionMode::ProcessPool]);
        if supports_container_execution {
            execution_modes.insert(ExecutionMode::ContainerAgentic);
        }

        let provider = ExecutorProviderConfig {
            default_mode: ExecutionMode::ProcessPool,
            process_pool: Some(relay_executor::ProcessPoolConfig { command: self.process_command.clone(), ..Default::default() }),
            container: self.image.clone().map(|image| relay_executor::ContainerConfig { image, ..Default::default() }),
            max_processes: self.max_processes,
            max_containers: self.max_containers,
        };

        let capabilities = WorkerCapabilities {
            supported_categories: BTreeSet::from([
                TaskCategory::Coding,
                TaskCategory::Analysis,
                TaskCategory::Refactoring,
                TaskCategory::Testing,
                TaskCategory::Documentation,
                TaskCategory::System,
            ]),
            max_concurrent_tasks: self.max_concurrent_tasks,
            supports_container_execution,
            execution_modes,
        };

        let config =
            WorkerConfig { id, server: RestServerConfig { bind_address: self.bind.clone(), ..Default::default() }, provider, capabilities };
        App::new(AppConfig::worker(config)).run().await
    }
}

#[derive(Debug, Clone, Args)]
struct SubmitArgs {
    #[arg(long, default_value = "http://127.0.0.1:7000")]
    driver: String,
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "coding")]
    category: String,
    #[arg(long, default_value = "normal")]
    priority: String,
    #[arg(long, default_value = "")]
    description: String,
}

impl SubmitArgs {
    async fn run(&self) -> Result<(), Whatever> {
        let category: TaskCategory = self.category.parse().whatever_context("unrecognized task category")?;
        let priority: relay_types::TaskPriority = self.priority.parse().whatever_context("unrecognized task priority")?;
        let mut task = relay_types::Task::new(relay_types::TaskId::generate(), self.title.clone(), category, priority);
        task.description = self.description.clone();

        let client = reqwest::Client::new();
        let response =
            client.post(format!("{}/tasks", self.driver)).json(&task).send().await.whatever_context("failed to reach driver")?;
        let text = response.text().await.whatever_context("failed to read driver response")?;
        println!("{text}");
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
struct StatusArgs {
    #[arg(long, default_value = "http://127.0.0.1:7000")]
    driver: String,
    #[arg(long)]
    task: Option<String>,
}

impl StatusArgs {
    async fn run(&self) -> Result<(), Whatever> {
        let path = self.task.as_ref().map_or_else(|| "/scheduler/stats".to_string(), |id| format!("/tasks/{id}/progress"));
        let response = reqwest::get(format!("{}{path}", self.driver)).await.whatever_context("failed to reach driver")?;
        let text = response.text().await.whatever_context("failed to read driver response")?;
        println!("{text}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    human_panic::setup_panic!();
    relay_common_runtime::init_global_runtimes(&relay_common_runtime::GlobalRuntimeOptions::default());

    let cli = Cli::parse();
    match cli.commands {
        Commands::Driver(args) => args.run().await,
        Commands::Worker(args) => args.run().await,
        Commands::Submit(args) => args.run().await,
        Commands::Status(args) => args.run().await,
    }
}
