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

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use bollard::{
    Docker,
    container::{
        Config, CreateContainerOptions, DownloadFromContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
        StopContainerOptions, WaitContainerOptions,
    },
    image::CreateImageOptions,
    models::HostConfig,
};
use chrono::Utc;
use futures::StreamExt;
use relay_types::{Artifact, ArtifactId, ExecutionMode, Task, TaskMetrics, TaskResult};
use sha2::{Digest, Sha256};
use smart_default::SmartDefault;
use snafu::ResultExt;
use tracing::{info, warn};

use crate::{
    error::{DockerSnafu, Result},
    executor::{Executor, ExecutorState, ExecutorStatus, Lifecycle},
};

/// Static configuration for one-shot agentic containers, taken from the
/// worker's `container` config block (`orchestrator`, `image`,
/// `resourceLimits`, `environmentVariables`, `autoRemove`).
#[derive(Clone, Debug, SmartDefault)]
pub struct ContainerConfig {
    pub image:         String,
    #[default(_code = "1024 * 1024 * 1024")]
    pub memory_bytes:  i64,
    #[default = 512]
    pub cpu_shares:    i64,
    #[default = true]
    pub auto_remove:   bool,
    #[default(_code = "\"/workspace\".to_string()")]
    pub workspace_dir: String,
    pub environment:   HashMap<String, String>,
}

const GRACE_PERIOD_SECS: i64 = 10;

/// Wraps one Docker container created fresh per task (or per session), with
/// resource caps, dropped capabilities, and no host mounts. Every call to
/// `execute` after the first on a session-bound executor reuses the same
/// running container; the driver's non-session path always gets a
/// one-shot executor dropped after a single task.
pub struct ContainerExecutor {
    lifecycle:    Lifecycle,
    docker:       Docker,
    config:       ContainerConfig,
    session_id:   Option<String>,
    container_id: Option<String>,
    healthy:      bool,
}

impl ContainerExecutor {
    #[must_use]
    pub fn new(id: impl Into<String>, docker: Docker, config: ContainerConfig, session_id: Option<String>) -> Self {
        Self {
            lifecycle: Lifecycle::new(id.into(), ExecutionMode::ContainerAgentic),
            docker,
            config,
            session_id,
            container_id: None,
            healthy: true,
        }
    }

    async fn ensure_image(&self) -> Result<()> {
        let mut stream = self.docker.create_image(
            Some(CreateImageOptions { from_image: self.config.image.clone(), ..Default::default() }),
            None,
            None,
        );
        while let Some(progress) = stream.next().await {
            progress.context(DockerSnafu)?;
        }
        Ok(())
    }

    async fn ensure_container(&mut self, task: &Task) -> Result<String> {
        if let Some(id) = &self.container_id {
            return Ok(id.clone());
        }

        self.ensure_image().await?;

        let session_id = self.session_id.clone().unwrap_or_else(|| task.id.as_str().to_string());
        let mut env: Vec<String> = self.config.environment.iter().map(|(k, v)| format!("{k}={v}")).collect();
        env.push(format!("SESSION_ID={session_id}"));
        env.push(format!("TASK={}", task.title));
        env.push(format!("WORKSPACE_DIR={}", self.config.workspace_dir));
        if let Some(repo_url) = &task.context.repo_url {
            env.push(format!("REPO_URL={repo_url}"));
        }

        let mut labels = HashMap::new();
        labels.insert("session".to_string(), session_id.clone());
        labels.insert("type".to_string(), "container_agentic".to_string());
        labels.insert("created".to_string(), Utc::now().to_rfc3339());

        let host_config = HostConfig {
            memory: Some(self.config.memory_bytes),
            cpu_shares: Some(self.config.cpu_shares),
            cap_drop: Some(vec!["ALL".to_string()]),
            auto_remove: Some(self.config.auto_remove),
            // No host mounts: the workspace lives entirely inside the
            // container and is recovered via `download_from_container`.
            binds: None,
            ..Default::default()
        };

        let config = Config {
            image: Some(self.config.image.clone()),
            env: Some(env),
            labels: Some(labels),
            host_config: Some(host_config),
            working_dir: Some(self.config.workspace_dir.clone()),
            ..Default::default()
        };

        let name = format!("relay-{}-{}", session_id, self.lifecycle.id);
        let created = self
            .docker
            .create_container(Some(CreateContainerOptions { name, platform: None }), config)
            .await
            .context(DockerSnafu)?;

        self.docker
            .start_container(&created.id, None::<bollard::query_parameters::StartContainerOptions>)
            .await
            .context(DockerSnafu)?;
        self.container_id = Some(created.id.clone());
        Ok(created.id)
    }

    async fn collect_logs(&self, container_id: &str) -> (String, String) {
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut stream = self.docker.logs(
            container_id,
            Some(LogsOptions::<String> { stdout: true, stderr: true, follow: true, ..Default::default() }),
        );
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) => stdout.push_str(&String::from_utf8_lossy(&message)),
                Ok(LogOutput::StdErr { message }) => stderr.push_str(&String::from_utf8_lossy(&message)),
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, container_id, "log stream ended with an error");
                    break;
                }
            }
        }
        (stdout, stderr)
    }

    async fn snapshot_container_workspace(&self, container_id: &str) -> Vec<Artifact> {
        let mut stream = self.docker.download_from_container(
            container_id,
            Some(DownloadFromContainerOptions { path: self.config.workspace_dir.clone() }),
        );
        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => bytes.extend_from_slice(&chunk),
                Err(err) => {
                    warn!(error = %err, container_id, "failed to download workspace archive");
                    return Vec::new();
                }
            }
        }
        parse_tar_to_artifacts(&bytes)
    }

    async fn stop_with_grace(&mut self, container_id: &str) {
        let stop = self
            .docker
            .stop_container(container_id, Some(StopContainerOptions { t: GRACE_PERIOD_SECS as i64 }))
            .await;
        if let Err(err) = stop {
            warn!(error = %err, container_id, "stop_container failed, attempting remove");
        }
        if !self.config.auto_remove {
            let _ = self
                .docker
                .remove_container(container_id, Some(RemoveContainerOptions { force: true, ..Default::default() }))
                .await;
        }
    }
}

fn parse_tar_to_artifacts(bytes: &[u8]) -> Vec<Artifact> {
    let mut archive = tar::Archive::new(bytes);
    let mut artifacts = Vec::new();
    let Ok(entries) = archive.entries() else { return artifacts };
    for entry in entries.flatten() {
        let mut entry = entry;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path().ok().map(|p| p.display().to_string()).unwrap_or_default();
        let mut content = Vec::new();
        if std::io::Read::read_to_end(&mut entry, &mut content).is_err() {
            continue;
        }
        let mut hasher = Sha256::new();
        hasher.update(&content);
        let content_hash = hasher.finalize().iter().map(|b| format!("{b:02x}")).collect::<String>();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        artifacts.push(Artifact {
            id: ArtifactId::generate(),
            artifact_type: "file".to_string(),
            name,
            relative_path: path,
            size_bytes: content.len() as u64,
            content_hash,
            created_at: Utc::now(),
            mime_type: None,
        });
    }
    artifacts
}

#[async_trait]
impl Executor for ContainerExecutor {
    async fn execute(&mut self, task: &Task) -> TaskResult {
        let start_time = Utc::now();
        if !self.healthy {
            let metrics = TaskMetrics::new(start_time, Utc::now());
            return TaskResult::failed(task.id.clone(), "executor-terminated", "executor is unhealthy", metrics);
        }

        self.lifecycle.state = ExecutorState::Executing;
        let container_id = match self.ensure_container(task).await {
            Ok(id) => id,
            Err(err) => {
                self.healthy = false;
                let metrics = TaskMetrics::new(start_time, Utc::now());
                return TaskResult::failed(task.id.clone(), err.kind().as_ref(), err.to_string(), metrics);
            }
        };

        let timeout = task
            .context
            .resource_limits
            .as_ref()
            .and_then(|limits| limits.timeout_secs)
            .or(task.context.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(600));

        let wait = self.docker.wait_container(&container_id, None::<WaitContainerOptions<String>>).collect::<Vec<_>>();
        let outcome = tokio::time::timeout(timeout, wait).await;
        let (stdout, _stderr) = self.collect_logs(&container_id).await;
        let end_time = Utc::now();
        let metrics = TaskMetrics::new(start_time, end_time);

        match outcome {
            Err(_elapsed) => {
                info!(container_id, "container task timed out, stopping");
                self.stop_with_grace(&container_id).await;
                self.healthy = false;
                TaskResult::failed(
                    task.id.clone(),
                    "timed-out",
                    format!("task exceeded {}s timeout", timeout.as_secs()),
                    metrics,
                )
            }
            Ok(results) => {
                let exit_code = results
                    .into_iter()
                    .next()
                    .and_then(std::result::Result::ok)
                    .map_or(1, |r| r.status_code);
                let artifacts = self.snapshot_container_workspace(&container_id).await;
                self.lifecycle.state = ExecutorState::Idle;
                self.lifecycle.tasks_completed += 1;
                if exit_code == 0 {
                    TaskResult::completed(task.id.clone(), stdout, metrics).with_artifacts(artifacts)
                } else if exit_code == 124 {
                    TaskResult::failed(task.id.clone(), "timed-out", "container exited with timeout code 124", metrics)
                        .with_artifacts(artifacts)
                } else {
                    TaskResult::failed(task.id.clone(), "internal", format!("container exited with code {exit_code}"), metrics)
                        .with_artifacts(artifacts)
                }
            }
        }
    }

    async fn terminate(&mut self) {
        if self.lifecycle.state == ExecutorState::Terminated {
            return;
        }
        if let Some(container_id) = self.container_id.take() {
            self.stop_with_grace(&container_id).await;
        }
        self.lifecycle.state = ExecutorState::Terminated;
    }

    fn is_healthy(&self) -> bool { self.healthy && self.lifecycle.state != ExecutorState::Terminated }

    fn status(&self) -> ExecutorStatus { self.lifecycle.status(None) }
}
