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

use std::path::Path;

use relay_types::{Session, Task, TaskStatus, WorkerCapabilities, WorkerId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{registry::WorkerRegistry, session::SessionRegistry, types::QueuedTask};

/// A worker's static identity, without the liveness fields that go stale the
/// moment the checkpoint is written.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct CheckpointedWorker {
    id: WorkerId,
    endpoint: String,
    capabilities: WorkerCapabilities,
}

/// Best-effort snapshot of scheduler state, written on a slow interval and
/// on graceful shutdown. Execution contexts and stats are intentionally
/// excluded: they're either reconstructible or stale by the time a restart
/// would read them back.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    queued_tasks: Vec<Task>,
    workers: Vec<CheckpointedWorker>,
    sessions: Vec<Session>,
}

impl Checkpoint {
    #[must_use]
    pub fn capture(queue: &[QueuedTask], workers: &WorkerRegistry, sessions: &SessionRegistry) -> Self {
        Self {
            queued_tasks: queue.iter().map(|q| q.task.clone()).collect(),
            workers: workers
                .iter()
                .map(|w| CheckpointedWorker { id: w.id.clone(), endpoint: w.endpoint.clone(), capabilities: w.capabilities.clone() })
                .collect(),
            sessions: sessions.active().cloned().collect(),
        }
    }

    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        let body = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, body).await?;
        tokio::fs::rename(&tmp_path, path).await
    }

    pub async fn load(path: &Path) -> std::io::Result<Option<Self>> {
        match tokio::fs::read(path).await {
            Ok(body) => serde_json::from_slice(&body).map(Some).map_err(std::io::Error::other),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Rehydrates the queue this checkpoint describes. Any task that was
    /// `running` when the checkpoint was taken is demoted to `pending`
    /// since no worker can be trusted to still be executing it.
    #[must_use]
    pub fn into_queued_tasks(self) -> Vec<QueuedTask> {
        self.queued_tasks
            .into_iter()
            .map(|mut task| {
                if task.status == TaskStatus::Running {
                    task.status = TaskStatus::Pending;
                }
                QueuedTask::new(task)
            })
            .collect()
    }

    #[must_use]
    pub fn worker_descriptors(&self) -> &[CheckpointedWorker] { &self.workers }

    #[must_use]
    pub fn sessions(&self) -> &[Session] { &self.sessions }
}

/// Writes a checkpoint, logging and swallowing failures: checkpointing is
/// an optimization, not a durability guarantee, and must never bring the
/// scheduling tick down with it.
pub async fn write_best_effort(path: &Path, queue: &[QueuedTask], workers: &WorkerRegistry, sessions: &SessionRegistry) {
    let checkpoint = Checkpoint::capture(queue, workers, sessions);
    match checkpoint.save(path).await {
        Ok(()) => debug!(path = %path.display(), "wrote scheduler checkpoint"),
        Err(error) => warn!(%error, path = %path.display(), "failed to write scheduler checkpoint"),
    }
}

#[cfg(test)]
mod tests {
    use relay_types::{TaskCategory, TaskId, TaskPriority};
    use tempfile_like::temp_path;

    use super::*;

    mod tempfile_like {
        use std::path::PathBuf;

        /// Deterministic scratch path under the test target directory;
        /// avoids pulling in a dev-dependency just to avoid collisions
        /// across the handful of checkpoint tests.
        pub fn temp_path(name: &str) -> PathBuf { std::env::temp_dir().join(format!("relay-scheduler-checkpoint-test-{name}.json")) }
    }

    #[tokio::test]
    async fn round_trips_through_disk_and_demotes_running_tasks() {
        let path = temp_path("round-trip");
        let mut task = Task::new(TaskId::from("t1"), "do work", TaskCategory::Coding, TaskPriority::Normal);
        task.status = TaskStatus::Running;
        let queue = vec![QueuedTask::new(task)];
        let workers = WorkerRegistry::new();
        let sessions = SessionRegistry::new();

        Checkpoint::capture(&queue, &workers, &sessions).save(&path).await.unwrap();
        let loaded = Checkpoint::load(&path).await.unwrap().expect("checkpoint should exist");
        let restored = loaded.into_queued_tasks();

        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].task.status, TaskStatus::Pending);
        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let path = temp_path("missing");
        tokio::fs::remove_file(&path).await.ok();
        assert!(Checkpoint::load(&path).await.unwrap().is_none());
    }
}
