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

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use relay_common_runtime::Runtime;
use tokio::{sync::Notify, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    builder::TaskletBuilder,
    config::TaskletRuntimeConfig,
    context::TaskletContext,
    driver::TriggerDriverEnum,
    id::TaskletId,
    metrics::{
        TASKLET_ACTIVE, TASKLET_EXECUTION_DURATION_SECONDS, TASKLET_EXECUTIONS, TASKLET_STARTED,
        TASKLET_STOPPED,
    },
    tasklet::Tasklet,
    trigger::Trigger,
};

/// Orchestrates the lifecycle of background tasklets sharing state `S`.
///
/// `S` defaults to `()` for managers with no shared state. Every tasklet
/// spawned through this manager receives a clone of `S` in its
/// [`TaskletContext`].
pub struct LoopManager<S = ()> {
    state:            S,
    cancel_token:     CancellationToken,
    runtime:          Option<Arc<Runtime>>,
    shutdown_timeout: std::time::Duration,
    joins:            JoinSet<()>,
    tasks:            HashMap<TaskletId, CancellationToken>,
}

impl<S: Default> Default for LoopManager<S> {
    fn default() -> Self { Self::with_state(S::default()) }
}

impl<S: Default> LoopManager<S> {
    /// Creates a manager with the default shared state and configuration.
    pub fn new() -> Self { Self::default() }

    /// Creates a manager from an explicit [`TaskletRuntimeConfig`].
    pub fn start(config: TaskletRuntimeConfig) -> Self {
        let mut manager = Self::default();
        manager.runtime = config.runtime();
        manager.shutdown_timeout = config.shutdown_timeout();
        manager
    }
}

impl<S> LoopManager<S> {
    /// Creates a manager carrying the given shared state.
    pub fn with_state(state: S) -> Self {
        LoopManager {
            state,
            cancel_token: CancellationToken::new(),
            runtime: None,
            shutdown_timeout: std::time::Duration::from_secs(30),
            joins: JoinSet::new(),
            tasks: HashMap::new(),
        }
    }

    /// Starts configuring a new tasklet, returning a type-state builder.
    ///
    /// The builder is consumed by calling a trigger method (`once()`,
    /// `interval()`, `cron()`, ...) followed by `spawn()`.
    pub fn tasklet<W>(&mut self, tasklet: W) -> TaskletBuilder<'_, S, W, crate::builder::TriggerNotSet>
    where
        W: Tasklet,
        S: Send + Sync + 'static,
    {
        TaskletBuilder::new(self, tasklet)
    }

    /// Cancels and removes a single tasklet by id.
    ///
    /// The tasklet's own work in flight finishes; only its next wait on the
    /// trigger is interrupted.
    pub async fn remove(&mut self, id: TaskletId) {
        if let Some(token) = self.tasks.remove(&id) {
            token.cancel();
        }
    }

    pub(crate) fn spawn_tasklet<W, H>(
        &mut self,
        mut tasklet: W,
        name: &'static str,
        blocking: bool,
        trigger: Trigger,
    ) -> H
    where
        W: Tasklet,
        S: Clone + Send + Sync + 'static,
        H: crate::builder::SpawnResult,
    {
        let id = TaskletId::new();
        let notify = Arc::new(Notify::new());
        let paused = Arc::new(AtomicBool::new(false));
        let child_token = self.cancel_token.child_token();
        let ctx = TaskletContext::new(name, self.state.clone(), child_token.clone(), notify.clone());

        self.tasks.insert(id, child_token);

        let mut driver = TriggerDriverEnum::from(trigger);
        let paused_clone = paused.clone();

        let task = async move {
            info!(tasklet = name, "tasklet starting");
            TASKLET_STARTED.with_label_values(&[name]).inc();
            TASKLET_ACTIVE.with_label_values(&[name]).set(1);

            tasklet.on_start(ctx.clone()).await;

            while driver.wait_next(&ctx).await {
                if paused_clone.load(Ordering::Acquire) {
                    continue;
                }

                let start = std::time::Instant::now();
                tasklet.work(ctx.clone()).await;
                TASKLET_EXECUTIONS.with_label_values(&[name]).inc();
                TASKLET_EXECUTION_DURATION_SECONDS
                    .with_label_values(&[name])
                    .observe(start.elapsed().as_secs_f64());
            }

            tasklet.on_shutdown(ctx.clone()).await;
            TASKLET_ACTIVE.with_label_values(&[name]).set(0);
            TASKLET_STOPPED.with_label_values(&[name]).inc();
            info!(tasklet = name, "tasklet stopped");
        };

        let runtime = self
            .runtime
            .clone()
            .unwrap_or_else(relay_common_runtime::background_runtime);

        if blocking {
            let handle = runtime.handle().clone();
            self.joins
                .spawn_blocking_on(move || handle.block_on(task), runtime.handle());
        } else {
            self.joins.spawn_on(task, runtime.handle());
        }

        H::from_parts(id, name, notify, paused)
    }

    /// Gracefully shuts down all tasklets.
    ///
    /// Cancels every tasklet and waits for them to finish within the
    /// configured timeout. Tasklets not responding in time are aborted.
    pub async fn shutdown(mut self) {
        info!("shutting down tasklet manager");
        self.cancel_token.cancel();

        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;
        let mut aborted_count = 0;
        let mut total_count = 0;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());

            tokio::select! {
                result = self.joins.join_next() => {
                    match result {
                        Some(Ok(())) => {
                            total_count += 1;
                        }
                        Some(Err(e)) => {
                            total_count += 1;
                            if e.is_cancelled() {
                                aborted_count += 1;
                            } else {
                                tracing::error!(error = ?e, "join error during shutdown");
                            }
                        }
                        None => break,
                    }
                }
                () = tokio::time::sleep(remaining) => {
                    tracing::error!(
                        timeout = ?self.shutdown_timeout,
                        "shutdown timeout reached, aborting remaining tasklets"
                    );
                    self.joins.abort_all();

                    while let Some(result) = self.joins.join_next().await {
                        total_count += 1;
                        if let Err(e) = result && e.is_cancelled() {
                            aborted_count += 1;
                        }
                    }
                    break;
                }
            }
        }

        if aborted_count > 0 {
            tracing::error!(
                stopped = total_count - aborted_count,
                aborted = aborted_count,
                "tasklet manager shutdown complete"
            );
        } else {
            info!(stopped = total_count, "tasklet manager shutdown complete");
        }
    }
}
