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

//! Wires the scheduler's `tick_*` methods into background loops.
//!
//! Each tick runs as its own [`Tasklet`] on a fixed [`relay_common_worker::Trigger::Interval`].
//! The tasklet only holds an `Arc<Scheduler>`, so the [`LoopManager`] itself
//! carries no shared state of its own.

use std::{sync::Arc, time::Duration};

use relay_common_worker::{LoopManager, Tasklet, TaskletContext};
use relay_scheduler::Scheduler;

macro_rules! scheduler_tasklet {
    ($name:ident, $method:ident) => {
        struct $name(Arc<Scheduler>);

        #[async_trait::async_trait]
        impl Tasklet for $name {
            async fn work<S: Clone + Send + Sync>(&mut self, ctx: TaskletContext<S>) {
                if ctx.is_cancelled() {
                    return;
                }
                self.0.$method().await;
            }
        }
    };
}

scheduler_tasklet!(ScheduleTick, tick_schedule);
scheduler_tasklet!(PollTick, tick_poll);
scheduler_tasklet!(HealthCheckTick, tick_health_check);
scheduler_tasklet!(SessionSweepTick, tick_session_sweep);
scheduler_tasklet!(StatsTick, tick_stats);
scheduler_tasklet!(CheckpointTick, tick_checkpoint);

/// Intervals for the scheduling loops, read from [`relay_scheduler::SchedulerConfig`].
pub struct TickIntervals {
    pub schedule: Duration,
    pub poll: Duration,
    pub health_check: Duration,
    pub stats: Duration,
    pub checkpoint: Duration,
}

impl From<&relay_scheduler::SchedulerConfig> for TickIntervals {
    fn from(config: &relay_scheduler::SchedulerConfig) -> Self {
        Self {
            schedule: config.tick_interval,
            poll: config.poll_interval,
            health_check: config.health_check_interval,
            stats: config.stats_interval,
            checkpoint: config.checkpoint_interval,
        }
    }
}

/// Spawns the six scheduling tasklets on the given manager. The manager
/// carries no state of its own (`LoopManager<()>`); each tasklet closes over
/// its own `Arc<Scheduler>` clone instead.
pub fn spawn_ticks(manager: &mut LoopManager<()>, scheduler: Arc<Scheduler>, intervals: &TickIntervals) {
    manager.tasklet(ScheduleTick(scheduler.clone())).name("schedule").interval(intervals.schedule).spawn();
    manager.tasklet(PollTick(scheduler.clone())).name("poll").interval(intervals.poll).spawn();
    manager.tasklet(HealthCheckTick(scheduler.clone())).name("health-check").interval(intervals.health_check).spawn();
    manager.tasklet(SessionSweepTick(scheduler.clone())).name("session-sweep").interval(intervals.health_check).spawn();
    manager.tasklet(StatsTick(scheduler.clone())).name("stats").interval(intervals.stats).spawn();
    manager.tasklet(CheckpointTick(scheduler)).name("checkpoint").interval(intervals.checkpoint).spawn();
}
