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

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::Notify;

use crate::{
    id::TaskletId,
    metrics::{TASKLET_PAUSED, TASKLET_RESUMED},
};

/// Base trait for all tasklet handles, providing access to the tasklet's
/// id and name.
///
/// All handles implement this trait and are `Clone`, `Send`, and `Sync` to
/// allow sharing across threads and async tasks.
pub trait Handle: Clone + Send + Sync {
    /// Returns the unique id assigned to the tasklet at spawn time.
    fn id(&self) -> TaskletId;

    /// Returns the tasklet's name for identification and logging.
    fn name(&self) -> &'static str;
}

/// Handle trait for tasklets that can be paused and resumed.
///
/// Implemented by handles for time-based triggers (Interval, Cron, and their
/// hybrids). Pausing stops the trigger from firing but doesn't cancel the
/// tasklet - it can be resumed later.
///
/// # Example
///
/// ```rust,no_run
/// # use relay_common_worker::{LoopManager, Tasklet, TaskletContext, Pausable};
/// # use std::time::Duration;
/// # struct MyTasklet;
/// # #[async_trait::async_trait]
/// # impl Tasklet for MyTasklet {
/// #     async fn work<S: Clone + Send + Sync>(&mut self, ctx: TaskletContext<S>) {}
/// # }
/// # #[tokio::main]
/// # async fn main() {
/// let mut manager: LoopManager = LoopManager::new();
/// let handle = manager
///     .tasklet(MyTasklet)
///     .interval(Duration::from_secs(1))
///     .spawn();
///
/// handle.pause(); // Stop the interval timer
/// // ... do something ...
/// handle.resume(); // Restart the interval timer
/// //
/// # }
/// ```
pub trait Pausable: Handle {
    /// Pauses the tasklet's trigger, preventing future executions until resumed.
    ///
    /// If the tasklet is currently executing, this will not interrupt it.
    /// The pause takes effect for the next scheduled execution.
    fn pause(&self);

    /// Resumes a paused tasklet's trigger, allowing executions to continue.
    ///
    /// If the tasklet is not paused, this has no effect.
    fn resume(&self);

    /// Returns `true` if the tasklet is currently paused.
    fn is_paused(&self) -> bool;
}

/// Handle trait for tasklets that can be manually triggered.
///
/// Implemented by handles for notify-based triggers (Notify and hybrid
/// triggers). Calling `notify()` will trigger an immediate execution.
///
/// # Example
///
/// ```rust,no_run
/// # use relay_common_worker::{LoopManager, Tasklet, TaskletContext, Notifiable};
/// # struct MyTasklet;
/// # #[async_trait::async_trait]
/// # impl Tasklet for MyTasklet {
/// #     async fn work<S: Clone + Send + Sync>(&mut self, ctx: TaskletContext<S>) {}
/// # }
/// # #[tokio::main]
/// # async fn main() {
/// let mut manager: LoopManager = LoopManager::new();
/// let handle = manager.tasklet(MyTasklet).on_notify().spawn();
///
/// handle.notify(); // Trigger immediate execution
/// //
/// # }
/// ```
pub trait Notifiable: Handle {
    /// Triggers an immediate execution of the tasklet.
    ///
    /// For hybrid triggers (IntervalOrNotify, CronOrNotify), this resets the
    /// timer. Multiple `notify()` calls may be coalesced if the tasklet is
    /// still executing.
    fn notify(&self);
}

/// Handle for tasklets with `Trigger::Once`.
///
/// This handle has no control methods since the tasklet runs once and stops.
/// It only provides the tasklet's id and name via the `Handle` trait.
#[derive(Clone)]
pub struct OnceHandle {
    id:   TaskletId,
    name: &'static str,
}

impl OnceHandle {
    pub(crate) fn new(id: TaskletId, name: &'static str) -> Self { OnceHandle { id, name } }
}

impl Handle for OnceHandle {
    fn id(&self) -> TaskletId { self.id }

    fn name(&self) -> &'static str { self.name }
}

/// Handle for tasklets with `Trigger::Notify`.
///
/// Provides `notify()` method to manually trigger execution on demand.
/// The tasklet will only run when explicitly notified.
#[derive(Clone)]
pub struct NotifyHandle {
    id:     TaskletId,
    name:   &'static str,
    notify: Arc<Notify>,
}

impl NotifyHandle {
    pub(crate) fn new(id: TaskletId, name: &'static str, notify: Arc<Notify>) -> Self {
        NotifyHandle { id, name, notify }
    }
}

impl Handle for NotifyHandle {
    fn id(&self) -> TaskletId { self.id }

    fn name(&self) -> &'static str { self.name }
}

impl Notifiable for NotifyHandle {
    fn notify(&self) { self.notify.notify_one(); }
}

/// Handle for tasklets with `Trigger::Interval`.
///
/// Provides pause/resume methods to control the periodic execution.
/// When paused, the timer stops; when resumed, it restarts.
#[derive(Clone)]
pub struct IntervalHandle {
    id:     TaskletId,
    name:   &'static str,
    notify: Arc<Notify>,
    paused: Arc<AtomicBool>,
}

impl IntervalHandle {
    pub(crate) fn new(
        id: TaskletId,
        name: &'static str,
        notify: Arc<Notify>,
        paused: Arc<AtomicBool>,
    ) -> Self {
        IntervalHandle {
            id,
            name,
            notify,
            paused,
        }
    }
}

impl Handle for IntervalHandle {
    fn id(&self) -> TaskletId { self.id }

    fn name(&self) -> &'static str { self.name }
}

impl Pausable for IntervalHandle {
    fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        TASKLET_PAUSED.with_label_values(&[self.name]).inc();
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.notify.notify_one();
        TASKLET_RESUMED.with_label_values(&[self.name]).inc();
    }

    fn is_paused(&self) -> bool { self.paused.load(Ordering::Acquire) }
}

/// Handle for tasklets with `Trigger::Cron`.
///
/// Provides pause/resume methods to control cron-based execution.
/// When paused, no cron triggers fire; when resumed, scheduling continues.
#[derive(Clone)]
pub struct CronHandle {
    id:     TaskletId,
    name:   &'static str,
    notify: Arc<Notify>,
    paused: Arc<AtomicBool>,
}

impl CronHandle {
    pub(crate) fn new(
        id: TaskletId,
        name: &'static str,
        notify: Arc<Notify>,
        paused: Arc<AtomicBool>,
    ) -> Self {
        CronHandle {
            id,
            name,
            notify,
            paused,
        }
    }
}

impl Handle for CronHandle {
    fn id(&self) -> TaskletId { self.id }

    fn name(&self) -> &'static str { self.name }
}

impl Pausable for CronHandle {
    fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        TASKLET_PAUSED.with_label_values(&[self.name]).inc();
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.notify.notify_one();
        TASKLET_RESUMED.with_label_values(&[self.name]).inc();
    }

    fn is_paused(&self) -> bool { self.paused.load(Ordering::Acquire) }
}

/// Handle for tasklets with `Trigger::IntervalOrNotify`.
///
/// Hybrid handle combining pause/resume and manual notification.
/// The tasklet runs on an interval schedule OR when explicitly notified.
/// Calling `notify()` triggers immediate execution and resets the interval
/// timer.
#[derive(Clone)]
pub struct IntervalOrNotifyHandle {
    id:     TaskletId,
    name:   &'static str,
    notify: Arc<Notify>,
    paused: Arc<AtomicBool>,
}

impl IntervalOrNotifyHandle {
    pub(crate) fn new(
        id: TaskletId,
        name: &'static str,
        notify: Arc<Notify>,
        paused: Arc<AtomicBool>,
    ) -> Self {
        IntervalOrNotifyHandle {
            id,
            name,
            notify,
            paused,
        }
    }
}

impl Handle for IntervalOrNotifyHandle {
    fn id(&self) -> TaskletId { self.id }

    fn name(&self) -> &'static str { self.name }
}

impl Pausable for IntervalOrNotifyHandle {
    fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        TASKLET_PAUSED.with_label_values(&[self.name]).inc();
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.notify.notify_one();
        TASKLET_RESUMED.with_label_values(&[self.name]).inc();
    }

    fn is_paused(&self) -> bool { self.paused.load(Ordering::Acquire) }
}

impl Notifiable for IntervalOrNotifyHandle {
    fn notify(&self) { self.notify.notify_one(); }
}

/// Handle for tasklets with `Trigger::CronOrNotify`.
///
/// Hybrid handle combining pause/resume and manual notification.
/// The tasklet runs on a cron schedule OR when explicitly notified.
/// Unlike IntervalOrNotify, `notify()` doesn't reset the cron schedule - it
/// only triggers an immediate one-time execution.
#[derive(Clone)]
pub struct CronOrNotifyHandle {
    id:     TaskletId,
    name:   &'static str,
    notify: Arc<Notify>,
    paused: Arc<AtomicBool>,
}

impl CronOrNotifyHandle {
    pub(crate) fn new(
        id: TaskletId,
        name: &'static str,
        notify: Arc<Notify>,
        paused: Arc<AtomicBool>,
    ) -> Self {
        CronOrNotifyHandle {
            id,
            name,
            notify,
            paused,
        }
    }
}

impl Handle for CronOrNotifyHandle {
    fn id(&self) -> TaskletId { self.id }

    fn name(&self) -> &'static str { self.name }
}

impl Pausable for CronOrNotifyHandle {
    fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        TASKLET_PAUSED.with_label_values(&[self.name]).inc();
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.notify.notify_one();
        TASKLET_RESUMED.with_label_values(&[self.name]).inc();
    }

    fn is_paused(&self) -> bool { self.paused.load(Ordering::Acquire) }
}

impl Notifiable for CronOrNotifyHandle {
    fn notify(&self) { self.notify.notify_one(); }
}
