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

//! Tasklet abstraction for task scheduling and execution.
//!
//! This crate provides a flexible tasklet system with:
//! - **Multiple trigger types**: Once, Notify, Interval, Cron, and hybrid
//!   triggers
//! - **Type-safe builder API**: Compile-time guarantees for trigger
//!   configuration
//! - **Shared state**: Generic state support with Clone constraint
//! - **Lifecycle hooks**: on_start, work, on_shutdown
//! - **Graceful shutdown**: Coordinated cancellation with timeout
//! - **Pause/Resume/Notify**: Runtime control via handle traits
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use relay_common_worker::{Handle, LoopManager, Pausable, Tasklet, TaskletContext};
//!
//! struct MyTasklet;
//!
//! #[async_trait::async_trait]
//! impl Tasklet for MyTasklet {
//!     async fn work<S: Clone + Send + Sync>(&mut self, ctx: TaskletContext<S>) {
//!         println!("Tasklet {} executed", ctx.name());
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut manager: LoopManager = LoopManager::new();
//!
//!     // Spawn an interval tasklet (handle contains tasklet id)
//!     let handle = manager
//!         .tasklet(MyTasklet)
//!         .name("my-tasklet")
//!         .interval(Duration::from_secs(5))
//!         .spawn();
//!
//!     // Pause/resume control
//!     handle.pause();
//!     handle.resume();
//!
//!     // Access tasklet id via handle
//!     let _id = handle.id();
//!
//!     // Graceful shutdown
//!     manager.shutdown().await;
//! }
//! ```
//!
//! # Architecture
//!
//! - [`Tasklet`]: Trait defining work logic with lifecycle hooks
//! - [`LoopManager`]: Orchestrates tasklet lifecycle and shared state
//! - [`TaskletContext`]: Execution context with state, cancellation, and notify
//! - [`Trigger`]: Execution schedule (Once, Notify, Interval, Cron, etc.)
//! - Handle traits: [`Handle`], [`Pausable`], [`Notifiable`] for runtime
//!   control

mod blocking;
mod builder;
mod config;
mod context;
mod driver;
mod err;
mod handle;
mod id;
mod manager;
mod metrics;
mod trigger;
mod tasklet;

// Public API
pub use blocking::BlockingTasklet;
pub use builder::TaskletBuilder;
pub use config::TaskletRuntimeConfig;
pub use context::TaskletContext;
pub use err::CronParseError;
pub use handle::{
    CronHandle, CronOrNotifyHandle, Handle, IntervalHandle, IntervalOrNotifyHandle, Notifiable,
    NotifyHandle, OnceHandle, Pausable,
};
pub use id::TaskletId;
pub use manager::LoopManager;
pub use tasklet::Tasklet;
pub use trigger::{PauseMode, Trigger};
