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

//! Unique identifier for tasklets.

use derive_more::{Debug, Display};
use uuid::Uuid;

/// Unique identifier for a tasklet.
///
/// Each tasklet spawned by the LoopManager receives a unique `TaskletId` that can be
/// used to:
/// - Track the tasklet in the LoopManager's internal registry
/// - Stop a specific tasklet via `manager.terminate()` or `manager.remove()`
/// - Look up tasklet information
///
/// # Example
///
/// ```rust,no_run
/// # use relay_common_worker::{Handle, LoopManager, Tasklet, TaskletContext};
/// # use std::time::Duration;
/// # struct MyTasklet;
/// # #[async_trait::async_trait]
/// # impl Tasklet for MyTasklet {
/// #     async fn work<S: Clone + Send + Sync>(&mut self, ctx: TaskletContext<S>) {}
/// # }
/// # #[tokio::main]
/// # async fn main() {
/// let mut manager: LoopManager = LoopManager::new();
///
/// // spawn() returns a handle containing the unique TaskletId
/// let handle = manager
///     .tasklet(MyTasklet)
///     .name("my-tasklet")
///     .interval(Duration::from_secs(5))
///     .spawn();
///
/// // Later, stop this specific tasklet using handle.id()
/// manager.remove(handle.id()).await;
/// # }
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
#[debug("TaskletId({_0})")]
#[display("{_0}")]
pub struct TaskletId(Uuid);

impl TaskletId {
    pub(crate) fn new() -> Self { Self(Uuid::new_v4()) }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid { &self.0 }
}
