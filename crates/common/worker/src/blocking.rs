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

use crate::context::TaskletContext;

/// Trait for synchronous blocking tasklets with state type at trait level.
///
/// Unlike the async `Tasklet` trait, this is for CPU-intensive or synchronous
/// blocking operations. Tasklets implementing this trait run on Tokio's blocking
/// thread pool via `spawn_blocking`.
///
/// The state type `S` is a trait-level generic, providing better type safety
/// and allowing the tasklet to be stateful with a specific state type.
///
/// # Example
///
/// ```rust
/// use relay_common_worker::{BlockingTasklet, TaskletContext};
///
/// struct HeavyComputeTasklet {
///     batch_size: usize,
/// }
///
/// impl BlockingTasklet<()> for HeavyComputeTasklet {
///     fn work(&mut self, ctx: TaskletContext<()>) {
///         // CPU-intensive work that would block async runtime
///         for i in 0..self.batch_size {
///             // Heavy computation...
///         }
///     }
/// }
/// ```
pub trait BlockingTasklet<S: Clone + Send + Sync + 'static>: Send + 'static {
    fn on_start(&mut self, _ctx: TaskletContext<S>) {}

    fn work(&mut self, ctx: TaskletContext<S>);

    fn on_shutdown(&mut self, _ctx: TaskletContext<S>) {}
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    struct TestBlockingTasklet {
        counter: Arc<AtomicUsize>,
    }

    impl BlockingTasklet<()> for TestBlockingTasklet {
        fn on_start(&mut self, _ctx: TaskletContext<()>) { self.counter.store(1, Ordering::SeqCst); }

        fn work(&mut self, _ctx: TaskletContext<()>) { self.counter.fetch_add(1, Ordering::SeqCst); }

        fn on_shutdown(&mut self, _ctx: TaskletContext<()>) {
            self.counter.store(999, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_blocking_tasklet_trait_compiles() {
        let counter = Arc::new(AtomicUsize::new(0));
        let tasklet = TestBlockingTasklet {
            counter: Arc::clone(&counter),
        };

        fn assert_send<T: Send>(_: &T) {}
        assert_send(&tasklet);
    }
}
