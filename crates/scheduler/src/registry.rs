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

use std::collections::HashMap;

use relay_types::{ExecutionMode, TaskCategory, WorkerDescriptor, WorkerId};

use crate::config::{LoadBalancingStrategy, SchedulerConfig};

/// The driver's view of every registered worker, plus enough bookkeeping to
/// implement `round-robin` without favoring whichever worker registered
/// first.
#[derive(Default)]
pub struct WorkerRegistry {
    workers:     HashMap<WorkerId, WorkerDescriptor>,
    assignments: HashMap<WorkerId, u64>,
}

impl WorkerRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, worker: WorkerDescriptor) {
        self.assignments.entry(worker.id.clone()).or_insert(0);
        self.workers.insert(worker.id.clone(), worker);
    }

    /// Removes the worker, returning it (and its in-flight task ids) if it
    /// existed.
    pub fn unregister(&mut self, id: &WorkerId) -> Option<WorkerDescriptor> {
        self.assignments.remove(id);
        self.workers.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &WorkerId) -> Option<&WorkerDescriptor> { self.workers.get(id) }

    pub fn get_mut(&mut self, id: &WorkerId) -> Option<&mut WorkerDescriptor> { self.workers.get_mut(id) }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerDescriptor> { self.workers.values() }

    #[must_use]
    pub fn len(&self) -> usize { self.workers.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.workers.is_empty() }

    fn available(&self) -> impl Iterator<Item = &WorkerDescriptor> { self.workers.values().filter(|w| w.is_available()) }

    /// `available()` narrowed to workers that can run `mode`, when the
    /// caller has an explicit mode requirement (an unset mode matches every
    /// worker, since the worker then picks its own default).
    fn compatible(&self, mode: Option<ExecutionMode>) -> impl Iterator<Item = &WorkerDescriptor> {
        self.available().filter(move |w| mode.is_none_or(|m| w.capabilities.execution_modes.contains(&m)))
    }

    /// Picks a worker for `category` under the configured strategy. Returns
    /// `None` if no worker is currently available and mode-compatible, in
    /// which case the caller keeps the task queued and emits
    /// `no-workers-available`.
    #[must_use]
    pub fn select(&self, category: TaskCategory, mode: Option<ExecutionMode>, config: &SchedulerConfig) -> Option<WorkerId> {
        match config.strategy {
            LoadBalancingStrategy::RoundRobin => self.select_round_robin(mode),
            LoadBalancingStrategy::LeastLoaded => self.select_least_loaded(self.compatible(mode)),
            LoadBalancingStrategy::CapabilityBased => self.select_capability_based(category, mode),
            LoadBalancingStrategy::AffinityBased => self.select_affinity_based(category, mode, config),
        }
    }

    /// Picks a container-capable worker for session creation: filtered to
    /// `supports_container_execution`, tie-broken by least `current_tasks`
    /// then lowest `response_time_ms`.
    #[must_use]
    pub fn select_for_session(&self) -> Option<WorkerId> {
        self.available()
            .filter(|w| w.capabilities.supports_container_execution)
            .min_by(|a, b| {
                a.current_load()
                    .cmp(&b.current_load())
                    .then(a.health.response_time_ms.cmp(&b.health.response_time_ms))
            })
            .map(|w| w.id.clone())
    }

    fn select_round_robin(&self, mode: Option<ExecutionMode>) -> Option<WorkerId> {
        self.compatible(mode).min_by_key(|w| self.assignments.get(&w.id).copied().unwrap_or(0)).map(|w| w.id.clone())
    }

    fn select_least_loaded<'a>(&self, candidates: impl Iterator<Item = &'a WorkerDescriptor>) -> Option<WorkerId> {
        candidates.min_by(|a, b| a.load_ratio().total_cmp(&b.load_ratio())).map(|w| w.id.clone())
    }

    fn select_capability_based(&self, category: TaskCategory, mode: Option<ExecutionMode>) -> Option<WorkerId> {
        let capable: Vec<&WorkerDescriptor> = self.compatible(mode).filter(|w| w.capabilities.supports_category(category)).collect();
        if let Some(id) = self.select_least_loaded(capable.into_iter()) {
            return Some(id);
        }
        self.select_least_loaded(self.compatible(mode))
    }

    fn select_affinity_based(&self, category: TaskCategory, mode: Option<ExecutionMode>, config: &SchedulerConfig) -> Option<WorkerId> {
        let affinity = config.category_affinity(category);
        self.compatible(mode)
            .map(|w| {
                let category_match = if w.capabilities.supports_category(category) { affinity } else { 0.0 };
                let score = category_match + (1.0 - w.load_ratio()) * 0.5;
                (score, w)
            })
            .max_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, w)| w.id.clone())
    }

    /// Records that `worker` just received a dispatch, for round-robin
    /// fairness and `current_tasks` bookkeeping.
    pub fn record_assignment(&mut self, worker: &WorkerId, task: relay_types::TaskId) {
        *self.assignments.entry(worker.clone()).or_insert(0) += 1;
        if let Some(descriptor) = self.workers.get_mut(worker) {
            descriptor.current_tasks.insert(task);
        }
    }

    pub fn record_completion(&mut self, worker: &WorkerId, task: &relay_types::TaskId) {
        if let Some(descriptor) = self.workers.get_mut(worker) {
            descriptor.current_tasks.remove(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use relay_types::{ExecutionMode, WorkerCapabilities, WorkerHealth, WorkerStatus};

    use super::*;

    fn worker(id: &str, category: TaskCategory, max: u32, current: usize) -> WorkerDescriptor {
        WorkerDescriptor {
            id: WorkerId::from(id),
            endpoint: format!("http://127.0.0.1:0/{id}"),
            status: WorkerStatus::Idle,
            capabilities: WorkerCapabilities {
                supported_categories: BTreeSet::from([category]),
                max_concurrent_tasks: max,
                supports_container_execution: false,
                execution_modes: BTreeSet::from([ExecutionMode::ProcessPool]),
            },
            health: WorkerHealth { last_seen: Utc::now(), response_time_ms: 5 },
            current_tasks: (0..current).map(|i| relay_types::TaskId::from(format!("t{i}"))).collect(),
        }
    }

    #[test]
    fn capability_based_filters_to_supported_category_first() {
        let mut registry = WorkerRegistry::new();
        registry.register(worker("w1", TaskCategory::Analysis, 4, 0));
        registry.register(worker("w2", TaskCategory::Coding, 4, 0));
        let config = SchedulerConfig { strategy: LoadBalancingStrategy::CapabilityBased, ..SchedulerConfig::default() };
        assert_eq!(registry.select(TaskCategory::Coding, None, &config), Some(WorkerId::from("w2")));
    }

    #[test]
    fn capability_based_falls_back_when_no_worker_supports_category() {
        let mut registry = WorkerRegistry::new();
        registry.register(worker("w1", TaskCategory::Analysis, 4, 0));
        let config = SchedulerConfig { strategy: LoadBalancingStrategy::CapabilityBased, ..SchedulerConfig::default() };
        assert_eq!(registry.select(TaskCategory::Coding, None, &config), Some(WorkerId::from("w1")));
    }

    #[test]
    fn least_loaded_prefers_lower_ratio() {
        let mut registry = WorkerRegistry::new();
        registry.register(worker("busy", TaskCategory::Coding, 4, 3));
        registry.register(worker("free", TaskCategory::Coding, 4, 0));
        let config = SchedulerConfig { strategy: LoadBalancingStrategy::LeastLoaded, ..SchedulerConfig::default() };
        assert_eq!(registry.select(TaskCategory::Coding, None, &config), Some(WorkerId::from("free")));
    }

    #[test]
    fn saturated_worker_is_never_selected() {
        let mut registry = WorkerRegistry::new();
        registry.register(worker("full", TaskCategory::Coding, 1, 1));
        let config = SchedulerConfig::default();
        assert_eq!(registry.select(TaskCategory::Coding, None, &config), None);
    }

    #[test]
    fn session_selection_requires_container_support() {
        let mut registry = WorkerRegistry::new();
        let mut w = worker("w1", TaskCategory::Coding, 4, 0);
        w.capabilities.supports_container_execution = true;
        registry.register(w);
        registry.register(worker("w2", TaskCategory::Coding, 4, 0));
        assert_eq!(registry.select_for_session(), Some(WorkerId::from("w1")));
    }
}
