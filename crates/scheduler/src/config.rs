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

use relay_types::TaskPriority;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use strum_macros::{AsRefStr, Display, EnumString};

/// Which of the four worker-selection strategies the scheduling tick uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, AsRefStr, EnumString, Serialize, Deserialize, Default)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancingStrategy {
    RoundRobin,
    LeastLoaded,
    #[default]
    CapabilityBased,
    AffinityBased,
}

/// Tunables for the scheduling tick, retry policy and worker selection.
/// Loaded the way the rest of the driver's config is: compiled-in defaults →
/// TOML file → `RELAY_*` environment variables → CLI flags.
#[derive(Clone, Debug, Serialize, Deserialize, SmartDefault)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    #[default(_code = "LoadBalancingStrategy::CapabilityBased")]
    pub strategy: LoadBalancingStrategy,
    /// Priority weight table keyed by the priority's wire name (`"critical"`,
    /// `"high"`, ...); falls back to [`TaskPriority::default_weight`] for any
    /// priority absent from the map.
    #[default(_code = "HashMap::new()")]
    pub priority_weights: HashMap<String, u32>,
    /// Per-category affinity bonus used by the `affinity-based` strategy;
    /// absent categories default to `0.5`.
    #[default(_code = "HashMap::new()")]
    pub category_affinities: HashMap<String, f64>,
    #[default = 3]
    pub retry_attempts: u32,
    #[default(_code = "Duration::from_secs(30)")]
    pub retry_delay: Duration,
    /// How often the scheduling tick runs.
    #[default(_code = "Duration::from_secs(1)")]
    pub tick_interval: Duration,
    /// How often dispatched tasks are polled for status on their worker.
    #[default(_code = "Duration::from_secs(2)")]
    pub poll_interval: Duration,
    /// How often `GET /health` is polled on every registered worker.
    #[default(_code = "Duration::from_secs(30)")]
    pub health_check_interval: Duration,
    /// How often `SchedulerStats` is recomputed.
    #[default(_code = "Duration::from_secs(10)")]
    pub stats_interval: Duration,
    /// Wall-clock budget for one dispatched task before it's treated as
    /// timed out.
    #[default(_code = "Duration::from_secs(600)")]
    pub task_timeout: Duration,
    #[default = true]
    pub enable_task_decomposition: bool,
    #[default = true]
    pub enable_result_merging: bool,
    #[default = true]
    pub retry_failed_tasks: bool,
    /// Optional path for the best-effort periodic checkpoint; `None`
    /// disables checkpointing entirely.
    pub checkpoint_path: Option<std::path::PathBuf>,
    #[default(_code = "Duration::from_secs(60)")]
    pub checkpoint_interval: Duration,
}

impl SchedulerConfig {
    #[must_use]
    pub fn priority_weight(&self, priority: TaskPriority) -> u32 {
        self.priority_weights.get(priority.as_ref()).copied().unwrap_or_else(|| priority.default_weight())
    }

    #[must_use]
    pub fn category_affinity(&self, category: relay_types::TaskCategory) -> f64 {
        self.category_affinities.get(category.as_ref()).copied().unwrap_or(0.5)
    }
}

#[cfg(test)]
mod tests {
    use relay_types::TaskCategory;

    use super::*;

    #[test]
    fn priority_weight_falls_back_to_default_table() {
        let config = SchedulerConfig::default();
        assert_eq!(config.priority_weight(TaskPriority::Critical), 100);
        assert_eq!(config.priority_weight(TaskPriority::Background), 10);
    }

    #[test]
    fn priority_weight_override_takes_precedence() {
        let mut config = SchedulerConfig::default();
        config.priority_weights.insert("normal".to_string(), 999);
        assert_eq!(config.priority_weight(TaskPriority::Normal), 999);
    }

    #[test]
    fn category_affinity_defaults_to_half() {
        let config = SchedulerConfig::default();
        assert!((config.category_affinity(TaskCategory::Coding) - 0.5).abs() < f64::EPSILON);
    }
}
