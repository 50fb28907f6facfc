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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{TaskId, TaskStatus};

/// A monotone, clamped progress fraction in `[0, 1]`.
///
/// `record` never lets the value move backwards: a regression observed from
/// a worker poll is clamped to the previous maximum rather than accepted,
/// per the strict-monotonicity decision for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Progress(f64);

impl Progress {
    pub const COMPLETE: Self = Self(1.0);
    pub const ZERO: Self = Self(0.0);

    #[must_use]
    pub fn new(value: f64) -> Self { Self(value.clamp(0.0, 1.0)) }

    #[must_use]
    pub const fn value(self) -> f64 { self.0 }

    /// Advances to `observed`, clamped so the value never regresses. Returns
    /// `true` if the observed value was rejected (i.e. it was a regression).
    pub fn record(&mut self, observed: f64) -> bool {
        let observed = observed.clamp(0.0, 1.0);
        if observed < self.0 {
            return true;
        }
        self.0 = observed;
        false
    }
}

impl Default for Progress {
    fn default() -> Self { Self::ZERO }
}

/// A snapshot of a task's progress, returned from `GET /tasks/{id}/progress`
/// and mirrored into the driver's execution context on every poll.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProgressRecord {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub progress: Progress,
    pub current_step: Option<String>,
    pub observed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regression_is_clamped_not_accepted() {
        let mut p = Progress::new(0.6);
        assert!(p.record(0.3));
        assert!((p.value() - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn forward_progress_is_accepted() {
        let mut p = Progress::new(0.2);
        assert!(!p.record(0.5));
        assert!((p.value() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_inputs_are_clamped() {
        assert!((Progress::new(1.5).value() - 1.0).abs() < f64::EPSILON);
        assert!((Progress::new(-0.5).value() - 0.0).abs() < f64::EPSILON);
    }
}
