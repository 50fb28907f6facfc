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

use lazy_static::lazy_static;
use prometheus::*;

pub const TASKLET_LABEL: &str = "tasklet";

lazy_static! {
    pub static ref TASKLET_STARTED: IntCounterVec = register_int_counter_vec!(
        "tasklet_started_total",
        "Total number of tasklets started",
        &[TASKLET_LABEL]
    )
    .unwrap();
    pub static ref TASKLET_STOPPED: IntCounterVec = register_int_counter_vec!(
        "tasklet_stopped_total",
        "Total number of tasklets stopped gracefully",
        &[TASKLET_LABEL]
    )
    .unwrap();
    pub static ref TASKLET_EXECUTIONS: IntCounterVec = register_int_counter_vec!(
        "tasklet_executions_total",
        "Total number of tasklet executions",
        &[TASKLET_LABEL]
    )
    .unwrap();
    pub static ref TASKLET_PAUSED: IntCounterVec = register_int_counter_vec!(
        "tasklet_paused_total",
        "Total number of times tasklets were paused",
        &[TASKLET_LABEL]
    )
    .unwrap();
    pub static ref TASKLET_RESUMED: IntCounterVec = register_int_counter_vec!(
        "tasklet_resumed_total",
        "Total number of times tasklets were resumed",
        &[TASKLET_LABEL]
    )
    .unwrap();
    pub static ref TASKLET_ACTIVE: IntGaugeVec = register_int_gauge_vec!(
        "tasklet_active",
        "Whether the tasklet is currently active (1) or not (0)",
        &[TASKLET_LABEL]
    )
    .unwrap();
    pub static ref TASKLET_EXECUTION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "tasklet_execution_duration_seconds",
        "Tasklet execution duration in seconds",
        &[TASKLET_LABEL]
    )
    .unwrap();
}
