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

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The stable, exhaustive vocabulary of error kinds used across the HTTP
/// surface. Lives here, rather than in `relay-error`, so that wire DTOs can
/// reference it without pulling in `relay-error`'s heavier `snafu` machinery
/// and its axum `IntoResponse` impls.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Validation,
    DuplicateTask,
    NotFound,
    SessionExpired,
    ModeUnsupported,
    NoWorkersAvailable,
    TimedOut,
    WorkerLost,
    DependencyFailed,
    ExecutorTerminated,
    Internal,
}

/// The JSON body shape returned on every error response: `{error, message}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskError {
    pub error: ErrorKind,
    pub message: String,
}

impl TaskError {
    #[must_use]
    pub fn new(error: ErrorKind, message: impl Into<String>) -> Self { Self { error, message: message.into() } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_serializes_kebab_case() {
        assert_eq!(serde_json::to_string(&ErrorKind::DuplicateTask).unwrap(), "\"duplicate-task\"");
        assert_eq!(serde_json::to_string(&ErrorKind::NoWorkersAvailable).unwrap(), "\"no-workers-available\"");
    }

    #[test]
    fn task_error_round_trips() {
        let err = TaskError::new(ErrorKind::NotFound, "unknown task id");
        let json = serde_json::to_string(&err).unwrap();
        let back: TaskError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
