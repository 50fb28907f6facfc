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

use relay_types::ErrorKind;
use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors internal to the process-pool and container executors.
///
/// These never cross the HTTP boundary directly; callers fold them into a
/// terminal `TaskResult::failed` or, for provider-level failures that do
/// cross the boundary (`mode-unsupported`, `executor-terminated`), into
/// [`relay_error::Error`] via [`Error::kind`].
#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("failed to spawn child process: {source}"))]
    Spawn {
        #[snafu(source)]
        source: std::io::Error,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("failed to write to child stdin: {source}"))]
    WriteStdin {
        #[snafu(source)]
        source: std::io::Error,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("failed to read child stdout: {source}"))]
    ReadStdout {
        #[snafu(source)]
        source: std::io::Error,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("executor for task {task_id} timed out after {elapsed_ms}ms"))]
    TimedOut {
        task_id:    String,
        elapsed_ms: u64,
        #[snafu(implicit)]
        loc:        snafu::Location,
    },

    #[snafu(display("executor was terminated"))]
    Terminated {
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("docker error: {source}"))]
    Docker {
        #[snafu(source)]
        source: bollard::errors::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("failed to snapshot workspace {path}: {source}"))]
    Snapshot {
        path:       String,
        #[snafu(source)]
        source:     walkdir::Error,
        #[snafu(implicit)]
        loc:        snafu::Location,
    },

    #[snafu(display("worker does not support execution mode {mode}"))]
    ModeUnsupported {
        mode: String,
        #[snafu(implicit)]
        loc:  snafu::Location,
    },

    #[snafu(display("{message}"))]
    Other {
        message: String,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },
}

impl Error {
    /// Maps an internal executor failure onto the stable error-kind
    /// vocabulary, for the provider-level errors that do surface through the
    /// worker's HTTP handlers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::TimedOut { .. } => ErrorKind::TimedOut,
            Self::Terminated { .. } => ErrorKind::ExecutorTerminated,
            Self::ModeUnsupported { .. } => ErrorKind::ModeUnsupported,
            _ => ErrorKind::Internal,
        }
    }
}
