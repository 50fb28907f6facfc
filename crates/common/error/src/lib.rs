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

use std::{any::Any, error::Error as StdError, sync::Arc};

use axum::{Json, http::StatusCode as HttpStatusCode, response::IntoResponse};
use relay_types::{ErrorKind, TaskError};
use snafu::Snafu;

/// Maps the stable [`ErrorKind`] vocabulary to an HTTP status code, the one
/// place this crate centralizes that table rather than scattering `match`es
/// across handlers.
#[must_use]
pub fn http_status(kind: ErrorKind) -> HttpStatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::ModeUnsupported => HttpStatusCode::BAD_REQUEST,
        ErrorKind::DuplicateTask => HttpStatusCode::CONFLICT,
        ErrorKind::NotFound => HttpStatusCode::NOT_FOUND,
        ErrorKind::SessionExpired => HttpStatusCode::GONE,
        ErrorKind::NoWorkersAvailable
        | ErrorKind::TimedOut
        | ErrorKind::WorkerLost
        | ErrorKind::DependencyFailed
        | ErrorKind::ExecutorTerminated
        | ErrorKind::Internal => HttpStatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Allows a long source chain to be rendered one layer at a time and
/// inspected for its root cause, the way the rest of the stack's error
/// types do.
pub trait StackError: StdError {
    fn next(&self) -> Option<&dyn StackError>;

    fn last(&self) -> &dyn StackError
    where
        Self: Sized,
    {
        let Some(mut result) = self.next() else {
            return self;
        };
        while let Some(err) = result.next() {
            result = err;
        }
        result
    }
}

pub trait ErrorExt: StackError {
    fn kind(&self) -> ErrorKind { ErrorKind::Internal }

    fn as_any(&self) -> &dyn Any;

    fn root_cause(&self) -> Option<&dyn StdError>
    where
        Self: Sized,
    {
        let error = self.last();
        let mut source = error.source()?;
        while let Some(next) = source.source() {
            source = next;
        }
        Some(source)
    }
}

impl<T: ?Sized + StackError> StackError for Arc<T> {
    fn next(&self) -> Option<&dyn StackError> { self.as_ref().next() }
}

impl<T: StackError> StackError for Box<T> {
    fn next(&self) -> Option<&dyn StackError> { self.as_ref().next() }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type. Each variant corresponds 1:1 to a stable
/// `ErrorKind` and carries whatever context is useful for logging; only
/// `kind()` and `Display` cross the HTTP boundary.
#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("validation failed: {message}"))]
    Validation {
        message: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("task {task_id} already exists"))]
    DuplicateTask {
        task_id: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("{resource} {id} not found"))]
    NotFound {
        resource: String,
        id: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("session {session_id} expired"))]
    SessionExpired {
        session_id: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("worker {worker_id} does not support mode {mode}"))]
    ModeUnsupported {
        worker_id: String,
        mode: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("no compatible worker available for task {task_id}"))]
    NoWorkersAvailable {
        task_id: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("task {task_id} timed out after {elapsed_ms}ms"))]
    TimedOut {
        task_id: String,
        elapsed_ms: u64,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("worker {worker_id} lost"))]
    WorkerLost {
        worker_id: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("task {task_id} blocked by failed dependency {dependency_id}"))]
    DependencyFailed {
        task_id: String,
        dependency_id: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("executor for task {task_id} was terminated"))]
    ExecutorTerminated {
        task_id: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("internal error: {message}"))]
    Internal {
        message: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },
}

impl Error {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::DuplicateTask { .. } => ErrorKind::DuplicateTask,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::SessionExpired { .. } => ErrorKind::SessionExpired,
            Self::ModeUnsupported { .. } => ErrorKind::ModeUnsupported,
            Self::NoWorkersAvailable { .. } => ErrorKind::NoWorkersAvailable,
            Self::TimedOut { .. } => ErrorKind::TimedOut,
            Self::WorkerLost { .. } => ErrorKind::WorkerLost,
            Self::DependencyFailed { .. } => ErrorKind::DependencyFailed,
            Self::ExecutorTerminated { .. } => ErrorKind::ExecutorTerminated,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    #[must_use]
    pub fn http_status(&self) -> HttpStatusCode { http_status(self.kind()) }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        InternalSnafu { message: message.into() }.build()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.http_status();
        let body = TaskError::new(self.kind(), self.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_task_maps_to_409() {
        let err = DuplicateTaskSnafu { task_id: "t1" }.build();
        assert_eq!(err.kind(), ErrorKind::DuplicateTask);
        assert_eq!(err.http_status(), HttpStatusCode::CONFLICT);
    }

    #[test]
    fn session_expired_maps_to_410() {
        let err = SessionExpiredSnafu { session_id: "s1" }.build();
        assert_eq!(err.http_status(), HttpStatusCode::GONE);
    }

    #[test]
    fn not_found_message_names_resource_and_id() {
        let err = NotFoundSnafu { resource: "task", id: "t1" }.build();
        assert_eq!(err.to_string(), "task t1 not found");
    }
}
