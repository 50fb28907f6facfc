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

//! Dual-mode task execution for relay workers.
//!
//! A worker never runs a task directly; it asks an [`ExecutionProvider`] for
//! an [`Executor`] slot, which is either a reusable [`ProcessPoolExecutor`]
//! or a one-shot [`ContainerExecutor`]. Both satisfy the same contract —
//! `execute`, `terminate`, `is_healthy`, `status` — so the worker's HTTP
//! handlers never need to know which one they got.

mod artifacts;
mod container;
mod error;
mod executor;
mod process;
mod provider;

pub use container::{ContainerConfig, ContainerExecutor};
pub use error::{Error, Result};
pub use executor::{Executor, ExecutorState, ExecutorStatus};
pub use process::{ProcessPoolConfig, ProcessPoolExecutor};
pub use provider::{AnyExecutor, ExecutionProvider, ProviderConfig};
