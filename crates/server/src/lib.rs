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

pub mod http;

use futures::future::join_all;
use snafu::Snafu;
use tokio::{sync::oneshot::Receiver, task::JoinHandle};
use tokio_util::sync::CancellationToken;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("failed to parse bind address {addr}"))]
    ParseAddress {
        addr:   String,
        #[snafu(source)]
        source: std::net::AddrParseError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("failed to bind to {addr}"))]
    Bind {
        addr:   std::net::SocketAddr,
        #[snafu(source)]
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Handle for managing a running HTTP server.
///
/// Provides control over a running server: waiting for it to start accepting
/// connections, signalling graceful shutdown, and waiting for it to stop.
pub struct ServiceHandler {
    join_handle:        JoinHandle<()>,
    cancellation_token: CancellationToken,
    started_rx:         Option<Receiver<()>>,
}

impl ServiceHandler {
    /// Waits for the server to start accepting connections.
    ///
    /// # Panics
    /// Panics if called more than once, as the start signal is consumed.
    pub async fn wait_for_start(&mut self) -> Result<()> {
        self.started_rx
            .take()
            .expect("server start signal already consumed")
            .await
            .expect("failed to receive server start signal");
        Ok(())
    }

    /// Consumes the handle and blocks until the server task has finished.
    ///
    /// Use this after calling `shutdown()` to wait for clean termination.
    pub async fn wait_for_stop(self) -> Result<()> {
        join_all(std::iter::once(self.join_handle)).await;
        Ok(())
    }

    /// Signals the server to begin graceful shutdown without waiting.
    pub fn shutdown(&self) { self.cancellation_token.cancel(); }

    /// Returns `true` if the server task has completed.
    pub fn is_finished(&self) -> bool { self.join_handle.is_finished() }
}
