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

use axum::{Router, extract::DefaultBodyLimit};
use relay_types::ReadableSize;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::ResultExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::{BindSnafu, ParseAddressSnafu, Result, ServiceHandler};

/// Default maximum HTTP request body size (100 MiB).
pub const DEFAULT_MAX_HTTP_BODY_SIZE: ReadableSize = ReadableSize::mb(100);

/// Configuration shared by the driver's and each worker's REST server.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, bon::Builder)]
pub struct RestServerConfig {
    /// The address to bind the REST server to.
    #[default = "127.0.0.1:3000"]
    pub bind_address:  String,
    /// Maximum HTTP request body size.
    #[default(_code = "DEFAULT_MAX_HTTP_BODY_SIZE")]
    pub max_body_size: ReadableSize,
    /// Whether to enable permissive CORS, as configured by `corsOrigin`.
    #[default = true]
    pub enable_cors:   bool,
}

/// Binds and serves a pre-built router, returning a handle for lifecycle
/// management.
///
/// The caller is responsible for attaching application state to `router`
/// (via `.with_state`) and registering its own routes before calling this.
/// This function only layers on body-size limiting, optional CORS, and
/// graceful shutdown wiring, then spawns the listener in a background task.
pub async fn start_rest_server(config: RestServerConfig, router: Router) -> Result<ServiceHandler> {
    let bind_addr = config
        .bind_address
        .parse::<std::net::SocketAddr>()
        .context(ParseAddressSnafu {
            addr: config.bind_address.clone(),
        })?;

    let mut router =
        router.layer(DefaultBodyLimit::max(config.max_body_size.as_bytes() as usize));

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .context(BindSnafu { addr: bind_addr })?;

    let cancellation_token = CancellationToken::new();
    let (started_tx, started_rx) = oneshot::channel::<()>();
    let cancellation_token_clone = cancellation_token.clone();

    let join_handle = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                info!(addr = %bind_addr, "http server starting");
                let _ = started_tx.send(());
                cancellation_token_clone.cancelled().await;
                info!(addr = %bind_addr, "http server received shutdown signal");
            })
            .await;

        if let Err(err) = result {
            tracing::error!(addr = %bind_addr, error = ?err, "http server task failed");
        } else {
            info!(addr = %bind_addr, "http server task completed");
        }
    });

    Ok(ServiceHandler {
        join_handle,
        cancellation_token,
        started_rx: Some(started_rx),
    })
}

#[cfg(test)]
mod tests {
    use axum::{Json, routing::get};

    use super::*;

    async fn get_available_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[tokio::test]
    async fn server_starts_serves_and_stops() {
        let port = get_available_port().await;
        let config = RestServerConfig {
            bind_address: format!("127.0.0.1:{port}"),
            ..RestServerConfig::default()
        };
        let router = Router::new().route("/ping", get(|| async { Json("pong") }));

        let mut handler = start_rest_server(config, router).await.unwrap();
        handler.wait_for_start().await.unwrap();

        let response = reqwest::Client::new()
            .get(format!("http://127.0.0.1:{port}/ping"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        handler.shutdown();
        handler.wait_for_stop().await.unwrap();
    }

    #[tokio::test]
    async fn rejects_unparsable_bind_address() {
        let config = RestServerConfig {
            bind_address: "not-an-address".to_string(),
            ..RestServerConfig::default()
        };
        let router = Router::new();
        assert!(start_rest_server(config, router).await.is_err());
    }
}
