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

//! Structured logging setup: an `EnvFilter`-driven `tracing` subscriber with
//! optional file output, reloadable at runtime via [`RELOAD_HANDLE`].

use std::{
    env,
    io::IsTerminal,
    sync::{Arc, Mutex, Once},
};

use bon::Builder;
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Deserializer, Serialize, de};
use smart_default::SmartDefault;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Registry, filter, layer::SubscriberExt, prelude::*};

/// Deserializes a string value, falling back to `Default::default()` when
/// the string is empty, so config fields can treat a missing value and an
/// empty string the same way.
///
/// # Errors
/// Returns an error if the non-empty string fails to parse into `T`.
pub fn empty_string_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(T::default())
    } else {
        T::deserialize(de::value::StrDeserializer::new(&s))
            .map_err(|e: de::value::Error| de::Error::custom(format!("invalid value, expect empty string, err: {e}")))
    }
}

/// Default directory name for log files when file logging is enabled.
pub const DEFAULT_LOGGING_DIR: &str = "logs";

/// Handle for dynamically reloading the log level filter at runtime, set
/// once by [`init_global_logging`].
pub static RELOAD_HANDLE: OnceCell<tracing_subscriber::reload::Handle<filter::Targets, Registry>> = OnceCell::new();

/// Configuration for the logging subsystem, layered into the rest of the
/// process configuration the same way as every other config section.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for rotated log files. Empty means stdout-only.
    #[default = ""]
    pub dir: String,

    /// Filter string, e.g. `"info,relay_scheduler=debug"`. Falls back to
    /// `RUST_LOG`, then `"info"`.
    pub level: Option<String>,

    /// Text for development, JSON for pipelines that parse log output.
    #[serde(default, deserialize_with = "empty_string_as_default")]
    pub log_format: LogFormat,

    /// Rotated files retained per stream (main + error), hourly rotation.
    #[default = 720]
    pub max_log_files: usize,

    #[default = true]
    pub append_stdout: bool,
}

/// Available log output formats.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// Sets up logging with defaults: stdout only, text format, filtered by
/// `RUST_LOG` or `"info"`.
#[must_use]
pub fn init_tracing_subscriber(app_name: &str) -> Vec<WorkerGuard> {
    init_global_logging(app_name, &LoggingOptions::default())
}

/// Sets up logging for unit tests: file-based, debug by default, configured
/// via `UNITTEST_LOG_DIR`/`UNITTEST_LOG_LEVEL`. Safe to call from many test
/// functions; only the first call takes effect.
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let mut guard = GLOBAL_UT_LOG_GUARD.as_ref().lock().unwrap();

        let dir = env::var("UNITTEST_LOG_DIR").unwrap_or_else(|_| "/tmp/__relay_unittest_logs".to_string());
        let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| "debug,hyper=warn,tower=warn,reqwest=warn,h2=info".to_string());

        let opts = LoggingOptions { dir: dir.clone(), level: Some(level), ..Default::default() };
        *guard = Some(init_global_logging("unittest", &opts));

        tracing::info!("logs dir = {}", dir);
    });
}

static GLOBAL_UT_LOG_GUARD: Lazy<Arc<Mutex<Option<Vec<WorkerGuard>>>>> = Lazy::new(|| Arc::new(Mutex::new(None)));

const DEFAULT_LOG_TARGETS: &str = "info";

/// Sets up the global `tracing` subscriber: stdout and/or rotated file
/// layers, an error-only file layer, and a reloadable `EnvFilter`. Callable
/// once per process; later calls are no-ops.
pub fn init_global_logging(app_name: &str, opts: &LoggingOptions) -> Vec<WorkerGuard> {
    static START: Once = Once::new();
    let mut guards = vec![];

    START.call_once(|| {
        LogTracer::init().expect("log tracer must be valid");

        let stdout_logging_layer = if opts.append_stdout {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            guards.push(guard);

            if opts.log_format == LogFormat::Json {
                Some(
                    tracing_subscriber::fmt::Layer::new()
                        .json()
                        .with_writer(writer)
                        .with_ansi(std::io::stdout().is_terminal())
                        .with_current_span(true)
                        .with_span_list(true)
                        .boxed(),
                )
            } else {
                Some(tracing_subscriber::fmt::Layer::new().with_writer(writer).with_ansi(std::io::stdout().is_terminal()).boxed())
            }
        } else {
            None
        };

        let file_logging_layer = if opts.dir.is_empty() {
            None
        } else {
            let rolling_appender = RollingFileAppender::builder()
                .rotation(Rotation::HOURLY)
                .filename_prefix("relay")
                .max_log_files(opts.max_log_files)
                .build(&opts.dir)
                .unwrap_or_else(|e| panic!("initializing rolling file appender at {} failed: {e}", &opts.dir));
            let (writer, guard) = tracing_appender::non_blocking(rolling_appender);
            guards.push(guard);

            if opts.log_format == LogFormat::Json {
                Some(
                    tracing_subscriber::fmt::Layer::new()
                        .json()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_current_span(true)
                        .with_span_list(true)
                        .boxed(),
                )
            } else {
                Some(tracing_subscriber::fmt::Layer::new().with_writer(writer).with_ansi(false).boxed())
            }
        };

        let err_file_logging_layer = if opts.dir.is_empty() {
            None
        } else {
            let rolling_appender = RollingFileAppender::builder()
                .rotation(Rotation::HOURLY)
                .filename_prefix("relay-err")
                .max_log_files(opts.max_log_files)
                .build(&opts.dir)
                .unwrap_or_else(|e| panic!("initializing rolling file appender at {} failed: {e}", &opts.dir));
            let (writer, guard) = tracing_appender::non_blocking(rolling_appender);
            guards.push(guard);

            if opts.log_format == LogFormat::Json {
                Some(
                    tracing_subscriber::fmt::Layer::new()
                        .json()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_filter(filter::LevelFilter::ERROR)
                        .boxed(),
                )
            } else {
                Some(
                    tracing_subscriber::fmt::Layer::new()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_filter(filter::LevelFilter::ERROR)
                        .boxed(),
                )
            }
        };

        let filter = opts
            .level
            .as_deref()
            .or(env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
            .unwrap_or(DEFAULT_LOG_TARGETS)
            .parse::<filter::Targets>()
            .expect("error parsing log level string");

        let (dyn_filter, reload_handle) = tracing_subscriber::reload::Layer::new(filter);
        RELOAD_HANDLE.set(reload_handle).expect("reload handle already set, maybe init_global_logging got called twice?");

        let subscriber =
            Registry::default().with(dyn_filter).with(stdout_logging_layer).with(file_logging_layer).with(err_file_logging_layer);

        let _ = app_name;
        tracing::subscriber::set_global_default(subscriber).expect("error setting global tracing subscriber");
    });

    guards
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_log_to_stdout_only() {
        let opts = LoggingOptions::default();
        assert!(opts.dir.is_empty());
        assert!(opts.append_stdout);
        assert_eq!(opts.log_format, LogFormat::Text);
    }

    #[test]
    fn empty_string_deserializes_to_default_format() {
        let parsed: LogFormat =
            empty_string_as_default(serde::de::value::StrDeserializer::<serde::de::value::Error>::new("")).unwrap();
        assert_eq!(parsed, LogFormat::Text);
    }
}
