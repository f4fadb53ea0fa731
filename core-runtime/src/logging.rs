//! # Logging
//!
//! Installs a `tracing` subscriber for hosts that do not bring their own.
//! Workspace crates log at the configured level and the HTTP and SQLite
//! stacks are held at `warn`. `RUST_LOG` overrides the default filter.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::time::LogLevel;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = LoggingConfig::default()
//!         .with_format(LogFormat::Pretty)
//!         .with_level(LogLevel::Debug);
//!
//!     init_logging(config).expect("Failed to initialize logging");
//!
//!     tracing::info!("Podcast hub started");
//! }
//! ```

use crate::error::{Error, Result};
use bridge_traits::time::LogLevel;
use std::io;
use tracing_subscriber::{
    filter::EnvFilter, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Workspace crates covered by the default filter.
const WORKSPACE_TARGETS: &[&str] = &[
    "podcast_hub_workspace",
    "core_runtime",
    "core_catalog",
    "core_cache",
    "core_query",
    "core_library",
    "core_service",
    "bridge_desktop",
];

/// Noisy dependencies pinned to `warn`.
const QUIET_TARGETS: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "rustls", "sqlx"];

/// Output shape of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored; for a developer terminal
    Pretty,
    /// One JSON object per line
    Json,
    /// One plain line per event
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level for the workspace crates when no filter is given
    pub level: LogLevel,
    /// Full `EnvFilter` directive, e.g. `core_query=debug,core_cache=trace`.
    /// Takes precedence over `RUST_LOG` and `level`.
    pub filter: Option<String>,
    /// Log span closes (pretty) or the span stack (json)
    pub enable_spans: bool,
    pub display_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            enable_spans: true,
            display_target: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// [`Error::Config`] when a subscriber is already installed or the filter
/// does not parse.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config, std::env::var(EnvFilter::DEFAULT_ENV).ok())?;
    let registry = tracing_subscriber::registry().with(filter);
    let fmt = tracing_subscriber::fmt::layer()
        .with_target(config.display_target)
        .with_writer(io::stdout);

    let installed = match config.format {
        LogFormat::Pretty => registry
            .with(fmt.pretty().with_span_events(if config.enable_spans {
                FmtSpan::CLOSE
            } else {
                FmtSpan::NONE
            }))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt.json()
                    .flatten_event(true)
                    .with_current_span(config.enable_spans)
                    .with_span_list(config.enable_spans),
            )
            .try_init(),
        LogFormat::Compact => registry.with(fmt.compact()).try_init(),
    };

    installed.map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

/// Explicit filter, then `RUST_LOG`, then the workspace default.
fn build_filter(config: &LoggingConfig, from_env: Option<String>) -> Result<EnvFilter> {
    let directives = config
        .filter
        .clone()
        .or(from_env.filter(|env| !env.trim().is_empty()))
        .unwrap_or_else(|| default_filter(config.level));

    EnvFilter::try_new(directives).map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

/// Our crates at `level`, dependencies at warn.
fn default_filter(level: LogLevel) -> String {
    let level = level.as_directive();

    WORKSPACE_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .chain(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Drop the query string and fragment from a URL before logging it.
///
/// Relay URLs embed the whole target URL in their query string, which makes
/// info-level lines long and leaks lookup parameters. Debug-level logs keep
/// the full URL.
///
/// ```ignore
/// use core_runtime::logging::redact_url_query;
///
/// let url = "https://api.allorigins.win/get?url=https%3A%2F%2Fitunes.apple.com";
/// assert_eq!(redact_url_query(url), "https://api.allorigins.win/get?…");
/// ```
pub fn redact_url_query(url: &str) -> String {
    match url.find(['?', '#']) {
        Some(pos) => format!("{}?…", &url[..pos]),
        None => url.to_string(),
    }
}
