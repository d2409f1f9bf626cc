//! Tracing subscriber plugin.
//!
//! [`TracingPlugin`] installs a global `tracing` subscriber for the process
//! and exposes what it installed as the [`TracingConfig`] global.
//!
//! # Lifecycle
//!
//! - **`build()`** registers [`TracingConfig`] so other plugins can read the
//!   intended level while they build.
//! - **`ready()`** installs the subscriber. If one is already installed (a
//!   test harness, or a second server in the same process) the existing one
//!   is kept.
//!
//! # Filtering
//!
//! The filter comes from, in order: an explicit
//! [`with_env_filter`](TracingPlugin::with_env_filter) directive, the
//! `RUST_LOG` environment variable, and finally the configured level.
//!
//! ```
//! use stockpile_core_plugins::{TracingFormat, TracingPlugin};
//! use stockpile_system::server::Server;
//! use tracing::Level;
//!
//! let mut server = Server::new();
//! server.add_plugins(
//!     TracingPlugin::default()
//!         .with_level(Level::DEBUG)
//!         .with_format(TracingFormat::Compact)
//!         .with_env_filter("stockpile_pool=trace,warn"),
//! );
//! server.finish();
//! ```

use stockpile_system::plugin::Plugin;
use stockpile_system::resource::GlobalResource;
use stockpile_system::server::Server;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

// ─────────────────────────────────────────────────────────────────────────────
// TracingFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Multi-line human-readable output (default).
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// Newline-delimited JSON for log collectors.
    Json,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingConfig
// ─────────────────────────────────────────────────────────────────────────────

/// The tracing settings a [`TracingPlugin`] was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracingConfig {
    /// Maximum level when no filter directive overrides it.
    pub level: Level,
    /// Output format.
    pub format: TracingFormat,
}

impl GlobalResource for TracingConfig {}

// ─────────────────────────────────────────────────────────────────────────────
// TracingPlugin
// ─────────────────────────────────────────────────────────────────────────────

/// Installs the process-wide `tracing` subscriber.
///
/// # Resources Provided
///
/// | Resource | Kind | Description |
/// |----------|------|-------------|
/// | [`TracingConfig`] | Global | Level and format in effect |
#[derive(Debug, Clone)]
pub struct TracingPlugin {
    level: Level,
    format: TracingFormat,
    /// Filter directives, e.g. `"stockpile_pool=debug,warn"`.
    env_filter: Option<String>,
    /// Emit span enter/exit events.
    span_events: bool,
}

impl Default for TracingPlugin {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingPlugin {
    /// Creates the plugin with `INFO` level and pretty output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets filter directives (`target=level,...`). Takes precedence over
    /// `RUST_LOG`.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables span enter/exit events.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    fn filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.as_str());
        match &self.env_filter {
            Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|error| {
                tracing::warn!(%error, directives, "invalid filter directives; using level");
                fallback()
            }),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

impl Plugin for TracingPlugin {
    fn build(&self, server: &mut Server) {
        server.insert_global(TracingConfig {
            level: self.level,
            format: self.format,
        });
    }

    fn ready(&self, _server: &mut Server) {
        let span_events = if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        };

        let output = match self.format {
            TracingFormat::Pretty => tracing_subscriber::fmt::layer()
                .pretty()
                .with_span_events(span_events)
                .boxed(),
            TracingFormat::Compact => tracing_subscriber::fmt::layer()
                .compact()
                .with_span_events(span_events)
                .boxed(),
            TracingFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(span_events)
                .boxed(),
        };

        let installed = tracing_subscriber::registry()
            .with(output)
            .with(self.filter())
            .try_init()
            .is_ok();

        tracing::info!(
            level = %self.level,
            format = ?self.format,
            installed,
            "TracingPlugin ready"
        );
    }

    fn cleanup(&self, _server: &mut Server) {
        tracing::info!("TracingPlugin shutting down");
    }
}
