//! Logging bootstrap for applications embedding the batch engine
//!
//! The engine itself only emits `tracing` events and spans. Applications that
//! have no subscriber of their own can install one here: a pretty console
//! layer for development or a JSON layer for production, filtered by
//! `RUST_LOG` when set and by `LoggingConfig::default_filter` otherwise.

use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub default_filter: String,

    /// Emit JSON lines instead of pretty console output
    pub json: bool,

    /// Whether to include file/line information in logs
    pub include_location: bool,

    /// Whether to log span open/close events (batch and chunk timing)
    pub enable_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl LoggingConfig {
    /// Verbose pretty console output
    pub fn development() -> Self {
        Self {
            default_filter: "info,sqlbatch_engine=debug,sqlbatch_core=debug,sqlbatch_driver_sqlite=debug"
                .to_string(),
            json: false,
            include_location: cfg!(debug_assertions),
            enable_spans: cfg!(debug_assertions),
        }
    }

    /// JSON output, engine events at info and above
    pub fn production() -> Self {
        Self {
            default_filter: "warn,sqlbatch_engine=info,sqlbatch_driver_sqlite=info".to_string(),
            json: true,
            include_location: false,
            enable_spans: false,
        }
    }

    /// Everything, with locations
    pub fn testing() -> Self {
        Self {
            default_filter: "debug".to_string(),
            json: false,
            include_location: true,
            enable_spans: true,
        }
    }
}

/// Install a global subscriber built from `config`.
///
/// Returns an error if a global subscriber is already set.
pub fn init(config: LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))?;

    // NEW fires once per span; ENTER would repeat on every async re-poll.
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = if config.json {
        fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(env_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events)
            .pretty()
            .with_filter(env_filter)
            .boxed()
    };

    tracing_subscriber::registry().with(layer).try_init()?;

    tracing::info!(
        json = config.json,
        filter = %config.default_filter,
        "logging initialized"
    );

    Ok(())
}

/// Initialize logging with the build profile's configuration
pub fn init_default() -> anyhow::Result<()> {
    let config = if cfg!(debug_assertions) {
        LoggingConfig::development()
    } else {
        LoggingConfig::production()
    };

    init(config)
}
