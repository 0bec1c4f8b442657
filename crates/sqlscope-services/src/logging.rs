//! Subscriber setup for hosts that do not install their own
//!
//! The library only emits `tracing` events. Hosts that already run a
//! subscriber can ignore this module; others call [`init`] once at startup.

use anyhow::Context as _;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const LOG_FILE_PREFIX: &str = "sqlscope.log";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for the rolling JSON log
    pub log_dir: PathBuf,

    /// Write JSON lines to a daily-rotated file
    pub enable_json_logs: bool,

    /// Human-readable output on stderr
    pub enable_console_logs: bool,

    pub include_location: bool,

    /// Emit span open/close events, which carry analysis timings
    pub enable_spans: bool,

    /// Used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: true,
            enable_console_logs: true,
            include_location: cfg!(debug_assertions),
            enable_spans: cfg!(debug_assertions),
            default_filter: "info,sqlscope_services=debug,sqlscope_analyzer=debug,sqlscope_core=debug"
                .to_string(),
        }
    }
}

impl LoggingConfig {
    /// JSON file only; advice is reported at warn and above
    pub fn production() -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: true,
            enable_console_logs: false,
            include_location: false,
            enable_spans: false,
            default_filter: "warn,sqlscope_services=info".to_string(),
        }
    }

    pub fn development() -> Self {
        Self::default()
    }

    /// Console only, nothing written to disk
    pub fn testing() -> Self {
        Self {
            log_dir: std::env::temp_dir().join("sqlscope-tests"),
            enable_json_logs: false,
            enable_console_logs: true,
            include_location: true,
            enable_spans: true,
            default_filter: "debug".to_string(),
        }
    }
}

/// Install a global subscriber built from `config`.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for as long as the process logs. Fails if a global subscriber is already
/// set.
pub fn init(config: LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    // ENTER would fire on every re-poll of an awaited future
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();
    let mut guard = None;

    if config.enable_console_logs {
        layers.push(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_span_events(span_events.clone())
                .with_filter(env_filter.clone())
                .boxed(),
        );
    }

    if config.enable_json_logs {
        std::fs::create_dir_all(&config.log_dir).with_context(|| {
            format!("failed to create log directory {}", config.log_dir.display())
        })?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        guard = Some(worker_guard);

        layers.push(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(span_events)
                .with_current_span(true)
                .with_span_list(true)
                .with_filter(env_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::info!(
        log_dir = %config.log_dir.display(),
        json_enabled = config.enable_json_logs,
        console_enabled = config.enable_console_logs,
        "sqlscope logging initialized"
    );

    Ok(guard)
}

/// [`LoggingConfig::development`] in debug builds, production otherwise
pub fn init_default() -> anyhow::Result<Option<WorkerGuard>> {
    if cfg!(debug_assertions) {
        init(LoggingConfig::development())
    } else {
        init(LoggingConfig::production())
    }
}

pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sqlscope")
        .join("logs")
}
