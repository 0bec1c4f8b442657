use sqlscope_analyzer::AdviceError;
use sqlscope_core::{BindError, CoreError, DialectTag};
use std::path::PathBuf;
use thiserror::Error;

/// Obtaining or parsing an execution plan failed
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("failed to obtain a connection: {0}")]
    Connection(#[source] CoreError),

    #[error("EXPLAIN failed: {0}")]
    Explain(#[source] CoreError),

    #[error("could not parse plan output: {0}")]
    InvalidPlan(String),

    #[error("parameter binding failed: {0}")]
    Bind(#[from] BindError),

    #[error("no plan acquirer registered for {0}")]
    Unsupported(DialectTag),
}

/// The bounded analysis queue was full at submission time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("analysis queue is full (pool size {pool_size}, queue capacity {queue_capacity})")]
pub struct DispatchOverflowError {
    pub pool_size: usize,
    pub queue_capacity: usize,
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Overflow(#[from] DispatchOverflowError),

    #[error("worker pool is shut down")]
    Closed,

    #[error("worker pool must be created inside a tokio runtime")]
    NoRuntime,

    #[error("invalid worker pool configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
#[error("report sink `{sink}` failed: {message}")]
pub struct SinkError {
    pub sink: String,
    pub message: String,
}

impl SinkError {
    pub fn new(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            message: message.into(),
        }
    }
}

/// Failure of a single analysis task
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Advice(#[from] AdviceError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Errors surfaced to the host by [`crate::SqlObserver::observe`]
#[derive(Debug, Error)]
pub enum ObserveError {
    /// Only returned under [`crate::OverflowPolicy::Propagate`]
    #[error(transparent)]
    Overflow(#[from] DispatchOverflowError),

    #[error("analysis pool is shut down")]
    PoolClosed,

    /// Only returned when analysis runs inline
    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for `{key}`: {message}")]
    Invalid { key: String, message: String },

    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}
