//! sqlscope services layer
//!
//! Everything between the host's statement pipeline and the pure analysis
//! code in `sqlscope-analyzer`.
//!
//! # Architecture
//!
//! ```text
//! host statement pipeline
//!     ↓ observe(statement, provider, execution time)
//! SqlObserver ── DispatchGate (enabled / sampling / threshold)
//!     ↓ inline, or WorkerPool (bounded queue, fail-fast)
//! analysis task ── ResultCache (single-flight) ── PlanAcquirer (per dialect)
//!     ↓ AdviceEngine
//! ReportSink(s)
//! ```
//!
//! # Components
//!
//! - [`SqlObserver`] - entry point; owns the pool, cache, acquirers and sinks
//! - [`DispatchGate`] - decides per statement whether to analyze
//! - [`WorkerPool`] - fixed-size async workers behind a bounded queue
//! - [`ResultCache`] - LRU + expiry plan cache with single-flight loads
//! - [`PlanAcquirer`] - MySQL, PostgreSQL and Oracle EXPLAIN strategies
//! - [`ReportSink`] - where finished analyses are delivered

mod acquirer;
mod cache;
mod config;
mod error;
mod gate;
pub mod logging;
mod observer;
mod pool;
mod sink;

pub use acquirer::{
    AcquirerRegistry, MySqlAcquirer, OracleAcquirer, PlanAcquirer, PostgresAcquirer,
};
pub use cache::{CacheStats, ResultCache};
pub use config::{
    CacheConfig, CacheSpec, OverflowPolicy, RuleToggles, SqlScopeConfig, parse_duration,
};
pub use error::{
    AcquisitionError, AnalysisError, ConfigError, DispatchOverflowError, ObserveError, PoolError,
    SinkError,
};
pub use gate::DispatchGate;
pub use observer::{ObserverBuilder, Outcome, SqlObserver};
pub use pool::WorkerPool;
pub use sink::{CollectedReport, CollectingSink, FanOutSink, ReportSink, TracingSink, render_report};
