//! Per-statement analysis decision
//!
//! Runs on the host's call path for every statement, so it only does a
//! couple of comparisons and at most one random draw.

use crate::config::SqlScopeConfig;
use rand::Rng;
use sqlscope_core::placeholders;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchGate {
    pub enabled: bool,
    pub sample_rate: f64,
    pub threshold_ms: u64,
    pub explain_all: bool,
}

impl DispatchGate {
    pub fn from_config(config: &SqlScopeConfig) -> Self {
        Self {
            enabled: config.enabled,
            sample_rate: config.sample_rate,
            threshold_ms: config.threshold_ms,
            explain_all: config.explain_all,
        }
    }

    /// Decide using the thread-local RNG; statements that are already
    /// EXPLAINs are never analyzed
    pub fn should_analyze(&self, sql: &str, execution_time_ms: u64) -> bool {
        !placeholders::is_explain(sql)
            && self.decide(execution_time_ms, &mut rand::thread_rng())
    }

    /// The sampling and threshold policy with an explicit RNG.
    ///
    /// Each call is an independent coin flip; nothing is carried between
    /// calls. Execution exactly at the threshold is not analyzed.
    pub fn decide<R: Rng + ?Sized>(&self, execution_time_ms: u64, rng: &mut R) -> bool {
        if !self.enabled {
            return false;
        }
        if self.sample_rate < 1.0 && rng.r#gen::<f64>() >= self.sample_rate {
            return false;
        }
        self.explain_all || execution_time_ms > self.threshold_ms
    }
}
