//! Reporting sinks
//!
//! A sink receives each finished analysis once, together with the dialect
//! and the host's logical statement id. Sinks read the result and must not
//! keep references to it.

use crate::error::SinkError;
use async_trait::async_trait;
use parking_lot::Mutex;
use sqlscope_analyzer::AnalysisResult;
use sqlscope_core::DialectTag;
use std::fmt::Write as _;
use std::sync::Arc;

#[async_trait]
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &str;

    async fn report(
        &self,
        result: &AnalysisResult,
        dialect: DialectTag,
        statement_id: &str,
    ) -> Result<(), SinkError>;
}

/// Render a human-readable report
pub fn render_report(result: &AnalysisResult, dialect: DialectTag, statement_id: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "==== SQL analysis [{dialect}] {statement_id} ====");
    let _ = writeln!(out, "SQL: {}", result.sql);
    let _ = writeln!(out, "Execution time: {}ms", result.execution_time_ms);

    if let Some(metrics) = &result.postgres {
        if let Some(planning) = metrics.planning_time_ms {
            let _ = writeln!(out, "Planning time: {planning:.3}ms");
        }
        if let Some(ratio) = metrics.buffer_hit_ratio() {
            let _ = writeln!(out, "Shared buffer hit ratio: {:.2}%", ratio * 100.0);
        }
    }

    let _ = writeln!(out, "Plan:");
    if result.plan.is_empty() {
        let _ = writeln!(out, "  (no plan rows)");
    }
    for (index, row) in result.plan.iter().enumerate() {
        let fields: Vec<String> = row
            .iter()
            .map(|(key, value)| match value {
                serde_json::Value::String(s) => format!("{key}={s}"),
                other => format!("{key}={other}"),
            })
            .collect();
        let _ = writeln!(out, "  [{}] {}", index + 1, fields.join(", "));
    }

    let _ = writeln!(out, "Advice:");
    if result.advice.is_empty() {
        let _ = writeln!(out, "  no advice");
    }
    for (index, advice) in result.advice.iter().enumerate() {
        let _ = writeln!(out, "  {}. {advice}", index + 1);
    }
    out
}

/// Logs every report through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl ReportSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn report(
        &self,
        result: &AnalysisResult,
        dialect: DialectTag,
        statement_id: &str,
    ) -> Result<(), SinkError> {
        tracing::info!(
            statement_id,
            dialect = %dialect,
            execution_ms = result.execution_time_ms,
            advice_count = result.advice.len(),
            "{}",
            render_report(result, dialect, statement_id)
        );
        Ok(())
    }
}

/// Delivers each report to every registered sink.
///
/// A failing sink is logged and does not stop the others; the fan-out itself
/// never fails.
#[derive(Clone, Default)]
pub struct FanOutSink {
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl FanOutSink {
    pub fn new(sinks: Vec<Arc<dyn ReportSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn ReportSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl ReportSink for FanOutSink {
    fn name(&self) -> &str {
        "fan-out"
    }

    async fn report(
        &self,
        result: &AnalysisResult,
        dialect: DialectTag,
        statement_id: &str,
    ) -> Result<(), SinkError> {
        for sink in &self.sinks {
            if let Err(err) = sink.report(result, dialect, statement_id).await {
                tracing::warn!(sink = sink.name(), statement_id, error = %err, "report sink failed");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for FanOutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("FanOutSink").field("sinks", &names).finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectedReport {
    pub result: AnalysisResult,
    pub dialect: DialectTag,
    pub statement_id: String,
}

/// Keeps copies of every report in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<CollectedReport>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<CollectedReport> {
        self.reports.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn take(&self) -> Vec<CollectedReport> {
        std::mem::take(&mut *self.reports.lock())
    }
}

#[async_trait]
impl ReportSink for CollectingSink {
    fn name(&self) -> &str {
        "collecting"
    }

    async fn report(
        &self,
        result: &AnalysisResult,
        dialect: DialectTag,
        statement_id: &str,
    ) -> Result<(), SinkError> {
        self.reports.lock().push(CollectedReport {
            result: result.clone(),
            dialect,
            statement_id: statement_id.to_string(),
        });
        Ok(())
    }
}
