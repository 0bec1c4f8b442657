//! Analysis results and plan-row accessors

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of normalized EXPLAIN output, keyed by column or plan property
/// name in the order the database reported them.
pub type PlanRow = IndexMap<String, Value>;

/// Server-reported PostgreSQL timing and buffer figures.
///
/// Buffer counters come from the top plan node, which accumulates the
/// counters of its children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostgresMetrics {
    pub planning_time_ms: Option<f64>,
    /// Execution time as measured by the server during `EXPLAIN ANALYZE`
    pub execution_time_ms: Option<f64>,
    pub shared_hit_blocks: Option<i64>,
    pub shared_read_blocks: Option<i64>,
    pub temp_read_blocks: Option<i64>,
    pub temp_written_blocks: Option<i64>,
    /// Whether the statement was JIT compiled
    pub jit: bool,
}

impl PostgresMetrics {
    /// Shared buffer hit ratio in `0.0..=1.0`, if any blocks were touched
    pub fn buffer_hit_ratio(&self) -> Option<f64> {
        let hit = self.shared_hit_blocks.unwrap_or(0);
        let read = self.shared_read_blocks.unwrap_or(0);
        let total = hit + read;
        (total > 0).then(|| hit as f64 / total as f64)
    }
}

/// Everything known about one analyzed statement.
///
/// Created by a plan acquirer; the execution time and advice are filled in
/// by the observer once the plan is available. Cached results are cloned
/// before being completed, so a cached value never carries per-execution
/// figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// The statement text as it was executed
    pub sql: String,
    /// Normalized plan rows
    pub plan: Vec<PlanRow>,
    /// Host-measured execution time of the original statement
    pub execution_time_ms: u64,
    /// Advisory messages, in rule registration order
    pub advice: Vec<String>,
    /// PostgreSQL-only server metrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresMetrics>,
}

impl AnalysisResult {
    pub fn new(sql: impl Into<String>, plan: Vec<PlanRow>) -> Self {
        Self {
            sql: sql.into(),
            plan,
            ..Default::default()
        }
    }

    pub fn with_postgres_metrics(mut self, metrics: PostgresMetrics) -> Self {
        self.postgres = Some(metrics);
        self
    }

    pub fn with_execution_time(mut self, execution_time_ms: u64) -> Self {
        self.execution_time_ms = execution_time_ms;
        self
    }
}

/// Typed accessors over [`PlanRow`].
///
/// MySQL and Oracle drivers may report numbers as text, so the numeric
/// accessors also parse numeric strings. JSON `null` and the literal text
/// `"null"` both count as absent.
pub trait PlanRowExt {
    fn field(&self, name: &str) -> Option<&Value>;

    fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Any non-null field rendered as text
    fn text_field(&self, name: &str) -> Option<String> {
        self.field(name).map(|value| match value {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
            other => other.to_string(),
        })
    }

    fn f64_field(&self, name: &str) -> Option<f64> {
        match self.field(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn i64_field(&self, name: &str) -> Option<i64> {
        match self.field(name)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            _ => None,
        }
    }

    fn bool_field(&self, name: &str) -> Option<bool> {
        match self.field(name)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }
}

impl PlanRowExt for PlanRow {
    fn field(&self, name: &str) -> Option<&Value> {
        match self.get(name)? {
            Value::Null => None,
            Value::String(s) if s.eq_ignore_ascii_case("null") => None,
            value => Some(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> PlanRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_null_fields_are_absent() {
        let r = row(&[("key", Value::Null), ("ref", json!("NULL")), ("type", json!("ALL"))]);
        assert!(!r.has_field("key"));
        assert!(!r.has_field("ref"));
        assert!(!r.has_field("missing"));
        assert_eq!(r.str_field("type"), Some("ALL"));
    }

    #[test]
    fn test_numeric_fields_parse_text() {
        let r = row(&[("rows", json!("1500")), ("filtered", json!("75.50")), ("loops", json!(2.0))]);
        assert_eq!(r.i64_field("rows"), Some(1500));
        assert_eq!(r.f64_field("filtered"), Some(75.5));
        assert_eq!(r.i64_field("loops"), Some(2));
        assert_eq!(r.i64_field("filtered"), Some(75));
    }

    #[test]
    fn test_text_field_joins_arrays() {
        let r = row(&[("Sort Key", json!(["a", "b DESC"]))]);
        assert_eq!(r.text_field("Sort Key").as_deref(), Some("a, b DESC"));
    }

    #[test]
    fn test_buffer_hit_ratio() {
        let metrics = PostgresMetrics {
            shared_hit_blocks: Some(80),
            shared_read_blocks: Some(20),
            ..Default::default()
        };
        assert_eq!(metrics.buffer_hit_ratio(), Some(0.8));
        assert_eq!(PostgresMetrics::default().buffer_hit_ratio(), None);
    }
}
