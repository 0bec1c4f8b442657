//! PostgreSQL EXPLAIN parser
//!
//! Statements are explained with
//! `EXPLAIN (ANALYZE, COSTS, VERBOSE, BUFFERS, FORMAT JSON)`. The JSON plan
//! tree is flattened depth-first into one [`PlanRow`] per node, with the
//! nested `Plans` array removed, and the server's timing, buffer and JIT
//! figures are extracted into [`PostgresMetrics`].
//!
//! Because `ANALYZE` executes the statement, the server timings reflect a
//! second run with whatever parameters were bound at the time.

use crate::explain::result::{PlanRow, PostgresMetrics};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur when parsing PostgreSQL EXPLAIN output
#[derive(Debug, Error)]
pub enum PostgresExplainError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Missing Plan object in EXPLAIN output")]
    MissingPlan,

    #[error("Invalid plan structure: {0}")]
    InvalidStructure(String),
}

/// Result type for PostgreSQL EXPLAIN parsing
pub type Result<T> = std::result::Result<T, PostgresExplainError>;

/// Prefix an SQL statement with the analyzing EXPLAIN options
pub fn explain_sql(sql: &str) -> String {
    format!("EXPLAIN (ANALYZE, COSTS, VERBOSE, BUFFERS, FORMAT JSON) {sql}")
}

/// A flattened PostgreSQL plan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostgresPlan {
    /// Plan nodes in depth-first order, root first
    pub nodes: Vec<PlanRow>,
    pub metrics: PostgresMetrics,
}

/// Parse `EXPLAIN (FORMAT JSON)` text
pub fn parse_json(json: &str) -> Result<PostgresPlan> {
    let value: Value = serde_json::from_str(json.trim())?;
    parse_value(&value)
}

/// Parse an already-decoded `EXPLAIN (FORMAT JSON)` document.
///
/// Accepts either the usual one-element array or the bare object.
pub fn parse_value(value: &Value) -> Result<PostgresPlan> {
    let document = match value {
        Value::Array(items) => items.first().ok_or(PostgresExplainError::MissingPlan)?,
        other => other,
    };
    let document = document.as_object().ok_or_else(|| {
        PostgresExplainError::InvalidStructure("expected a JSON object per statement".into())
    })?;

    let root = match document.get("Plan") {
        Some(Value::Object(plan)) => plan,
        Some(_) => {
            return Err(PostgresExplainError::InvalidStructure(
                "Plan is not an object".into(),
            ));
        }
        None => return Err(PostgresExplainError::MissingPlan),
    };

    let mut nodes = Vec::new();
    flatten_node(root, &mut nodes)?;

    let metrics = PostgresMetrics {
        planning_time_ms: document.get("Planning Time").and_then(Value::as_f64),
        execution_time_ms: document.get("Execution Time").and_then(Value::as_f64),
        shared_hit_blocks: root.get("Shared Hit Blocks").and_then(Value::as_i64),
        shared_read_blocks: root.get("Shared Read Blocks").and_then(Value::as_i64),
        temp_read_blocks: root.get("Temp Read Blocks").and_then(Value::as_i64),
        temp_written_blocks: root.get("Temp Written Blocks").and_then(Value::as_i64),
        jit: document.contains_key("JIT"),
    };

    Ok(PostgresPlan { nodes, metrics })
}

fn flatten_node(node: &Map<String, Value>, out: &mut Vec<PlanRow>) -> Result<()> {
    let row: PlanRow = node
        .iter()
        .filter(|(key, _)| key.as_str() != "Plans")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    out.push(row);

    match node.get("Plans") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Array(children)) => {
            for child in children {
                let child = child.as_object().ok_or_else(|| {
                    PostgresExplainError::InvalidStructure("child plan is not an object".into())
                })?;
                flatten_node(child, out)?;
            }
            Ok(())
        }
        Some(_) => Err(PostgresExplainError::InvalidStructure(
            "Plans is not an array".into(),
        )),
    }
}
