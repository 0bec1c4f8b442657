//! MySQL EXPLAIN normalization
//!
//! The classic tabular `EXPLAIN` output is kept as-is: one [`PlanRow`] per
//! result row with every column the server returned (`id`, `select_type`,
//! `table`, `type`, `key`, `rows`, `filtered`, `Extra`, ...). Values are
//! stringified whatever type the driver decoded; NULL stays null.

use crate::explain::result::PlanRow;
use sqlscope_core::QueryResult;

pub fn explain_sql(sql: &str) -> String {
    format!("EXPLAIN {sql}")
}

/// Convert a tabular EXPLAIN result into plan rows
pub fn rows_from_result(result: &QueryResult) -> Vec<PlanRow> {
    result
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|(column, value)| {
                    let cell = if value.is_null() {
                        serde_json::Value::Null
                    } else {
                        serde_json::Value::String(value.to_string())
                    };
                    (column.to_string(), cell)
                })
                .collect()
        })
        .collect()
}
