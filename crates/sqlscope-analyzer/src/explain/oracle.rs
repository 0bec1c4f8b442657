//! Oracle plan-table normalization
//!
//! Oracle plans are produced in three steps under a fixed statement id:
//! clear any stale plan, `EXPLAIN PLAN ... FOR`, then read the formatted plan
//! back through `DBMS_XPLAN.DISPLAY`. Each output line becomes a row with a
//! single [`PLAN_TABLE_OUTPUT`] field.

use crate::explain::result::PlanRow;
use serde_json::Value;
use sqlscope_core::QueryResult;

/// Statement id every explained plan is stored under
pub const STATEMENT_ID: &str = "SQLSCOPE_PLAN";

/// Column name of `DBMS_XPLAN.DISPLAY` output
pub const PLAN_TABLE_OUTPUT: &str = "PLAN_TABLE_OUTPUT";

pub fn clear_plan_sql() -> String {
    format!("DELETE FROM plan_table WHERE statement_id = '{STATEMENT_ID}'")
}

pub fn explain_plan_sql(sql: &str) -> String {
    format!("EXPLAIN PLAN SET statement_id = '{STATEMENT_ID}' FOR {sql}")
}

pub fn display_plan_sql() -> String {
    format!("SELECT * FROM TABLE(DBMS_XPLAN.DISPLAY('PLAN_TABLE', '{STATEMENT_ID}', 'ALL'))")
}

/// Convert `DBMS_XPLAN.DISPLAY` output into plan rows
pub fn rows_from_result(result: &QueryResult) -> Vec<PlanRow> {
    result
        .rows
        .iter()
        .map(|row| {
            let line = row
                .iter()
                .find(|(column, _)| column.eq_ignore_ascii_case(PLAN_TABLE_OUTPUT))
                .map(|(_, value)| value)
                .or_else(|| row.get(0));
            let value = match line {
                Some(v) if !v.is_null() => Value::String(v.to_string()),
                _ => Value::Null,
            };
            PlanRow::from([(PLAN_TABLE_OUTPUT.to_string(), value)])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explain::result::PlanRowExt;
    use sqlscope_core::{Row, Value as SqlValue};

    #[test]
    fn test_rows_from_display_output() {
        let columns = vec!["plan_table_output".to_string()];
        let lines = ["Plan hash value: 1", "| 0 | SELECT STATEMENT |"];
        let result = QueryResult {
            columns: columns.clone(),
            rows: lines
                .iter()
                .map(|l| Row::new(columns.clone(), vec![SqlValue::String(l.to_string())]))
                .collect(),
            ..Default::default()
        };

        let rows = rows_from_result(&result);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].str_field(PLAN_TABLE_OUTPUT), Some("| 0 | SELECT STATEMENT |"));
    }

    #[test]
    fn test_statement_text_uses_fixed_id() {
        assert_eq!(
            explain_plan_sql("SELECT 1 FROM dual"),
            "EXPLAIN PLAN SET statement_id = 'SQLSCOPE_PLAN' FOR SELECT 1 FROM dual"
        );
        assert!(clear_plan_sql().ends_with("'SQLSCOPE_PLAN'"));
        assert!(display_plan_sql().contains("DBMS_XPLAN.DISPLAY('PLAN_TABLE', 'SQLSCOPE_PLAN', 'ALL')"));
    }
}
