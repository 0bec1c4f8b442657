//! Pagination checks driven by the parsed LIMIT/OFFSET clause

use super::{AdviceError, AdviceRule, sql_ast};
use crate::explain::AnalysisResult;
use sqlparser::ast::{Expr, SetExpr, Statement, Value};
use sqlscope_core::DialectTag;

const DEEP_OFFSET: u64 = 10_000;
const LARGE_LIMIT: u64 = 1_000;

/// Deep pagination, oversized and single-row limits, missing ORDER BY and
/// literal row counts.
///
/// Statements that do not parse are skipped; the WHERE-clause audit is the
/// rule that reports parse failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct LimitRule;

impl AdviceRule for LimitRule {
    fn name(&self) -> &'static str {
        "limit"
    }

    fn supports(&self, _dialect: DialectTag) -> bool {
        true
    }

    fn evaluate(
        &self,
        result: &AnalysisResult,
        dialect: DialectTag,
    ) -> Result<Vec<String>, AdviceError> {
        let statements = match sql_ast::parse(&result.sql, dialect) {
            Ok(statements) => statements,
            Err(err) => {
                tracing::debug!(error = %err, "skipping LIMIT checks for unparseable statement");
                return Ok(Vec::new());
            }
        };
        let Some(Statement::Query(query)) = statements.first() else {
            return Ok(Vec::new());
        };
        if !matches!(query.body.as_ref(), SetExpr::Select(_)) {
            return Ok(Vec::new());
        }
        let Some(limit) = &query.limit else {
            return Ok(Vec::new());
        };

        let mut advice = Vec::new();
        let row_count = literal_number(limit);

        if let Some(offset) = query.offset.as_ref().and_then(|o| literal_number(&o.value))
            && offset > DEEP_OFFSET
        {
            advice.push(format!(
                "Deep pagination with OFFSET {offset}; use keyset pagination (WHERE id > last_id LIMIT n) or a deferred join on the primary key"
            ));
        }

        match row_count {
            Some(rows) if rows > LARGE_LIMIT => advice.push(format!(
                "LIMIT {rows} returns a large result set; fetch it in batches"
            )),
            Some(1) => advice.push(
                "LIMIT 1 may silently truncate results; make sure a single row is intended"
                    .to_string(),
            ),
            _ => {}
        }

        if query.order_by.is_none() {
            advice.push(
                "LIMIT without ORDER BY returns rows in a non-deterministic order; add an ORDER BY"
                    .to_string(),
            );
        }

        if row_count.is_some() {
            advice.push(
                "LIMIT uses a literal row count; bind it as a parameter so the statement can be reused"
                    .to_string(),
            );
        }

        Ok(advice)
    }
}

fn literal_number(expr: &Expr) -> Option<u64> {
    match expr {
        Expr::Value(Value::Number(n, _)) => n.parse().ok(),
        _ => None,
    }
}
