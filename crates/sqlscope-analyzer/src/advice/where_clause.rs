//! WHERE-clause heuristics, including the function-on-column audit

use super::{AdviceError, AdviceRule, AuditError, sql_ast};
use crate::explain::AnalysisResult;
use regex::Regex;
use sqlparser::ast::{
    Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, Statement, visit_expressions,
};
use sqlscope_core::DialectTag;
use std::ops::ControlFlow;
use std::sync::LazyLock;

static WHERE_OR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\bWHERE\b.*\bOR\b").expect("valid regex"));

/// Leading-wildcard LIKE, function-on-column audit and OR-chain checks
#[derive(Debug, Clone, Default)]
pub struct WhereClauseRule {
    allowed_functions: Vec<String>,
}

impl WhereClauseRule {
    /// `allowed_functions` are matched case-insensitively against function
    /// names applied to columns
    pub fn new(allowed_functions: Vec<String>) -> Self {
        Self {
            allowed_functions: allowed_functions
                .into_iter()
                .map(|name| name.trim().to_uppercase())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    pub fn allowed_functions(&self) -> &[String] {
        &self.allowed_functions
    }
}

impl AdviceRule for WhereClauseRule {
    fn name(&self) -> &'static str {
        "where-clause"
    }

    fn supports(&self, _dialect: DialectTag) -> bool {
        true
    }

    fn evaluate(
        &self,
        result: &AnalysisResult,
        dialect: DialectTag,
    ) -> Result<Vec<String>, AdviceError> {
        let sql = result.sql.to_uppercase();
        let mut advice = Vec::new();

        if sql.contains("LIKE '%") {
            advice.push(
                "LIKE pattern with a leading wildcard cannot use an index; consider full-text search"
                    .to_string(),
            );
        }

        advice.extend(audit_where_functions(
            &result.sql,
            dialect,
            &self.allowed_functions,
        )?);

        if WHERE_OR_REGEX.is_match(&sql) {
            advice.push(
                "Multiple OR conditions in WHERE can defeat indexes; consider UNION ALL".to_string(),
            );
        }
        Ok(advice)
    }
}

/// Parse `sql` and report every function applied directly to a column
/// inside a SELECT's WHERE clause whose name is not in `allowed_functions`.
///
/// Functions applied only to literals are ignored.
pub fn audit_where_functions(
    sql: &str,
    dialect: DialectTag,
    allowed_functions: &[String],
) -> Result<Vec<String>, AuditError> {
    let statements = sql_ast::parse(sql, dialect)?;
    let mut advice = Vec::new();

    for statement in &statements {
        let Statement::Query(query) = statement else {
            continue;
        };
        for select in sql_ast::select_blocks(query) {
            let Some(selection) = &select.selection else {
                continue;
            };
            let _ = visit_expressions(selection, |expr| {
                if let Expr::Function(function) = expr {
                    audit_function(function, allowed_functions, &mut advice);
                }
                ControlFlow::<()>::Continue(())
            });
        }
    }
    Ok(advice)
}

fn audit_function(function: &Function, allowed_functions: &[String], advice: &mut Vec<String>) {
    let FunctionArguments::List(list) = &function.args else {
        return;
    };
    let name = function_name(function);
    if allowed_functions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&name))
    {
        return;
    }

    // One advisory per call, citing the first column it wraps
    let first_column = list.args.iter().find_map(|arg| match arg {
        FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
        | FunctionArg::Named {
            arg: FunctionArgExpr::Expr(expr),
            ..
        } => column_name(expr),
        _ => None,
    });
    if let Some(column) = first_column {
        advice.push(format!(
            "Function `{name}()` applied to column `{column}` in WHERE may prevent index use; allowed functions: [{}]",
            allowed_functions.join(", ")
        ));
    }
}

fn function_name(function: &Function) -> String {
    let full = function.name.to_string();
    full.rsplit('.')
        .next()
        .unwrap_or(&full)
        .trim_matches(|c| c == '"' || c == '`')
        .to_uppercase()
}

fn column_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.as_str()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|ident| ident.value.as_str()),
        _ => None,
    }
}
