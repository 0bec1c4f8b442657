//! Rule-based optimization advice
//!
//! An [`AdviceEngine`] holds an ordered list of [`AdviceRule`]s. For each
//! analyzed statement it asks every rule that supports the connection's
//! dialect for advisories and concatenates them in registration order.
//! Rules are stateless and shared across worker tasks.
//!
//! # Example
//!
//! ```
//! use sqlscope_analyzer::advice::AdviceEngine;
//! use sqlscope_analyzer::explain::AnalysisResult;
//! use sqlscope_core::DialectTag;
//!
//! let engine = AdviceEngine::standard(vec!["LOWER".to_string()]);
//! let result = AnalysisResult::new("SELECT * FROM users WHERE YEAR(created_at) = 2020", vec![]);
//! let advice = engine.generate(&result, DialectTag::MySql).unwrap();
//! assert!(advice.iter().any(|a| a.contains("SELECT *")));
//! assert!(advice.iter().any(|a| a.contains("YEAR()") && a.contains("created_at")));
//! ```

mod common;
mod engine;
mod join;
mod limit;
mod mysql;
mod postgres;
mod select;
mod sql_ast;
mod where_clause;

pub use common::SlowStatementRule;
pub use engine::AdviceEngine;
pub use join::JoinScanRule;
pub use limit::LimitRule;
pub use mysql::MySqlPlanRule;
pub use postgres::PostgresPlanRule;
pub use select::SelectRule;
pub use where_clause::{WhereClauseRule, audit_where_functions};

use crate::explain::AnalysisResult;
use sqlscope_core::DialectTag;
use thiserror::Error;

/// The WHERE-clause function audit could not parse the statement, so its
/// verdict cannot be trusted.
#[derive(Debug, Clone, Error)]
#[error("failed to parse statement for WHERE-clause audit: {message}")]
pub struct AuditError {
    pub message: String,
}

impl From<sqlparser::parser::ParserError> for AuditError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

/// Errors raised while generating advice
#[derive(Debug, Error)]
pub enum AdviceError {
    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// One independent advice heuristic
pub trait AdviceRule: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Whether the rule applies to statements of this dialect
    fn supports(&self, dialect: DialectTag) -> bool;

    /// Produce zero or more advisories. Must not mutate the result.
    fn evaluate(
        &self,
        result: &AnalysisResult,
        dialect: DialectTag,
    ) -> Result<Vec<String>, AdviceError>;
}
