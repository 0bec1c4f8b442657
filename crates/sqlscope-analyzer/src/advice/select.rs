use super::{AdviceError, AdviceRule};
use crate::explain::AnalysisResult;
use sqlscope_core::DialectTag;

/// Projection checks on the statement text
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectRule;

impl AdviceRule for SelectRule {
    fn name(&self) -> &'static str {
        "select"
    }

    fn supports(&self, _dialect: DialectTag) -> bool {
        true
    }

    fn evaluate(
        &self,
        result: &AnalysisResult,
        _dialect: DialectTag,
    ) -> Result<Vec<String>, AdviceError> {
        let sql = result.sql.to_uppercase();
        let mut advice = Vec::new();
        if sql.contains("SELECT *") {
            advice.push("Avoid SELECT *; list only the columns you need".to_string());
        }
        if sql.contains("SELECT DISTINCT") && !sql.contains("WHERE") {
            advice.push(
                "SELECT DISTINCT without a WHERE clause deduplicates the whole table; check that it is needed"
                    .to_string(),
            );
        }
        Ok(advice)
    }
}
