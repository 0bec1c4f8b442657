use super::{AdviceError, AdviceRule};
use crate::explain::{AnalysisResult, PlanRowExt};
use sqlscope_core::DialectTag;

/// Dialect-agnostic full-scan detection for joined tables.
///
/// Looks at MySQL-style `type` columns and at raw text plans carried under
/// an `EXPLAIN` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinScanRule;

impl AdviceRule for JoinScanRule {
    fn name(&self) -> &'static str {
        "join-scan"
    }

    fn supports(&self, _dialect: DialectTag) -> bool {
        true
    }

    fn evaluate(
        &self,
        result: &AnalysisResult,
        _dialect: DialectTag,
    ) -> Result<Vec<String>, AdviceError> {
        let mut advice = Vec::new();
        for row in &result.plan {
            if row.str_field("type") == Some("ALL") {
                advice.push(
                    "Full table scan in a join; index the join columns".to_string(),
                );
            }
            if row
                .str_field("EXPLAIN")
                .is_some_and(|plan| plan.contains("Seq Scan"))
            {
                advice.push(
                    "Sequential scan in a join; index the join columns".to_string(),
                );
            }
        }
        Ok(advice)
    }
}
