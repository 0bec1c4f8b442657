use super::{AdviceError, AdviceRule};
use crate::explain::AnalysisResult;
use sqlscope_core::DialectTag;

const SLOW_STATEMENT_MS: u64 = 5_000;

/// Flags statements whose host-measured execution time is very high
#[derive(Debug, Clone, Copy, Default)]
pub struct SlowStatementRule;

impl AdviceRule for SlowStatementRule {
    fn name(&self) -> &'static str {
        "slow-statement"
    }

    fn supports(&self, _dialect: DialectTag) -> bool {
        true
    }

    fn evaluate(
        &self,
        result: &AnalysisResult,
        _dialect: DialectTag,
    ) -> Result<Vec<String>, AdviceError> {
        if result.execution_time_ms > SLOW_STATEMENT_MS {
            Ok(vec![format!(
                "Statement took {}ms (over {}s); review the plan above for the most expensive step",
                result.execution_time_ms,
                SLOW_STATEMENT_MS / 1000
            )])
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_exclusive() {
        let at = AnalysisResult::new("SELECT 1", vec![]).with_execution_time(5_000);
        let over = AnalysisResult::new("SELECT 1", vec![]).with_execution_time(5_001);
        assert!(SlowStatementRule.evaluate(&at, DialectTag::MySql).unwrap().is_empty());
        assert_eq!(SlowStatementRule.evaluate(&over, DialectTag::MySql).unwrap().len(), 1);
    }
}
