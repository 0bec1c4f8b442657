use super::{
    AdviceError, AdviceRule, JoinScanRule, LimitRule, MySqlPlanRule, PostgresPlanRule, SelectRule,
    SlowStatementRule, WhereClauseRule,
};
use crate::explain::AnalysisResult;
use sqlscope_core::DialectTag;

/// Ordered collection of advice rules
#[derive(Default)]
pub struct AdviceEngine {
    rules: Vec<Box<dyn AdviceRule>>,
}

impl AdviceEngine {
    /// An engine with no rules
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine with every built-in rule registered, auditing WHERE-clause
    /// functions against `allowed_functions`
    pub fn standard(allowed_functions: Vec<String>) -> Self {
        Self::new()
            .with_rule(MySqlPlanRule)
            .with_rule(PostgresPlanRule)
            .with_rule(SelectRule)
            .with_rule(WhereClauseRule::new(allowed_functions))
            .with_rule(JoinScanRule)
            .with_rule(LimitRule)
            .with_rule(SlowStatementRule)
    }

    /// Append a rule; rules run in the order they were added
    pub fn with_rule(mut self, rule: impl AdviceRule + 'static) -> Self {
        self.register(Box::new(rule));
        self
    }

    pub fn register(&mut self, rule: Box<dyn AdviceRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule that supports `dialect` and concatenate the output.
    ///
    /// Advisories are not deduplicated. The first rule error aborts
    /// generation for this statement.
    pub fn generate(
        &self,
        result: &AnalysisResult,
        dialect: DialectTag,
    ) -> Result<Vec<String>, AdviceError> {
        let mut advice = Vec::new();
        for rule in self.rules.iter().filter(|rule| rule.supports(dialect)) {
            let produced = rule.evaluate(result, dialect)?;
            tracing::trace!(rule = rule.name(), count = produced.len(), "rule evaluated");
            advice.extend(produced);
        }
        Ok(advice)
    }
}

impl std::fmt::Debug for AdviceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdviceEngine")
            .field("rules", &self.rule_names())
            .finish()
    }
}
