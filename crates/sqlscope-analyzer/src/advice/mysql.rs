//! Heuristics over MySQL tabular EXPLAIN rows

use super::{AdviceError, AdviceRule};
use crate::explain::{AnalysisResult, PlanRow, PlanRowExt};
use sqlscope_core::DialectTag;

const SELECTIVITY_FILTERED_PERCENT: f64 = 50.0;
const SELECTIVITY_MIN_ROWS: i64 = 1_000;
const LARGE_JOIN_ROWS: i64 = 100_000;

/// Access-type, `Extra`, selectivity and join-size checks for MySQL plans
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlPlanRule;

impl AdviceRule for MySqlPlanRule {
    fn name(&self) -> &'static str {
        "mysql-plan"
    }

    fn supports(&self, dialect: DialectTag) -> bool {
        dialect == DialectTag::MySql
    }

    fn evaluate(
        &self,
        result: &AnalysisResult,
        _dialect: DialectTag,
    ) -> Result<Vec<String>, AdviceError> {
        let mut advice = Vec::new();
        for row in &result.plan {
            check_access_type(row, &mut advice);
            check_extra(row, &mut advice);
            check_select_type(row, &mut advice);
            check_selectivity(row, &mut advice);
            check_join_size(row, &mut advice);
        }
        Ok(advice)
    }
}

fn table(row: &PlanRow) -> &str {
    row.str_field("table").unwrap_or("<unknown>")
}

fn check_access_type(row: &PlanRow, advice: &mut Vec<String>) {
    let Some(access) = row.str_field("type") else {
        return;
    };
    let key = row.text_field("key");

    if access.eq_ignore_ascii_case("ALL") {
        if key.is_none() {
            advice.push(format!(
                "Full table scan on table `{}` with no usable index; add an index on the filtered columns",
                table(row)
            ));
        }
    } else if access.eq_ignore_ascii_case("index") {
        advice.push(format!(
            "Full index scan on index `{}`; narrow the query conditions so a range or ref lookup can be used",
            key.as_deref().unwrap_or("<unknown>")
        ));
    } else if access.eq_ignore_ascii_case("ref") && key.is_none() {
        advice.push(format!(
            "No index used for lookups on table `{}`; check the join and filter columns",
            table(row)
        ));
    } else if access.eq_ignore_ascii_case("index_merge") {
        advice.push(format!(
            "Index merge on table `{}`; a composite index usually performs better",
            table(row)
        ));
    } else if access.eq_ignore_ascii_case("range") {
        advice.push(format!(
            "Range scan on index `{}`; make sure the range is not too wide",
            key.as_deref().unwrap_or("<unknown>")
        ));
    }
}

fn check_extra(row: &PlanRow, advice: &mut Vec<String>) {
    let Some(extra) = row.str_field("Extra") else {
        return;
    };
    if extra.contains("Using temporary") {
        advice.push(format!(
            "Temporary table used for table `{}`; review GROUP BY and ORDER BY columns",
            table(row)
        ));
    }
    if extra.contains("Using filesort") {
        advice.push(format!(
            "Filesort used for table `{}`; add an index matching the ORDER BY columns",
            table(row)
        ));
    }
    if extra.contains("Using index condition") {
        advice.push(format!(
            "Index condition pushdown on table `{}` still reads table rows; consider a covering index",
            table(row)
        ));
    }
}

/// Subquery kinds show up in `select_type` on current servers; `type` is
/// checked too for plans that report them there.
fn check_select_type(row: &PlanRow, advice: &mut Vec<String>) {
    let kind = ["select_type", "type"]
        .into_iter()
        .filter_map(|field| row.str_field(field))
        .map(str::to_ascii_uppercase)
        .find(|kind| {
            matches!(
                kind.as_str(),
                "DEPENDENT SUBQUERY" | "UNCACHEABLE SUBQUERY" | "DERIVED"
            )
        });

    match kind.as_deref() {
        Some("DEPENDENT SUBQUERY") | Some("UNCACHEABLE SUBQUERY") => advice.push(
            "Correlated or uncacheable subquery detected; consider rewriting it as a JOIN"
                .to_string(),
        ),
        Some("DERIVED") => advice.push(format!(
            "Derived table `{}` materializes a subquery in FROM; consider simplifying the query",
            table(row)
        )),
        _ => {}
    }
}

fn check_selectivity(row: &PlanRow, advice: &mut Vec<String>) {
    let (Some(rows), Some(filtered)) = (row.i64_field("rows"), row.f64_field("filtered")) else {
        return;
    };
    if filtered > SELECTIVITY_FILTERED_PERCENT && rows > SELECTIVITY_MIN_ROWS {
        advice.push(format!(
            "Low index selectivity on table `{}`: {rows} estimated rows with {filtered:.2}% kept after filtering; review the index columns",
            table(row)
        ));
    }
}

fn check_join_size(row: &PlanRow, advice: &mut Vec<String>) {
    if !row.has_field("join_type") {
        return;
    }
    if let Some(rows) = row.i64_field("rows")
        && rows > LARGE_JOIN_ROWS
    {
        advice.push(format!(
            "Large table join on `{}` ({rows} estimated rows); consider paging or a different join strategy",
            table(row)
        ));
    }
}
