//! Heuristics over flattened PostgreSQL plans and server metrics

use super::{AdviceError, AdviceRule};
use crate::explain::{AnalysisResult, PlanRow, PlanRowExt, PostgresMetrics};
use serde_json::Value;
use sqlscope_core::DialectTag;

const PLANNING_TIME_MS: f64 = 10.0;
const PLANNING_SHARE_OF_EXECUTION: f64 = 0.2;
const SHARED_READ_BLOCKS: i64 = 1_000;
const TEMP_WRITTEN_BLOCKS: i64 = 100;
const BUFFER_HIT_RATIO: f64 = 0.9;
const INDEX_SCAN_ROWS: i64 = 10_000;
const JOIN_TOTAL_TIME_MS: f64 = 100.0;
const WIDE_ROW_BYTES: i64 = 100;

/// Node walk plus global timing, buffer and configuration checks
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresPlanRule;

impl AdviceRule for PostgresPlanRule {
    fn name(&self) -> &'static str {
        "postgres-plan"
    }

    fn supports(&self, dialect: DialectTag) -> bool {
        dialect == DialectTag::PostgreSql
    }

    fn evaluate(
        &self,
        result: &AnalysisResult,
        _dialect: DialectTag,
    ) -> Result<Vec<String>, AdviceError> {
        let mut advice = Vec::new();
        if let Some(metrics) = &result.postgres {
            check_timing_and_buffers(metrics, result.execution_time_ms, &mut advice);
        }
        for node in &result.plan {
            check_node(node, &mut advice);
        }
        if let Some(metrics) = &result.postgres {
            check_configuration(metrics, &mut advice);
        }
        Ok(advice)
    }
}

fn check_timing_and_buffers(metrics: &PostgresMetrics, execution_ms: u64, advice: &mut Vec<String>) {
    if let Some(planning) = metrics.planning_time_ms {
        if planning > PLANNING_TIME_MS {
            advice.push(format!(
                "High planning time ({planning:.2}ms); make sure table statistics are current (ANALYZE)"
            ));
        }
        let execution = execution_ms as f64;
        if execution > 0.0 && planning > execution * PLANNING_SHARE_OF_EXECUTION {
            advice.push(format!(
                "Planning takes {:.2} of execution time; simplify complex query conditions or use prepared statements",
                planning / execution
            ));
        }
    }
    if let Some(read) = metrics.shared_read_blocks
        && read > SHARED_READ_BLOCKS
    {
        advice.push(format!(
            "Heavy shared buffer reads ({read} blocks); consider a larger shared_buffers or a more selective query"
        ));
    }
    if let Some(written) = metrics.temp_written_blocks
        && written > TEMP_WRITTEN_BLOCKS
    {
        advice.push(format!(
            "Heavy temporary file usage ({written} blocks written); consider a larger work_mem"
        ));
    }
}

fn check_configuration(metrics: &PostgresMetrics, advice: &mut Vec<String>) {
    if let Some(ratio) = metrics.buffer_hit_ratio()
        && ratio < BUFFER_HIT_RATIO
    {
        advice.push(format!(
            "Low shared buffer hit ratio ({:.2}%); consider increasing shared_buffers",
            ratio * 100.0
        ));
    }
    if metrics.temp_written_blocks.is_some_and(|written| written > 0) {
        advice.push("Temporary files were written; tune work_mem for this workload".to_string());
    }
    if metrics.jit {
        advice.push(
            "JIT compilation was used; for short queries consider raising jit_above_cost or disabling jit"
                .to_string(),
        );
    }
}

fn check_node(node: &PlanRow, advice: &mut Vec<String>) {
    let Some(node_type) = node.str_field("Node Type") else {
        return;
    };
    let relation = node.str_field("Relation Name").unwrap_or("<unknown>");

    match node_type {
        "Seq Scan" => {
            advice.push(format!(
                "Sequential scan on table `{relation}` (actual rows: {}); consider adding an index",
                node.i64_field("Actual Rows").unwrap_or(0)
            ));
            if let Some(filter) = node.str_field("Filter")
                && filter != "false"
            {
                advice.push(format!(
                    "Filter on table `{relation}` is not served by an index: {filter}"
                ));
            }
        }
        "Index Scan" | "Index Only Scan" => {
            let index = node.str_field("Index Name").unwrap_or("<unknown>");
            if let Some(rows) = node.i64_field("Actual Rows")
                && rows > INDEX_SCAN_ROWS
            {
                advice.push(format!(
                    "{node_type} on index `{index}` of table `{relation}` returned {rows} rows; tighten the query conditions"
                ));
            }
            if node_type == "Index Only Scan"
                && let Some(fetches) = node.i64_field("Heap Fetches")
                && fetches > 0
            {
                advice.push(format!(
                    "Index Only Scan on index `{index}` needed {fetches} heap fetches; VACUUM the table or include the selected columns in the index"
                ));
            }
        }
        "Sort" => {
            if let Some(keys) = node.text_field("Sort Key") {
                advice.push(format!(
                    "Sort on ({keys}); an index on these columns can avoid the sort"
                ));
            }
            if let Some(method) = node.str_field("Sort Method")
                && method.contains("external")
            {
                advice.push(format!(
                    "Sort spilled to disk ({method}); consider a larger work_mem"
                ));
            }
        }
        "Aggregate" => check_aggregate(node, advice),
        _ => {}
    }

    if node_type.contains("Join") || node_type == "Nested Loop" {
        check_join(node, node_type, advice);
    }
    if node_type == "Hash" || node_type == "Hash Join" {
        check_hash(node, node_type, advice);
    }
    check_parallel(node, node_type, advice);
}

fn check_join(node: &PlanRow, node_type: &str, advice: &mut Vec<String>) {
    if let Some(total) = node.f64_field("Actual Total Time")
        && total > JOIN_TOTAL_TIME_MS
    {
        advice.push(format!(
            "High-cost join ({node_type}) took {total:.2}ms; check the join conditions and indexes"
        ));
    }
    if node_type == "Nested Loop" && node.bool_field("Inner Unique") == Some(false) {
        advice.push(
            "Nested Loop over a non-unique inner relation; an index on the inner join column may help"
                .to_string(),
        );
    }
}

fn check_aggregate(node: &PlanRow, advice: &mut Vec<String>) {
    match node.str_field("Strategy") {
        Some("Hashed") | Some("HashAggregate") => advice.push(
            "Hash aggregation in use; tune hash_mem_multiplier if it spills".to_string(),
        ),
        Some("Sorted") | Some("SortedAggregate") => advice.push(
            "Sorted aggregation in use; feed it pre-sorted input through an index".to_string(),
        ),
        _ => {}
    }
    if let Some(keys) = node.text_field("Group Key") {
        advice.push(format!(
            "Aggregate groups by ({keys}); an index on these columns may help"
        ));
    }
}

fn check_hash(node: &PlanRow, node_type: &str, advice: &mut Vec<String>) {
    if let Some(width) = node.i64_field("Plan Width")
        && width > WIDE_ROW_BYTES
    {
        advice.push(format!(
            "{node_type} processes wide rows ({width} bytes); select fewer columns"
        ));
    }
    if let Some(batches) = node.i64_field("Hash Batches")
        && batches > 1
    {
        advice.push(format!(
            "Hash used {batches} batches; increase work_mem to keep it in memory"
        ));
    }
}

fn check_parallel(node: &PlanRow, node_type: &str, advice: &mut Vec<String>) {
    let launched = node.i64_field("Workers Launched").or_else(|| match node.field("Workers") {
        Some(Value::Array(workers)) => Some(workers.len() as i64),
        Some(_) => node.i64_field("Workers"),
        None => None,
    });
    if let (Some(planned), Some(launched)) = (node.i64_field("Workers Planned"), launched)
        && launched < planned
    {
        advice.push(format!(
            "{node_type} launched {launched} of {planned} planned workers; check max_worker_processes and max_parallel_workers"
        ));
    }
    if let Some(worker) = node.i64_field("Worker Number") {
        advice.push(format!(
            "{node_type} ran on parallel worker {worker}; tune max_parallel_workers_per_gather if parallelism is unwanted"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn node(value: Value) -> PlanRow {
        match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => PlanRow::new(),
        }
    }

    fn evaluate(result: &AnalysisResult) -> Vec<String> {
        PostgresPlanRule
            .evaluate(result, DialectTag::PostgreSql)
            .expect("postgres rule never fails")
    }

    fn evaluate_nodes(nodes: Vec<Value>) -> Vec<String> {
        evaluate(&AnalysisResult::new(
            "SELECT 1",
            nodes.into_iter().map(node).collect(),
        ))
    }

    // ========================================================================
    // Node walk
    // ========================================================================

    #[test]
    fn test_seq_scan_mentions_table_and_rows() {
        let advice = evaluate_nodes(vec![json!({
            "Node Type": "Seq Scan",
            "Relation Name": "users",
            "Actual Rows": 50000
        })]);
        assert_eq!(advice.len(), 1);
        assert!(advice[0].contains("users"));
        assert!(advice[0].contains("50000"));
    }

    #[test]
    fn test_seq_scan_filter() {
        let advice = evaluate_nodes(vec![
            json!({"Node Type": "Seq Scan", "Relation Name": "a", "Filter": "(status = 'x'::text)"}),
            json!({"Node Type": "Seq Scan", "Relation Name": "b", "Filter": "false"}),
        ]);
        assert_eq!(advice.len(), 3);
        assert!(advice[1].contains("(status = 'x'::text)"));
    }

    #[test]
    fn test_index_scans() {
        let advice = evaluate_nodes(vec![
            json!({"Node Type": "Index Scan", "Relation Name": "orders", "Index Name": "orders_pkey", "Actual Rows": 20000}),
            json!({"Node Type": "Index Scan", "Relation Name": "orders", "Index Name": "orders_pkey", "Actual Rows": 10000}),
            json!({"Node Type": "Index Only Scan", "Relation Name": "orders", "Index Name": "idx_total", "Actual Rows": 5, "Heap Fetches": 3}),
        ]);
        assert_eq!(advice.len(), 2);
        assert!(advice[0].contains("20000") && advice[0].contains("orders_pkey"));
        assert!(advice[1].contains("3 heap fetches"));
    }

    #[test]
    fn test_hash_join_gets_join_and_hash_checks() {
        let advice = evaluate_nodes(vec![json!({
            "Node Type": "Hash Join",
            "Actual Total Time": 150.456,
            "Plan Width": 240,
            "Hash Batches": 4
        })]);
        assert_eq!(
            advice,
            vec![
                "High-cost join (Hash Join) took 150.46ms; check the join conditions and indexes".to_string(),
                "Hash Join processes wide rows (240 bytes); select fewer columns".to_string(),
                "Hash used 4 batches; increase work_mem to keep it in memory".to_string(),
            ]
        );
    }

    #[test]
    fn test_nested_loop_non_unique_inner() {
        let advice = evaluate_nodes(vec![json!({
            "Node Type": "Nested Loop",
            "Inner Unique": false,
            "Actual Total Time": 3.0
        })]);
        assert_eq!(advice.len(), 1);
        assert!(advice[0].starts_with("Nested Loop"));
    }

    #[test]
    fn test_sort_and_aggregate() {
        let advice = evaluate_nodes(vec![
            json!({"Node Type": "Sort", "Sort Key": ["created_at DESC"], "Sort Method": "external merge"}),
            json!({"Node Type": "Aggregate", "Strategy": "Hashed", "Group Key": ["status"]}),
            json!({"Node Type": "Aggregate", "Strategy": "SortedAggregate"}),
        ]);
        assert_eq!(advice.len(), 5);
        assert!(advice[0].contains("created_at DESC"));
        assert!(advice[1].contains("external merge"));
        assert!(advice[2].contains("hash_mem_multiplier"));
        assert!(advice[3].contains("(status)"));
        assert!(advice[4].starts_with("Sorted aggregation"));
    }

    #[test]
    fn test_worker_starvation() {
        let advice = evaluate_nodes(vec![
            json!({"Node Type": "Gather", "Workers Planned": 4, "Workers Launched": 1}),
            json!({"Node Type": "Gather", "Workers Planned": 2, "Workers Launched": 2}),
        ]);
        assert_eq!(advice.len(), 1);
        assert!(advice[0].contains("1 of 4"));
    }

    // ========================================================================
    // Metrics
    // ========================================================================

    #[test]
    fn test_metrics_thresholds() {
        let result = AnalysisResult::new("SELECT 1", vec![])
            .with_execution_time(20)
            .with_postgres_metrics(PostgresMetrics {
                planning_time_ms: Some(12.0),
                execution_time_ms: Some(19.0),
                shared_hit_blocks: Some(500),
                shared_read_blocks: Some(1500),
                temp_read_blocks: Some(0),
                temp_written_blocks: Some(200),
                jit: true,
            });
        let advice = evaluate(&result);
        assert_eq!(advice.len(), 7);
        assert!(advice[0].starts_with("High planning time (12.00ms)"));
        assert!(advice[1].starts_with("Planning takes 0.60"));
        assert!(advice[2].contains("1500 blocks"));
        assert!(advice[3].contains("200 blocks"));
        assert!(advice[4].contains("25.00%"));
        assert!(advice[5].contains("work_mem"));
        assert!(advice[6].starts_with("JIT"));
    }

    #[test]
    fn test_healthy_metrics_are_quiet() {
        let result = AnalysisResult::new("SELECT 1", vec![])
            .with_execution_time(50)
            .with_postgres_metrics(PostgresMetrics {
                planning_time_ms: Some(0.5),
                shared_hit_blocks: Some(990),
                shared_read_blocks: Some(10),
                temp_written_blocks: Some(0),
                ..Default::default()
            });
        assert!(evaluate(&result).is_empty());
    }
}
