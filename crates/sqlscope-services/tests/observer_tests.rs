//! End-to-end tests for the observer: gate, inline and queued analysis,
//! overflow handling, caching and reporting

mod common;

use common::*;
use serde_json::json;
use sqlscope_analyzer::AdviceError;
use sqlscope_core::{BoundStatement, DialectTag, Value};
use sqlscope_services::{
    AcquisitionError, AnalysisError, CollectingSink, DispatchOverflowError, ObserveError,
    Outcome, OverflowPolicy, SqlObserver, SqlScopeConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

fn inline_config() -> SqlScopeConfig {
    SqlScopeConfig {
        async_analysis: false,
        ..Default::default()
    }
}

fn observer_with_sink(config: SqlScopeConfig) -> (SqlObserver, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::new());
    let observer = SqlObserver::builder(config)
        .with_sink(sink.clone())
        .build()
        .unwrap();
    (observer, sink)
}

fn orders_by_status(status: &str) -> BoundStatement {
    BoundStatement::new("SELECT * FROM orders WHERE status = ?")
        .with_parameter(status)
        .with_property("status")
}

fn orders_full_scan() -> MockProvider {
    MockProvider::mysql().with_response(
        "EXPLAIN",
        table(
            MYSQL_PLAN_COLUMNS,
            vec![mysql_plan_row("orders", "ALL", 50_000, "Using where")],
        ),
    )
}

fn completed(outcome: Outcome) -> sqlscope_analyzer::AnalysisResult {
    match outcome {
        Outcome::Completed(result) => *result,
        other => panic!("expected a completed analysis, got {other:?}"),
    }
}

// ============================================================================
// Gate
// ============================================================================

mod gate_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_fast_statement_is_skipped_without_touching_database() {
        let (observer, sink) = observer_with_sink(inline_config());
        let provider = Arc::new(orders_full_scan());

        let outcome = observer
            .observe("OrderMapper.byStatus", orders_by_status("open"), provider.clone(), 100)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(provider.acquire_count(), 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_explain_statement_is_skipped() {
        let (observer, _sink) = observer_with_sink(inline_config());
        let provider = Arc::new(orders_full_scan());

        let outcome = observer
            .observe(
                "OrderMapper.explain",
                BoundStatement::new("EXPLAIN SELECT * FROM orders"),
                provider.clone(),
                10_000,
            )
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(provider.acquire_count(), 0);
    }

    #[tokio::test]
    async fn test_disabled_observer_skips_everything() {
        let (observer, _sink) = observer_with_sink(SqlScopeConfig {
            enabled: false,
            explain_all: true,
            ..inline_config()
        });
        let provider = Arc::new(orders_full_scan());

        let outcome = observer
            .observe("OrderMapper.byStatus", orders_by_status("open"), provider.clone(), 10_000)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(provider.acquire_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_dialect_is_skipped() {
        let (observer, sink) = observer_with_sink(inline_config());
        let provider = Arc::new(MockProvider::new("jdbc:sqlite:app.db"));

        let outcome = observer
            .observe("OrderMapper.byStatus", orders_by_status("open"), provider.clone(), 10_000)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(provider.acquire_count(), 0);
        assert!(sink.is_empty());
    }
}

// ============================================================================
// Inline analysis
// ============================================================================

mod inline_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_mysql_full_scan_is_reported() {
        let (observer, sink) = observer_with_sink(inline_config());
        let provider = Arc::new(orders_full_scan());

        let result = completed(
            observer
                .observe("OrderMapper.byStatus", orders_by_status("open"), provider.clone(), 250)
                .await
                .unwrap(),
        );

        assert_eq!(result.sql, "SELECT * FROM orders WHERE status = ?");
        assert_eq!(result.execution_time_ms, 250);
        assert_eq!(result.plan.len(), 1);
        assert_eq!(
            result
                .advice
                .iter()
                .filter(|advice| advice.contains("`orders`"))
                .count(),
            1
        );
        assert!(result.advice.iter().any(|a| a.starts_with("Full table scan on table `orders`")));
        assert!(result.advice.iter().any(|a| a.starts_with("Avoid SELECT *")));

        let log = provider.query_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].sql, "EXPLAIN SELECT * FROM orders WHERE status = ?");
        assert_eq!(log[0].params, vec![Value::String("open".into())]);
        assert_eq!(provider.close_count(), 1);

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].statement_id, "OrderMapper.byStatus");
        assert_eq!(reports[0].dialect, DialectTag::MySql);
        assert_eq!(reports[0].result, result);
    }

    #[tokio::test]
    async fn test_explain_all_ignores_threshold() {
        let (observer, sink) = observer_with_sink(SqlScopeConfig {
            explain_all: true,
            ..inline_config()
        });
        let provider = Arc::new(orders_full_scan());

        let outcome = observer
            .observe("OrderMapper.byStatus", orders_by_status("open"), provider, 1)
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Completed(_)));
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_statement_aborts_advice() {
        let (observer, sink) = observer_with_sink(inline_config());
        let provider = Arc::new(MockProvider::mysql());

        let err = observer
            .observe(
                "OrderMapper.broken",
                BoundStatement::new("SELECT * FROM orders WHERE"),
                provider.clone(),
                500,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ObserveError::Analysis(AnalysisError::Advice(AdviceError::Audit(_)))
        ));
        // the plan was acquired but nothing was reported
        assert_eq!(provider.acquire_count(), 1);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_connection_failure_is_returned_inline() {
        let (observer, sink) = observer_with_sink(inline_config());
        let provider = Arc::new(MockProvider::mysql().with_acquire_failure());

        let err = observer
            .observe("OrderMapper.byStatus", orders_by_status("open"), provider, 500)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ObserveError::Analysis(AnalysisError::Acquisition(AcquisitionError::Connection(_)))
        ));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_where_function_allow_list() {
        let sql = "SELECT id FROM users WHERE LOWER(email) = 'a@b.c' AND UPPER(name) = 'BOB'";
        let (observer, _sink) = observer_with_sink(SqlScopeConfig {
            where_function_allow_list: vec!["lower".to_string()],
            ..inline_config()
        });

        let result = completed(
            observer
                .observe("UserMapper.find", BoundStatement::new(sql), Arc::new(MockProvider::mysql()), 500)
                .await
                .unwrap(),
        );

        let audits: Vec<&String> = result
            .advice
            .iter()
            .filter(|advice| advice.starts_with("Function"))
            .collect();
        assert_eq!(audits.len(), 1);
        assert!(audits[0].contains("`UPPER()`"));
        assert!(audits[0].contains("`name`"));
    }

    #[tokio::test]
    async fn test_disabled_rules_are_not_run() {
        let mut config = inline_config();
        config.rules.select = false;
        let (observer, _sink) = observer_with_sink(config);

        let result = completed(
            observer
                .observe("OrderMapper.byStatus", orders_by_status("open"), Arc::new(orders_full_scan()), 500)
                .await
                .unwrap(),
        );

        assert!(!result.advice.iter().any(|a| a.starts_with("Avoid SELECT *")));
        assert!(result.advice.iter().any(|a| a.starts_with("Full table scan")));
    }

    #[tokio::test]
    async fn test_every_sink_receives_the_report() {
        let first = Arc::new(CollectingSink::new());
        let second = Arc::new(CollectingSink::new());
        let observer = SqlObserver::builder(inline_config())
            .with_sink(first.clone())
            .with_sink(second.clone())
            .build()
            .unwrap();

        observer
            .observe("OrderMapper.byStatus", orders_by_status("open"), Arc::new(orders_full_scan()), 500)
            .await
            .unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }
}

// ============================================================================
// Caching
// ============================================================================

mod cache_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_repeated_statement_acquires_plan_once() {
        let (observer, sink) = observer_with_sink(inline_config());
        let provider = Arc::new(orders_full_scan());

        for (status, elapsed) in [("open", 300), ("closed", 700)] {
            observer
                .observe("OrderMapper.byStatus", orders_by_status(status), provider.clone(), elapsed)
                .await
                .unwrap();
        }

        assert_eq!(provider.acquire_count(), 1);
        let stats = observer.cache_stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);

        // advice and timings are recomputed for every observation
        let reports = sink.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].result.execution_time_ms, 300);
        assert_eq!(reports[1].result.execution_time_ms, 700);
        assert_eq!(reports[0].result.advice, reports[1].result.advice);
    }

    /// Keys ignore parameters, so a PostgreSQL ANALYZE plan measured for the
    /// first parameter set is reused for later ones.
    #[tokio::test]
    async fn test_postgres_analyze_plan_reused_across_parameters() {
        let (observer, sink) = observer_with_sink(inline_config());
        let provider = Arc::new(MockProvider::postgres().with_response(
            "EXPLAIN",
            postgres_json(json!([{
                "Plan": {
                    "Node Type": "Seq Scan",
                    "Relation Name": "orders",
                    "Actual Rows": 12,
                    "Shared Hit Blocks": 10,
                    "Shared Read Blocks": 0
                },
                "Planning Time": 0.1,
                "Execution Time": 3.2
            }])),
        ));

        for status in ["open", "closed"] {
            observer
                .observe("OrderMapper.byStatus", orders_by_status(status), provider.clone(), 500)
                .await
                .unwrap();
        }

        let log = provider.query_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].params, vec![Value::String("open".into())]);

        let reports = sink.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].result.plan, reports[1].result.plan);
        assert_eq!(reports[1].result.postgres, reports[0].result.postgres);
    }

    #[tokio::test]
    async fn test_disabled_cache_acquires_every_time() {
        let mut config = inline_config();
        config.cache.enabled = false;
        let (observer, _sink) = observer_with_sink(config);
        let provider = Arc::new(orders_full_scan());

        for _ in 0..3 {
            observer
                .observe("OrderMapper.byStatus", orders_by_status("open"), provider.clone(), 500)
                .await
                .unwrap();
        }

        assert_eq!(provider.acquire_count(), 3);
        assert!(observer.cache_stats().is_none());
    }

    #[tokio::test]
    async fn test_normalized_keys_share_an_entry() {
        let mut config = inline_config();
        config.cache.normalize_key = true;
        let (observer, _sink) = observer_with_sink(config);
        let provider = Arc::new(orders_full_scan());

        for sql in [
            "SELECT * FROM orders WHERE status = 'open'",
            "SELECT *\n  FROM orders /* hot path */\n WHERE status = 'open'",
        ] {
            observer
                .observe("OrderMapper.byStatus", BoundStatement::new(sql), provider.clone(), 500)
                .await
                .unwrap();
        }

        assert_eq!(provider.acquire_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_acquisition_is_not_cached() {
        let (observer, _sink) = observer_with_sink(inline_config());
        let failing = Arc::new(MockProvider::mysql().with_failing("EXPLAIN"));
        let healthy = Arc::new(orders_full_scan());

        let err = observer
            .observe("OrderMapper.byStatus", orders_by_status("open"), failing, 500)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ObserveError::Analysis(AnalysisError::Acquisition(AcquisitionError::Explain(_)))
        ));

        let result = completed(
            observer
                .observe("OrderMapper.byStatus", orders_by_status("open"), healthy.clone(), 500)
                .await
                .unwrap(),
        );
        assert_eq!(result.plan.len(), 1);
        assert_eq!(healthy.acquire_count(), 1);
    }
}

// ============================================================================
// Asynchronous analysis
// ============================================================================

mod async_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pooled_config(pool_size: usize, queue_capacity: usize, policy: OverflowPolicy) -> SqlScopeConfig {
        let mut config = SqlScopeConfig {
            pool_size,
            queue_capacity,
            overflow_policy: policy,
            ..Default::default()
        };
        config.cache.enabled = false;
        config
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_queued_analysis_reports_after_shutdown() {
        let (observer, sink) = observer_with_sink(SqlScopeConfig::default());

        let outcome = observer
            .observe("OrderMapper.byStatus", orders_by_status("open"), Arc::new(orders_full_scan()), 500)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Queued);

        observer.shutdown().await;
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].statement_id, "OrderMapper.byStatus");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_queued_failure_is_logged_not_returned() {
        let (observer, sink) = observer_with_sink(SqlScopeConfig::default());

        let outcome = observer
            .observe(
                "OrderMapper.byStatus",
                orders_by_status("open"),
                Arc::new(MockProvider::mysql().with_acquire_failure()),
                500,
            )
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Queued);
        observer.shutdown().await;
        assert!(sink.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_observe_after_shutdown_fails() {
        let (observer, _sink) = observer_with_sink(SqlScopeConfig::default());
        observer.shutdown().await;

        let err = observer
            .observe("OrderMapper.byStatus", orders_by_status("open"), Arc::new(orders_full_scan()), 500)
            .await
            .unwrap_err();
        assert!(matches!(err, ObserveError::PoolClosed));
    }

    /// Occupy the single worker and fill the single queue slot
    async fn saturate(
        observer: &SqlObserver,
        gate: &Arc<Semaphore>,
    ) -> Arc<MockProvider> {
        let (started_tx, mut started_rx) = tokio::sync::mpsc::unbounded_channel();
        let provider = Arc::new(orders_full_scan().with_gate(gate.clone(), started_tx));

        let first = observer
            .observe("OrderMapper.first", orders_by_status("open"), provider.clone(), 500)
            .await
            .unwrap();
        assert_eq!(first, Outcome::Queued);
        tokio::time::timeout(Duration::from_secs(5), started_rx.recv())
            .await
            .expect("worker should pick up the first analysis")
            .unwrap();

        let second = observer
            .observe("OrderMapper.second", orders_by_status("open"), provider.clone(), 500)
            .await
            .unwrap();
        assert_eq!(second, Outcome::Queued);
        provider
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overflow_is_dropped_under_log_policy() {
        let (observer, sink) = observer_with_sink(pooled_config(1, 1, OverflowPolicy::Log));
        let gate = Arc::new(Semaphore::new(0));
        let provider = saturate(&observer, &gate).await;

        let third = observer
            .observe("OrderMapper.third", orders_by_status("open"), provider.clone(), 500)
            .await
            .unwrap();
        assert_eq!(third, Outcome::Dropped);

        gate.add_permits(10);
        observer.shutdown().await;

        let mut ids: Vec<String> = sink.reports().into_iter().map(|r| r.statement_id).collect();
        ids.sort();
        assert_eq!(ids, vec!["OrderMapper.first", "OrderMapper.second"]);
        assert_eq!(provider.acquire_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overflow_is_returned_under_propagate_policy() {
        let (observer, sink) = observer_with_sink(pooled_config(1, 1, OverflowPolicy::Propagate));
        let gate = Arc::new(Semaphore::new(0));
        let provider = saturate(&observer, &gate).await;

        let err = observer
            .observe("OrderMapper.third", orders_by_status("open"), provider, 500)
            .await
            .unwrap_err();
        match err {
            ObserveError::Overflow(overflow) => assert_eq!(
                overflow,
                DispatchOverflowError {
                    pool_size: 1,
                    queue_capacity: 1,
                }
            ),
            other => panic!("expected overflow, got {other:?}"),
        }

        gate.add_permits(10);
        observer.shutdown().await;
        assert_eq!(sink.len(), 2);
    }
}
