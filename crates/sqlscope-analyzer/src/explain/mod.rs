//! EXPLAIN normalization
//!
//! Every dialect's plan output is turned into an ordered sequence of
//! [`PlanRow`]s: one order-preserving field map per row (MySQL, Oracle) or per
//! plan node (PostgreSQL).
//!
//! # Example
//!
//! ```
//! use sqlscope_analyzer::explain::{parse_postgres_json, PlanRowExt};
//!
//! let json = r#"[{"Plan": {"Node Type": "Seq Scan", "Relation Name": "users"}, "Planning Time": 0.1}]"#;
//! let plan = parse_postgres_json(json).unwrap();
//! assert_eq!(plan.nodes[0].str_field("Relation Name"), Some("users"));
//! assert_eq!(plan.metrics.planning_time_ms, Some(0.1));
//! ```

pub mod mysql;
pub mod oracle;
pub mod postgres;
pub mod result;

pub use mysql::rows_from_result as mysql_rows_from_result;
pub use oracle::{PLAN_TABLE_OUTPUT, rows_from_result as oracle_rows_from_result};
pub use postgres::{PostgresExplainError, PostgresPlan, parse_json as parse_postgres_json};
pub use result::{AnalysisResult, PlanRow, PlanRowExt, PostgresMetrics};
