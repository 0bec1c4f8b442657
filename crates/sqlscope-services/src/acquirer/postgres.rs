use super::{PlanAcquirer, release};
use crate::error::AcquisitionError;
use async_trait::async_trait;
use sqlscope_analyzer::AnalysisResult;
use sqlscope_analyzer::explain::postgres;
use sqlscope_core::{BoundStatement, ConnectionProvider, DialectTag, Value, placeholders};

/// `EXPLAIN (ANALYZE, COSTS, VERBOSE, BUFFERS, FORMAT JSON)`.
///
/// ANALYZE executes the statement, so explaining a data-modifying statement
/// repeats its side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresAcquirer;

#[async_trait]
impl PlanAcquirer for PostgresAcquirer {
    fn dialect(&self) -> DialectTag {
        DialectTag::PostgreSql
    }

    #[tracing::instrument(skip_all, fields(dialect = "postgresql"))]
    async fn acquire(
        &self,
        provider: &dyn ConnectionProvider,
        statement: &BoundStatement,
    ) -> Result<AnalysisResult, AcquisitionError> {
        let params = statement.bind()?;
        let sql = postgres::explain_sql(&placeholders::to_numbered(&statement.sql));
        let connection = provider
            .acquire()
            .await
            .map_err(AcquisitionError::Connection)?;

        let explained = connection.query(&sql, &params).await;
        release(connection).await;
        let explained = explained.map_err(AcquisitionError::Explain)?;

        let document = explained
            .rows
            .first()
            .and_then(|row| row.get(0))
            .ok_or_else(|| AcquisitionError::InvalidPlan("EXPLAIN returned no rows".into()))?;
        let parsed = match document {
            Value::Json(json) => postgres::parse_value(json),
            Value::String(text) => postgres::parse_json(text),
            other => {
                return Err(AcquisitionError::InvalidPlan(format!(
                    "unexpected EXPLAIN output value: {other}"
                )));
            }
        }
        .map_err(|err| AcquisitionError::InvalidPlan(err.to_string()))?;

        tracing::debug!(
            nodes = parsed.nodes.len(),
            planning_ms = ?parsed.metrics.planning_time_ms,
            "acquired PostgreSQL plan"
        );
        Ok(AnalysisResult::new(statement.sql.clone(), parsed.nodes)
            .with_postgres_metrics(parsed.metrics))
    }
}
