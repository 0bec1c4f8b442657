use super::{PlanAcquirer, release};
use crate::error::AcquisitionError;
use async_trait::async_trait;
use sqlscope_analyzer::AnalysisResult;
use sqlscope_analyzer::explain::oracle;
use sqlscope_core::{BoundStatement, ConnectionProvider, DialectTag};

/// `EXPLAIN PLAN` into the plan table, read back through `DBMS_XPLAN`.
///
/// Clearing stale rows is best-effort and a failure to read the formatted
/// plan leaves the plan empty; both are common where plan-table privileges
/// are restricted.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleAcquirer;

#[async_trait]
impl PlanAcquirer for OracleAcquirer {
    fn dialect(&self) -> DialectTag {
        DialectTag::Oracle
    }

    #[tracing::instrument(skip_all, fields(dialect = "oracle"))]
    async fn acquire(
        &self,
        provider: &dyn ConnectionProvider,
        statement: &BoundStatement,
    ) -> Result<AnalysisResult, AcquisitionError> {
        let params = statement.bind()?;
        let connection = provider
            .acquire()
            .await
            .map_err(AcquisitionError::Connection)?;

        if let Err(err) = connection.execute(&oracle::clear_plan_sql(), &[]).await {
            tracing::debug!(error = %err, "could not clear stale plan rows");
        }

        if let Err(err) = connection
            .execute(&oracle::explain_plan_sql(&statement.sql), &params)
            .await
        {
            release(connection).await;
            return Err(AcquisitionError::Explain(err));
        }

        let plan = match connection.query(&oracle::display_plan_sql(), &[]).await {
            Ok(output) => oracle::rows_from_result(&output),
            Err(err) => {
                tracing::error!(error = %err, "failed to read formatted Oracle plan");
                Vec::new()
            }
        };
        release(connection).await;

        Ok(AnalysisResult::new(statement.sql.clone(), plan))
    }
}
