use super::{PlanAcquirer, release};
use crate::error::AcquisitionError;
use async_trait::async_trait;
use sqlscope_analyzer::AnalysisResult;
use sqlscope_analyzer::explain::mysql;
use sqlscope_core::{BoundStatement, ConnectionProvider, DialectTag};

/// Tabular `EXPLAIN <sql>` with the statement's bound parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlAcquirer;

#[async_trait]
impl PlanAcquirer for MySqlAcquirer {
    fn dialect(&self) -> DialectTag {
        DialectTag::MySql
    }

    #[tracing::instrument(skip_all, fields(dialect = "mysql"))]
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

        let explained = connection
            .query(&mysql::explain_sql(&statement.sql), &params)
            .await;
        release(connection).await;

        let explained = explained.map_err(AcquisitionError::Explain)?;
        let plan = mysql::rows_from_result(&explained);
        tracing::debug!(rows = plan.len(), "acquired MySQL plan");
        Ok(AnalysisResult::new(statement.sql.clone(), plan))
    }
}
