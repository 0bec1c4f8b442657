//! PostgreSQL connection implementation

use crate::value::{PgValue, column_value};
use async_trait::async_trait;
use sqlscope_core::{Connection, CoreError, QueryResult, Result, Row, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config, NoTls, Statement};

/// Render a server error with its detail and hint
fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = db_error.message().to_string();
    if let Some(detail) = db_error.detail().filter(|d| !d.trim().is_empty()) {
        message.push_str(&format!(" (detail: {detail})"));
    }
    if let Some(hint) = db_error.hint().filter(|h| !h.trim().is_empty()) {
        message.push_str(&format!(" (hint: {hint})"));
    }
    format!("{message} (code: {})", db_error.code().code())
}

/// A single tokio-postgres client; the connection task runs on the current
/// runtime until the client is dropped
pub struct PostgresConnection {
    client: Client,
    closed: AtomicBool,
}

impl PostgresConnection {
    pub async fn connect(config: &Config) -> Result<Self> {
        tracing::debug!(
            hosts = ?config.get_hosts(),
            dbname = ?config.get_dbname(),
            "connecting to PostgreSQL"
        );

        let (client, connection) = config.connect(NoTls).await.map_err(|e| {
            CoreError::Connection(format!(
                "failed to connect to PostgreSQL: {}",
                format_postgres_error(&e)
            ))
        })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });

        Ok(Self {
            client,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(CoreError::Connection("connection is closed".into()));
        }
        Ok(())
    }

    async fn prepare(&self, sql: &str, params: &[Value]) -> Result<(Statement, Vec<PgValue>)> {
        self.ensure_open()?;
        let statement = self.client.prepare(sql).await.map_err(|e| {
            CoreError::Query(format!(
                "failed to prepare statement: {}",
                format_postgres_error(&e)
            ))
        })?;

        let types = statement.params();
        let values = params
            .iter()
            .enumerate()
            .map(|(i, value)| PgValue::for_type(value, types.get(i)))
            .collect();
        Ok((statement, values))
    }
}

fn as_params(values: &[PgValue]) -> Vec<&(dyn ToSql + Sync)> {
    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgresql"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let (statement, values) = self.prepare(sql, params).await?;
        let affected = self
            .client
            .execute(&statement, &as_params(&values))
            .await
            .map_err(|e| {
                CoreError::Query(format!(
                    "failed to execute statement: {}",
                    format_postgres_error(&e)
                ))
            })?;
        tracing::debug!(affected_rows = affected, "statement executed");
        Ok(affected)
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let started = std::time::Instant::now();
        let (statement, values) = self.prepare(sql, params).await?;
        let pg_rows = self
            .client
            .query(&statement, &as_params(&values))
            .await
            .map_err(|e| {
                CoreError::Query(format!("failed to execute query: {}", format_postgres_error(&e)))
            })?;

        // Taken from the statement so empty results still carry column names
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let rows = pg_rows
            .iter()
            .map(|pg_row| {
                let values = (0..columns.len()).map(|idx| column_value(pg_row, idx)).collect();
                Row::new(columns.clone(), values)
            })
            .collect::<Vec<_>>();

        let execution_time_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(row_count = rows.len(), execution_time_ms, "query executed");
        Ok(QueryResult {
            columns,
            rows,
            affected_rows: 0,
            execution_time_ms,
        })
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.client.is_closed()
    }
}
