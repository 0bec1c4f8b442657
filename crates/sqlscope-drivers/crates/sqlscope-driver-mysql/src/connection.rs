//! MySQL connection implementation

use crate::value::{from_mysql, to_mysql};
use async_trait::async_trait;
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Params, Row as MySqlRow};
use sqlscope_core::{Connection, CoreError, QueryResult, Result, Row, Value};
use tokio::sync::Mutex;

/// One pooled connection; closing returns it to the pool
pub struct MySqlConnection {
    conn: Mutex<Option<Conn>>,
}

impl MySqlConnection {
    pub(crate) fn new(conn: Conn) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
        }
    }
}

fn params(values: &[Value]) -> Params {
    if values.is_empty() {
        Params::Empty
    } else {
        Params::Positional(values.iter().map(to_mysql).collect())
    }
}

fn closed() -> CoreError {
    CoreError::Connection("connection is closed".into())
}

#[async_trait]
impl Connection for MySqlConnection {
    fn driver_name(&self) -> &str {
        "mysql"
    }

    #[tracing::instrument(skip(self, sql, values), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, values: &[Value]) -> Result<u64> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(closed)?;
        conn.exec_drop(sql, params(values))
            .await
            .map_err(|e| CoreError::Query(format!("failed to execute statement: {e}")))?;
        let affected = conn.affected_rows();
        tracing::debug!(affected_rows = affected, "statement executed");
        Ok(affected)
    }

    #[tracing::instrument(skip(self, sql, values), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, values: &[Value]) -> Result<QueryResult> {
        let started = std::time::Instant::now();
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(closed)?;
        let mysql_rows: Vec<MySqlRow> = conn
            .exec(sql, params(values))
            .await
            .map_err(|e| CoreError::Query(format!("failed to execute query: {e}")))?;
        drop(guard);

        let (columns, column_types): (Vec<String>, Vec<ColumnType>) = mysql_rows
            .first()
            .map(|row| {
                row.columns_ref()
                    .iter()
                    .map(|c| (c.name_str().to_string(), c.column_type()))
                    .unzip()
            })
            .unwrap_or_default();

        let rows: Vec<Row> = mysql_rows
            .into_iter()
            .map(|mut mysql_row| {
                let values = column_types
                    .iter()
                    .enumerate()
                    .map(|(idx, column_type)| {
                        let raw = mysql_row.take(idx).unwrap_or(mysql_async::Value::NULL);
                        from_mysql(raw, *column_type)
                    })
                    .collect();
                Row::new(columns.clone(), values)
            })
            .collect();

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
        // Dropping a pooled Conn hands it back to the pool
        self.conn.lock().await.take();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.conn.try_lock().map(|conn| conn.is_none()).unwrap_or(false)
    }
}
