//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlscope_core::{
    Connection, ConnectionProvider, CoreError, QueryResult, Result, Row, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// One statement sent to a mock connection
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedCall {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Default)]
struct MockDatabase {
    /// If a statement contains the pattern, the result is returned
    responses: Vec<(String, QueryResult)>,
    /// Statements containing any of these patterns fail
    failing: Vec<String>,
    query_log: Vec<LoggedCall>,
    execute_log: Vec<LoggedCall>,
}

/// Connection provider backed by an in-memory script of responses.
///
/// Every `acquire` returns a new [`MockConnection`] sharing the same
/// database state, so tests can assert on the statements issued across
/// acquisitions.
pub struct MockProvider {
    url: String,
    database: Arc<Mutex<MockDatabase>>,
    acquired: AtomicUsize,
    closed: Arc<AtomicUsize>,
    fail_acquire: AtomicBool,
    /// When set, every query waits for a permit before answering
    gate: Option<Arc<Semaphore>>,
    /// Signalled when a query starts
    started: Option<tokio::sync::mpsc::UnboundedSender<()>>,
}

impl MockProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: Arc::new(Mutex::new(MockDatabase::default())),
            acquired: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            fail_acquire: AtomicBool::new(false),
            gate: None,
            started: None,
        }
    }

    pub fn mysql() -> Self {
        Self::new("jdbc:mysql://localhost:3306/app")
    }

    pub fn postgres() -> Self {
        Self::new("jdbc:postgresql://localhost:5432/app")
    }

    pub fn oracle() -> Self {
        Self::new("jdbc:oracle:thin:@localhost:1521:orcl")
    }

    pub fn with_response(self, sql_contains: impl Into<String>, result: QueryResult) -> Self {
        self.database
            .lock()
            .responses
            .push((sql_contains.into(), result));
        self
    }

    pub fn with_failing(self, sql_contains: impl Into<String>) -> Self {
        self.database.lock().failing.push(sql_contains.into());
        self
    }

    pub fn with_acquire_failure(self) -> Self {
        self.fail_acquire.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_gate(
        mut self,
        gate: Arc<Semaphore>,
        started: tokio::sync::mpsc::UnboundedSender<()>,
    ) -> Self {
        self.gate = Some(gate);
        self.started = Some(started);
        self
    }

    pub fn acquire_count(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn query_log(&self) -> Vec<LoggedCall> {
        self.database.lock().query_log.clone()
    }

    pub fn execute_log(&self) -> Vec<LoggedCall> {
        self.database.lock().execute_log.clone()
    }

    pub fn into_dyn(self) -> Arc<dyn ConnectionProvider> {
        Arc::new(self)
    }
}

#[async_trait]
impl ConnectionProvider for MockProvider {
    fn url(&self) -> &str {
        &self.url
    }

    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(CoreError::Connection("pool exhausted".into()));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockConnection {
            database: self.database.clone(),
            closed: self.closed.clone(),
            is_closed: AtomicBool::new(false),
            gate: self.gate.clone(),
            started: self.started.clone(),
        }))
    }
}

pub struct MockConnection {
    database: Arc<Mutex<MockDatabase>>,
    closed: Arc<AtomicUsize>,
    is_closed: AtomicBool,
    gate: Option<Arc<Semaphore>>,
    started: Option<tokio::sync::mpsc::UnboundedSender<()>>,
}

impl MockConnection {
    fn check_failure(&self, sql: &str) -> Result<()> {
        let database = self.database.lock();
        if database.failing.iter().any(|pattern| sql.contains(pattern)) {
            return Err(CoreError::Query(format!("mock failure for: {sql}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.database.lock().execute_log.push(LoggedCall {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        self.check_failure(sql)?;
        Ok(0)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.database.lock().query_log.push(LoggedCall {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        if let Some(started) = &self.started {
            let _ = started.send(());
        }
        if let Some(gate) = &self.gate
            && let Ok(permit) = gate.acquire().await
        {
            permit.forget();
        }
        self.check_failure(sql)?;

        let database = self.database.lock();
        Ok(database
            .responses
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default())
    }

    async fn close(&self) -> Result<()> {
        self.is_closed.store(true, Ordering::SeqCst);
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.is_closed.load(Ordering::SeqCst)
    }
}

/// Build a tabular result with the given columns
pub fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResult {
    let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    QueryResult {
        rows: rows
            .into_iter()
            .map(|values| Row::new(columns.clone(), values))
            .collect(),
        columns,
        ..Default::default()
    }
}

/// A MySQL `EXPLAIN` row with the columns the advice rules read
pub fn mysql_plan_row(table_name: &str, access: &str, rows: i64, extra: &str) -> Vec<Value> {
    vec![
        Value::Int64(1),
        Value::String("SIMPLE".into()),
        Value::String(table_name.into()),
        Value::String(access.into()),
        Value::Null,
        Value::Int64(rows),
        Value::Float64(10.0),
        Value::String(extra.into()),
    ]
}

pub const MYSQL_PLAN_COLUMNS: &[&str] = &[
    "id",
    "select_type",
    "table",
    "type",
    "key",
    "rows",
    "filtered",
    "Extra",
];

/// The single-cell result PostgreSQL returns for `FORMAT JSON`
pub fn postgres_json(document: serde_json::Value) -> QueryResult {
    table(&["QUERY PLAN"], vec![vec![Value::Json(document)]])
}
