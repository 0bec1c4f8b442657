//! Per-dialect plan acquisition
//!
//! Every acquirer obtains a fresh connection from the host's provider, binds
//! the statement's parameters and runs the dialect's EXPLAIN form. The
//! [`AcquirerRegistry`] maps a [`DialectTag`] to its acquirer; a missing
//! entry is reported as [`AcquisitionError::Unsupported`] so callers can
//! skip analysis.

mod mysql;
mod oracle;
mod postgres;

pub use mysql::MySqlAcquirer;
pub use oracle::OracleAcquirer;
pub use postgres::PostgresAcquirer;

use crate::error::AcquisitionError;
use async_trait::async_trait;
use sqlscope_analyzer::AnalysisResult;
use sqlscope_core::{BoundStatement, Connection, ConnectionProvider, DialectTag};
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait PlanAcquirer: Send + Sync {
    fn dialect(&self) -> DialectTag;

    /// Obtain the plan for `statement` on a new connection from `provider`
    async fn acquire(
        &self,
        provider: &dyn ConnectionProvider,
        statement: &BoundStatement,
    ) -> Result<AnalysisResult, AcquisitionError>;
}

/// Acquirers keyed by dialect
#[derive(Clone, Default)]
pub struct AcquirerRegistry {
    acquirers: HashMap<DialectTag, Arc<dyn PlanAcquirer>>,
}

impl AcquirerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// MySQL, PostgreSQL and Oracle acquirers
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MySqlAcquirer));
        registry.register(Arc::new(PostgresAcquirer));
        registry.register(Arc::new(OracleAcquirer));
        registry
    }

    /// Register an acquirer, replacing any previous one for its dialect
    pub fn register(&mut self, acquirer: Arc<dyn PlanAcquirer>) {
        self.acquirers.insert(acquirer.dialect(), acquirer);
    }

    pub fn get(&self, dialect: DialectTag) -> Result<Arc<dyn PlanAcquirer>, AcquisitionError> {
        self.acquirers
            .get(&dialect)
            .cloned()
            .ok_or(AcquisitionError::Unsupported(dialect))
    }

    pub fn supports(&self, dialect: DialectTag) -> bool {
        self.acquirers.contains_key(&dialect)
    }
}

impl std::fmt::Debug for AcquirerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquirerRegistry")
            .field("dialects", &self.acquirers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Close an acquisition connection, logging rather than failing
async fn release(connection: Arc<dyn Connection>) {
    if let Err(err) = connection.close().await {
        tracing::debug!(error = %err, "failed to close plan acquisition connection");
    }
}
