//! Connection and connection-provider traits

use crate::{DialectTag, QueryResult, Result, Value};
use async_trait::async_trait;
use std::sync::Arc;

/// A database connection used for plan acquisition
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "postgresql", "mysql")
    fn driver_name(&self) -> &str;

    /// Execute a statement that does not return rows, returning affected rows
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute a query that returns rows
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// Hands out fresh connections from the host's data source.
///
/// Plan acquisition never reuses the connection that ran the original
/// statement; every call to [`ConnectionProvider::acquire`] must return an
/// independent connection, drawn from the same pool the host uses.
#[async_trait]
pub trait ConnectionProvider: Send + Sync + 'static {
    /// Connection URL, used once per task to resolve the dialect
    fn url(&self) -> &str;

    /// Obtain a new connection
    async fn acquire(&self) -> Result<Arc<dyn Connection>>;

    /// Dialect resolved from [`ConnectionProvider::url`]
    fn dialect(&self) -> DialectTag {
        DialectTag::from_url(self.url())
    }
}

#[async_trait]
impl<T: ConnectionProvider> ConnectionProvider for Arc<T> {
    fn url(&self) -> &str {
        (**self).url()
    }

    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        (**self).acquire().await
    }
}
