//! Pooled connection provider for MySQL URLs

use crate::connection::MySqlConnection;
use async_trait::async_trait;
use mysql_async::{Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts};
use sqlscope_core::{Connection, ConnectionProvider, CoreError, DialectTag, Result};
use std::sync::Arc;

/// Hands out connections from a shared mysql_async pool.
///
/// Accepts `mysql://` and JDBC-style `jdbc:mysql://` URLs. The pool must be
/// created inside a tokio runtime.
#[derive(Clone)]
pub struct MySqlProvider {
    url: String,
    pool: Pool,
}

impl MySqlProvider {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let opts = parse_url(&url)?;
        Ok(Self::with_opts(url, opts))
    }

    /// Cap the pool at `max` connections
    pub fn with_max_connections(url: impl Into<String>, max: usize) -> Result<Self> {
        let url = url.into();
        let constraints = PoolConstraints::new(0, max.max(1)).ok_or_else(|| {
            CoreError::Configuration(format!("invalid MySQL pool size: {max}"))
        })?;
        let opts = OptsBuilder::from_opts(parse_url(&url)?)
            .pool_opts(PoolOpts::default().with_constraints(constraints));
        Ok(Self::with_opts(url, opts.into()))
    }

    fn with_opts(url: String, opts: Opts) -> Self {
        tracing::debug!(
            host = %opts.ip_or_hostname(),
            port = opts.tcp_port(),
            database = ?opts.db_name(),
            "created MySQL pool"
        );
        Self {
            url,
            pool: Pool::new(opts),
        }
    }

    /// Close every pooled connection
    pub async fn disconnect(self) -> Result<()> {
        self.pool
            .disconnect()
            .await
            .map_err(|e| CoreError::Connection(format!("failed to close MySQL pool: {e}")))
    }
}

pub(crate) fn parse_url(url: &str) -> Result<Opts> {
    if DialectTag::from_url(url) != DialectTag::MySql {
        return Err(CoreError::Configuration(format!("not a MySQL URL: {url}")));
    }
    let trimmed = url.strip_prefix("jdbc:").unwrap_or(url);
    // mysql_async only knows the mysql scheme
    let normalized = match trimmed.strip_prefix("mariadb:") {
        Some(rest) => format!("mysql:{rest}"),
        None => trimmed.to_string(),
    };
    Opts::from_url(&normalized)
        .map_err(|e| CoreError::Configuration(format!("invalid MySQL URL {url}: {e}")))
}

#[async_trait]
impl ConnectionProvider for MySqlProvider {
    fn url(&self) -> &str {
        &self.url
    }

    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        let conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| CoreError::Connection(format!("failed to get MySQL connection: {e}")))?;
        Ok(Arc::new(MySqlConnection::new(conn)))
    }
}

impl std::fmt::Debug for MySqlProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlProvider").finish_non_exhaustive()
    }
}
