//! Connection provider for PostgreSQL URLs

use crate::connection::PostgresConnection;
use async_trait::async_trait;
use sqlscope_core::{Connection, ConnectionProvider, CoreError, DialectTag, Result};
use std::sync::Arc;
use tokio_postgres::Config;

/// Opens a new connection per acquisition.
///
/// Accepts `postgres://`, `postgresql://` and JDBC-style
/// `jdbc:postgresql://` URLs; credentials can be given in the URL or with
/// [`PostgresProvider::with_credentials`].
#[derive(Clone)]
pub struct PostgresProvider {
    url: String,
    config: Config,
}

impl PostgresProvider {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let config = parse_url(&url)?;
        Ok(Self { url, config })
    }

    pub fn with_credentials(mut self, user: &str, password: Option<&str>) -> Self {
        self.config.user(user);
        if let Some(password) = password {
            self.config.password(password);
        }
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn parse_url(url: &str) -> Result<Config> {
    if DialectTag::from_url(url) != DialectTag::PostgreSql {
        return Err(CoreError::Configuration(format!(
            "not a PostgreSQL URL: {url}"
        )));
    }
    let trimmed = url.strip_prefix("jdbc:").unwrap_or(url);
    trimmed
        .parse::<Config>()
        .map_err(|e| CoreError::Configuration(format!("invalid PostgreSQL URL {url}: {e}")))
}

#[async_trait]
impl ConnectionProvider for PostgresProvider {
    fn url(&self) -> &str {
        &self.url
    }

    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        let connection = PostgresConnection::connect(&self.config).await?;
        Ok(Arc::new(connection))
    }
}

impl std::fmt::Debug for PostgresProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Config's Debug redacts the password
        f.debug_struct("PostgresProvider")
            .field("config", &self.config)
            .finish()
    }
}
