//! Dialect tags derived from connection URLs

use serde::{Deserialize, Serialize};
use std::fmt;

/// The database product family a connection talks to.
///
/// Resolved once per connection from its URL and used as the dispatch key for
/// plan acquisition and advice-rule applicability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectTag {
    MySql,
    PostgreSql,
    Oracle,
    Unknown,
}

impl DialectTag {
    /// Resolve a dialect from a connection URL.
    ///
    /// Accepts JDBC-style URLs (`jdbc:mysql://...`) as well as plain scheme
    /// URLs (`postgres://...`). MySQL is checked first, then PostgreSQL, then
    /// Oracle; anything else is [`DialectTag::Unknown`].
    pub fn from_url(url: &str) -> Self {
        let url = url.to_ascii_lowercase();
        let has_scheme = |scheme: &str| {
            url.contains(&format!(":{scheme}:")) || url.starts_with(&format!("{scheme}:"))
        };

        if has_scheme("mysql") || has_scheme("mariadb") {
            DialectTag::MySql
        } else if has_scheme("postgresql") || has_scheme("postgres") {
            DialectTag::PostgreSql
        } else if has_scheme("oracle") {
            DialectTag::Oracle
        } else {
            DialectTag::Unknown
        }
    }

    /// Human-readable product name
    pub fn display_name(&self) -> &'static str {
        match self {
            DialectTag::MySql => "MySQL",
            DialectTag::PostgreSql => "PostgreSQL",
            DialectTag::Oracle => "Oracle",
            DialectTag::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DialectTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
