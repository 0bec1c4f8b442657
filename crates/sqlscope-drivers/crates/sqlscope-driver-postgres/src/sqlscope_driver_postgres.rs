//! PostgreSQL connection provider backed by tokio-postgres

mod connection;
mod provider;
mod value;

pub use connection::PostgresConnection;
pub use provider::PostgresProvider;
