//! MySQL connection provider backed by a mysql_async pool

mod connection;
mod provider;
mod value;

pub use connection::MySqlConnection;
pub use provider::MySqlProvider;
