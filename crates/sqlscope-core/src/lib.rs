//! sqlscope core - shared abstractions for the SQL observation stack
//!
//! This crate provides the types every other sqlscope crate depends on:
//!
//! - `Value`, `Row`, `QueryResult` - database values and result sets
//! - `Connection` / `ConnectionProvider` - the async seam drivers implement
//! - `DialectTag` - the closed set of dialects plan acquisition understands
//! - `ParamValue` - host parameter shapes, property-path resolution and binding

mod connection;
mod dialect;
mod error;
pub mod params;
pub mod placeholders;
mod types;

pub use connection::*;
pub use dialect::*;
pub use error::*;
pub use params::{
    BindError, BindResult, BoundStatement, ParamRecord, ParamType, ParamValue, ParameterMapping,
};
pub use types::*;
