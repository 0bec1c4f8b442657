//! sqlscope analyzer - plan normalization and optimization advice
//!
//! This crate provides functionality for:
//! - Normalizing EXPLAIN output from PostgreSQL, MySQL and Oracle into plan rows
//! - Extracting PostgreSQL buffer and timing metrics
//! - Rule-based optimization advice, including a SQL-AST WHERE-clause audit

pub mod advice;
pub mod explain;

pub use advice::*;
pub use explain::*;
