//! duckdb_adapter - DuckDB connection adapter for relational object mappers
//!
//! Translates a host framework's query, schema and type hooks onto DuckDB and
//! its DuckLake lakehouse extension: type mapping, sequence-backed primary
//! keys, one-time connection configuration and schema introspection.

pub mod adapter;
pub mod db;
pub mod interval;
pub mod quoting;
pub mod schema;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapter::{AdapterOptions, DuckDbAdapter};
pub use db::{ConnectionConfig, Connector, DbError, Engine, Result, ResultSet, Value};
pub use interval::{Duration, Interval};
pub use types::{LogicalType, PrimaryKeyKind, SqlType};
