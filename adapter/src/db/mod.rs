//! Engine abstraction layer for the adapter.
//!
//! This module provides the seams between the adapter and the embedded engine:
//! - `Engine`: run SQL with positional binds, get columns + rows or a changed-row count
//! - `Connector`: open a brand-new physical connection from a `ConnectionConfig`
//! - `Value`: backend-agnostic cell/bind value
//! - `DbError`: the single error type every layer returns
//!
//! # Type Decisions
//!
//! **Why `i64` for most integers?**
//! The host framework's integer type is 64-bit. Unsigned and 128-bit engine values
//! keep their own variants so nothing is silently truncated on the way out.
//!
//! **Why two column header shapes in `RawColumn`?**
//! Drivers expose column names either directly or through a nested description.
//! The execution shim normalizes both into plain strings.

pub mod config;
pub mod configure;
#[cfg(feature = "backend-duckdb")]
pub mod duckdb;
pub mod execution;
pub mod time;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::interval::Interval;

pub use config::ConnectionConfig;

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to open database '{path}': {message}")]
    OpenFailed { path: String, message: String },

    #[error("Statement invalid: {message}\n  SQL: {sql}")]
    StatementInvalid { sql: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Missing required connection parameter '{name}'")]
    MissingParameter { name: String },

    #[error("No integer type has byte size {limit}. Use a numeric with scale 0 instead.")]
    UnsupportedIntegerLimit { limit: u32 },

    #[error("Savepoints are not supported by DuckDB; avoid nested transactions (requires_new)")]
    SavepointUnsupported,

    #[error("No active connection")]
    NotConnected,

    #[error("Failed to load configuration file '{path}': {message}")]
    ConfigFile { path: String, message: String },
}

impl DbError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn statement_invalid(sql: &str, message: impl Into<String>) -> Self {
        Self::StatementInvalid {
            sql: sql.to_string(),
            message: message.into(),
        }
    }

    /// True when the engine reported that an object or feature is simply absent.
    ///
    /// Matches missing catalog entries (tables, sequences, attached catalogs),
    /// unbound metadata columns and extensions that were never loaded. Anything
    /// else, connectivity and I/O included, is not an expected absence.
    pub fn is_expected_absence(&self) -> bool {
        let Self::StatementInvalid { message, .. } = self else {
            return false;
        };
        let lower = message.to_lowercase();
        let catalog_or_binder = lower.contains("catalog error") || lower.contains("binder error");
        (catalog_or_binder && (lower.contains("does not exist") || lower.contains("not found")))
            || (lower.contains("extension")
                && (lower.contains("not loaded") || lower.contains("not found")))
    }

    /// True for "already exists" catalog conflicts (e.g. a sequence created concurrently).
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::StatementInvalid { message, .. } => message.to_lowercase().contains("already exists"),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Backend-agnostic cell and bind value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    HugeInt(i128),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(DateTime<FixedOffset>),
    Interval(Interval),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            Value::HugeInt(h) => i64::try_from(*h).ok(),
            Value::Float(f) => Some(*f as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            Value::HugeInt(h) => Some(*h as f64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Booleans arrive as real booleans or as 0/1 integers depending on the catalog.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::UInt(u) => Some(*u != 0),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Some(true),
                "false" | "f" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Text rendering used for metadata columns that may come back typed or as text.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::UInt(u) => Some(u.to_string()),
            Value::HugeInt(h) => Some(h.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Date(d) => Some(d.to_string()),
            Value::Time(t) => Some(t.to_string()),
            Value::Timestamp(ts) => Some(ts.to_rfc3339()),
            Value::Interval(i) => Some(i.to_string()),
            Value::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
            Value::List(items) => Some(format!(
                "[{}]",
                items
                    .iter()
                    .map(|v| v.to_text().unwrap_or_else(|| "NULL".to_string()))
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Interval> for Value {
    fn from(i: Interval) -> Self {
        Value::Interval(i)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// JSON form: scalars map onto JSON scalars, lists onto arrays, and every
/// other variant is written as its text rendering.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::UInt(u) => serializer.serialize_u64(*u),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::List(items) => serializer.collect_seq(items),
            other => serializer.serialize_str(&other.to_text().unwrap_or_default()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match JsonValue::deserialize(deserializer)? {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Int(i) => Value::Int(i),
            JsonValue::UInt(u) => Value::UInt(u),
            JsonValue::Float(f) => Value::Float(f),
            JsonValue::Text(s) => Value::Text(s),
            JsonValue::List(items) => Value::List(items),
        })
    }
}

/// Column description as some drivers report it.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDescription {
    pub name: Option<String>,
    pub type_name: Option<String>,
}

/// Column header exactly as the driver exposed it.
#[derive(Clone, Debug, PartialEq)]
pub enum RawColumn {
    /// Driver exposes the name directly.
    Name(String),
    /// Driver exposes the name through a nested description.
    Described(ColumnDescription),
}

/// Driver-level result of running one statement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawResult {
    pub columns: Vec<RawColumn>,
    pub rows: Vec<Vec<Value>>,
}

/// Generic result set handed back to the host framework.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Changed-row counter reported by the driver, when the contract provides one.
    pub affected_rows: Option<u64>,
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// First column of the first row, if any.
    pub fn first_value(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }
}

/// Trait for an embedded engine connection that can execute SQL.
///
/// Implementations must be thread-safe (Send + Sync); the adapter itself never
/// shares one connection across threads concurrently.
pub trait Engine: Send + Sync {
    /// Run a statement and return its columns and rows.
    fn query(&self, sql: &str, binds: &[Value]) -> Result<RawResult>;

    /// Run a statement and return the driver's changed-rows counter.
    fn execute(&self, sql: &str, binds: &[Value]) -> Result<u64>;

    /// Get the backend name for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Opens physical connections. A reconnect always goes through here again.
pub trait Connector: Send + Sync {
    fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn Engine>>;
}
