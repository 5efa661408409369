//! Column metadata as reconstructed from introspection.

use serde::{Deserialize, Serialize};

use crate::db::Value;
use crate::types::{parse_sql_type, LogicalType, SqlType};

/// Default attached to a column.
///
/// A column has a literal default or a function default, never both.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ColumnDefault {
    #[default]
    None,
    /// Literal value: text, integer, float or normalized boolean text.
    Literal(Value),
    /// Expression evaluated on insert, e.g. `nextval('users_id_seq')`.
    Function(String),
}

impl ColumnDefault {
    pub fn is_none(&self) -> bool {
        matches!(self, ColumnDefault::None)
    }

    /// True for `nextval(...)` defaults.
    pub fn is_sequence(&self) -> bool {
        match self {
            ColumnDefault::Function(expr) => expr.trim_start().to_ascii_lowercase().starts_with("nextval("),
            _ => false,
        }
    }
}

/// Full metadata for one column. Built fresh on every introspection call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Type spelling as the engine reported it.
    pub sql_type: String,
    #[serde(flatten)]
    pub parsed: SqlType,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "ColumnDefault::is_none")]
    pub default: ColumnDefault,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        let sql_type = sql_type.into();
        Self {
            name: name.into(),
            parsed: parse_sql_type(&sql_type),
            sql_type,
            nullable: true,
            default: ColumnDefault::None,
            collation: None,
            comment: None,
            primary_key: false,
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = default;
        self
    }

    pub fn with_primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }

    pub fn logical_type(&self) -> LogicalType {
        self.parsed.logical_type
    }

    pub fn limit(&self) -> Option<u32> {
        self.parsed.limit
    }

    pub fn precision(&self) -> Option<u32> {
        self.parsed.precision
    }

    pub fn scale(&self) -> Option<u32> {
        self.parsed.scale
    }

    pub fn default_value(&self) -> Option<&Value> {
        match &self.default {
            ColumnDefault::Literal(value) => Some(value),
            _ => None,
        }
    }

    pub fn default_function(&self) -> Option<&str> {
        match &self.default {
            ColumnDefault::Function(expr) => Some(expr),
            _ => None,
        }
    }

    /// Values come from a sequence rather than the caller.
    pub fn auto_increment(&self) -> bool {
        self.default.is_sequence()
    }

    /// Sequence-backed integer primary key, the engine's stand-in for a row id.
    pub fn is_rowid(&self) -> bool {
        self.primary_key && self.parsed.logical_type.is_integer_family() && self.auto_increment()
    }
}
