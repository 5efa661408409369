//! Bidirectional mapping between DuckDB SQL types and logical column types.
//!
//! # Type Mapping
//!
//! | Logical | Rendered SQL | Also parsed from |
//! |---------|--------------|------------------|
//! | string | VARCHAR(n) | CHAR, BPCHAR, STRING, CHARACTER VARYING |
//! | text | TEXT | |
//! | integer | INTEGER | INT, SIGNED, INT32 |
//! | integer(n) | INT1, INT2, INT4, INT8, INT128 | |
//! | bigint | BIGINT | LONG, INT64, HUGEINT (limit 16) |
//! | float | DOUBLE | FLOAT, REAL, FLOAT4, FLOAT8 |
//! | decimal | DECIMAL(p,s) | NUMERIC |
//! | datetime | TIMESTAMP[_S/_MS/_NS] | DATETIME, TIMESTAMPTZ |
//! | binary | BLOB | BYTEA, VARBINARY |
//! | list/struct/map/enum | their own definition | `T[]`, `STRUCT(..)`, `MAP(..)`, `ENUM(..)` |
//!
//! An explicit integer byte limit is spelled with DuckDB's width aliases
//! (`INT1` is `TINYINT`, `INT128` is `HUGEINT`), so the limit survives a
//! render/parse round trip while the engine type is the same.
//!
//! Parsing never fails: anything unrecognized is a `string`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::{DbError, Result};

/// Logical column type as the host framework sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    String,
    Text,
    Integer,
    Bigint,
    Float,
    Decimal,
    Datetime,
    Date,
    Time,
    Boolean,
    Binary,
    Uuid,
    Interval,
    Tinyint,
    Smallint,
    Hugeint,
    Utinyint,
    Usmallint,
    Uinteger,
    Ubigint,
    Uhugeint,
    Json,
    List,
    Struct,
    Map,
    Enum,
}

impl LogicalType {
    pub const ALL: [LogicalType; 26] = [
        LogicalType::String,
        LogicalType::Text,
        LogicalType::Integer,
        LogicalType::Bigint,
        LogicalType::Float,
        LogicalType::Decimal,
        LogicalType::Datetime,
        LogicalType::Date,
        LogicalType::Time,
        LogicalType::Boolean,
        LogicalType::Binary,
        LogicalType::Uuid,
        LogicalType::Interval,
        LogicalType::Tinyint,
        LogicalType::Smallint,
        LogicalType::Hugeint,
        LogicalType::Utinyint,
        LogicalType::Usmallint,
        LogicalType::Uinteger,
        LogicalType::Ubigint,
        LogicalType::Uhugeint,
        LogicalType::Json,
        LogicalType::List,
        LogicalType::Struct,
        LogicalType::Map,
        LogicalType::Enum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::String => "string",
            LogicalType::Text => "text",
            LogicalType::Integer => "integer",
            LogicalType::Bigint => "bigint",
            LogicalType::Float => "float",
            LogicalType::Decimal => "decimal",
            LogicalType::Datetime => "datetime",
            LogicalType::Date => "date",
            LogicalType::Time => "time",
            LogicalType::Boolean => "boolean",
            LogicalType::Binary => "binary",
            LogicalType::Uuid => "uuid",
            LogicalType::Interval => "interval",
            LogicalType::Tinyint => "tinyint",
            LogicalType::Smallint => "smallint",
            LogicalType::Hugeint => "hugeint",
            LogicalType::Utinyint => "utinyint",
            LogicalType::Usmallint => "usmallint",
            LogicalType::Uinteger => "uinteger",
            LogicalType::Ubigint => "ubigint",
            LogicalType::Uhugeint => "uhugeint",
            LogicalType::Json => "json",
            LogicalType::List => "list",
            LogicalType::Struct => "struct",
            LogicalType::Map => "map",
            LogicalType::Enum => "enum",
        }
    }

    /// Signed and unsigned integer types of any width.
    pub fn is_integer_family(&self) -> bool {
        matches!(
            self,
            LogicalType::Integer
                | LogicalType::Bigint
                | LogicalType::Tinyint
                | LogicalType::Smallint
                | LogicalType::Hugeint
                | LogicalType::Utinyint
                | LogicalType::Usmallint
                | LogicalType::Uinteger
                | LogicalType::Ubigint
                | LogicalType::Uhugeint
        )
    }

    /// Types whose SQL spelling carries its own structure (`INTEGER[]`, `STRUCT(..)`).
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            LogicalType::List | LogicalType::Struct | LogicalType::Map | LogicalType::Enum
        )
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed SQL type: logical tag plus the modifiers the SQL spelling carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlType {
    pub logical_type: LogicalType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Full SQL spelling for composite types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

impl SqlType {
    pub fn new(logical_type: LogicalType) -> Self {
        Self {
            logical_type,
            limit: None,
            precision: None,
            scale: None,
            definition: None,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    /// Render back to the engine's spelling.
    pub fn to_sql(&self) -> Result<String> {
        if self.logical_type.is_composite() {
            return self.definition.clone().ok_or_else(|| {
                DbError::configuration(format!(
                    "{} columns need a full type definition (e.g. INTEGER[])",
                    self.logical_type
                ))
            });
        }
        render_sql_type(self.logical_type, self.limit, self.precision, self.scale)
    }
}

/// Primary key flavour configured per adapter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryKeyKind {
    #[default]
    Bigint,
    Integer,
    Uuid,
    String,
}

impl PrimaryKeyKind {
    /// Integer primary keys are emulated with a sequence.
    pub fn is_sequence_backed(&self) -> bool {
        matches!(self, PrimaryKeyKind::Bigint | PrimaryKeyKind::Integer)
    }

    pub fn logical_type(&self) -> LogicalType {
        match self {
            PrimaryKeyKind::Bigint => LogicalType::Bigint,
            PrimaryKeyKind::Integer => LogicalType::Integer,
            PrimaryKeyKind::Uuid => LogicalType::Uuid,
            PrimaryKeyKind::String => LogicalType::String,
        }
    }

    /// Column type plus constraint suffix for a primary key column.
    ///
    /// DuckLake rejects uniqueness constraints and non-literal defaults, so in
    /// that mode only the bare type is emitted.
    pub fn to_sql(&self, ducklake: bool) -> String {
        match (self, ducklake) {
            (PrimaryKeyKind::Bigint, false) => "BIGINT PRIMARY KEY".to_string(),
            (PrimaryKeyKind::Integer, false) => "INTEGER PRIMARY KEY".to_string(),
            (PrimaryKeyKind::Uuid, false) => "UUID DEFAULT gen_random_uuid() PRIMARY KEY".to_string(),
            (PrimaryKeyKind::String, false) => "VARCHAR PRIMARY KEY".to_string(),
            (PrimaryKeyKind::Bigint, true) => "BIGINT".to_string(),
            (PrimaryKeyKind::Integer, true) => "INTEGER".to_string(),
            (PrimaryKeyKind::Uuid, true) => "UUID".to_string(),
            (PrimaryKeyKind::String, true) => "VARCHAR".to_string(),
        }
    }
}

/// Modifier layout a pattern's capture groups carry.
#[derive(Debug, Clone, Copy)]
enum Modifiers {
    None,
    Limit,
    PrecisionScale,
    Fixed { limit: Option<u32>, precision: Option<u32> },
    Definition,
}

const ARGS: &str = r"(?:\s*\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\))?";

static TYPE_PATTERNS: LazyLock<Vec<(Regex, LogicalType, Modifiers)>> = LazyLock::new(|| {
    let table: Vec<(String, LogicalType, Modifiers)> = vec![
        (r"\[\d*\]\s*$".into(), LogicalType::List, Modifiers::Definition),
        (r"^STRUCT\s*\(".into(), LogicalType::Struct, Modifiers::Definition),
        (r"^MAP\s*\(".into(), LogicalType::Map, Modifiers::Definition),
        (r"^ENUM\s*\(".into(), LogicalType::Enum, Modifiers::Definition),
        (format!(r"^(?:DECIMAL|NUMERIC)\b{ARGS}"), LogicalType::Decimal, Modifiers::PrecisionScale),
        (
            format!(r"^(?:VARCHAR|CHARACTER\s+VARYING|NVARCHAR|BPCHAR|CHARACTER|CHAR|STRING)\b{ARGS}"),
            LogicalType::String,
            Modifiers::Limit,
        ),
        (r"^TEXT\b".into(), LogicalType::Text, Modifiers::None),
        (r"^UUID\b".into(), LogicalType::Uuid, Modifiers::None),
        (r"^JSON\b".into(), LogicalType::Json, Modifiers::None),
        (r"^INTERVAL\b".into(), LogicalType::Interval, Modifiers::None),
        (r"^UHUGEINT\b".into(), LogicalType::Uhugeint, Modifiers::None),
        (
            r"^INT128\b".into(),
            LogicalType::Integer,
            Modifiers::Fixed { limit: Some(16), precision: None },
        ),
        (
            r"^HUGEINT\b".into(),
            LogicalType::Bigint,
            Modifiers::Fixed { limit: Some(16), precision: None },
        ),
        (r"^(?:UTINYINT|UINT8)\b".into(), LogicalType::Utinyint, Modifiers::None),
        (r"^(?:USMALLINT|UINT16)\b".into(), LogicalType::Usmallint, Modifiers::None),
        (r"^(?:UINTEGER|UINT32)\b".into(), LogicalType::Uinteger, Modifiers::None),
        (r"^(?:UBIGINT|UINT64)\b".into(), LogicalType::Ubigint, Modifiers::None),
        (r"^INT1\b".into(), LogicalType::Integer, Modifiers::Fixed { limit: Some(1), precision: None }),
        (r"^INT2\b".into(), LogicalType::Integer, Modifiers::Fixed { limit: Some(2), precision: None }),
        (r"^INT4\b".into(), LogicalType::Integer, Modifiers::Fixed { limit: Some(4), precision: None }),
        (r"^INT8\b".into(), LogicalType::Integer, Modifiers::Fixed { limit: Some(8), precision: None }),
        (r"^TINYINT\b".into(), LogicalType::Tinyint, Modifiers::None),
        (r"^(?:SMALLINT|INT16|SHORT)\b".into(), LogicalType::Smallint, Modifiers::None),
        (r"^(?:BIGINT|INT64|LONG)\b".into(), LogicalType::Bigint, Modifiers::None),
        (r"^(?:INTEGER|INT32|INT|SIGNED)\b".into(), LogicalType::Integer, Modifiers::None),
        (r"^(?:DOUBLE|FLOAT8|FLOAT4|FLOAT|REAL)\b".into(), LogicalType::Float, Modifiers::None),
        (r"^(?:BOOLEAN|BOOL|LOGICAL)\b".into(), LogicalType::Boolean, Modifiers::None),
        (
            r"^TIMESTAMP_S\b".into(),
            LogicalType::Datetime,
            Modifiers::Fixed { limit: None, precision: Some(0) },
        ),
        (
            r"^TIMESTAMP_MS\b".into(),
            LogicalType::Datetime,
            Modifiers::Fixed { limit: None, precision: Some(3) },
        ),
        (
            r"^TIMESTAMP_NS\b".into(),
            LogicalType::Datetime,
            Modifiers::Fixed { limit: None, precision: Some(9) },
        ),
        (r"^(?:TIMESTAMPTZ|TIMESTAMP|DATETIME)\b".into(), LogicalType::Datetime, Modifiers::None),
        (r"^DATE\b".into(), LogicalType::Date, Modifiers::None),
        (r"^(?:TIMETZ|TIME)\b".into(), LogicalType::Time, Modifiers::None),
        (r"^(?:BLOB|BYTEA|VARBINARY|BINARY)\b".into(), LogicalType::Binary, Modifiers::None),
    ];

    table
        .into_iter()
        .map(|(pattern, logical, modifiers)| {
            let regex = Regex::new(&format!("(?i){pattern}")).expect("valid type pattern");
            (regex, logical, modifiers)
        })
        .collect()
});

/// Parse an introspection type string into a logical type plus modifiers.
///
/// Matching is case-insensitive and prefix-based; unmatched input yields a
/// plain `string` with no modifiers.
pub fn parse_sql_type(text: &str) -> SqlType {
    let trimmed = text.trim();
    for (regex, logical, modifiers) in TYPE_PATTERNS.iter() {
        let Some(caps) = regex.captures(trimmed) else {
            continue;
        };
        let arg = |idx: usize| caps.get(idx).and_then(|m| m.as_str().parse::<u32>().ok());
        let mut sql_type = SqlType::new(*logical);
        match modifiers {
            Modifiers::None => {}
            Modifiers::Limit => sql_type.limit = arg(1),
            Modifiers::PrecisionScale => {
                sql_type.precision = arg(1);
                sql_type.scale = arg(2);
            }
            Modifiers::Fixed { limit, precision } => {
                sql_type.limit = *limit;
                sql_type.precision = *precision;
            }
            Modifiers::Definition => sql_type.definition = Some(trimmed.to_string()),
        }
        return sql_type;
    }
    SqlType::new(LogicalType::String)
}

/// Narrowest engine integer type covering `limit` bytes, by its width alias.
fn integer_to_sql(limit: Option<u32>) -> Result<&'static str> {
    match limit {
        None => Ok("INTEGER"),
        Some(1) => Ok("INT1"),
        Some(2) => Ok("INT2"),
        Some(0..=4) => Ok("INT4"),
        Some(5..=8) => Ok("INT8"),
        Some(9..=16) => Ok("INT128"),
        Some(limit) => Err(DbError::UnsupportedIntegerLimit { limit }),
    }
}

/// Render a logical type plus modifiers as an engine SQL type.
pub fn render_sql_type(
    logical_type: LogicalType,
    limit: Option<u32>,
    precision: Option<u32>,
    scale: Option<u32>,
) -> Result<String> {
    let sql = match logical_type {
        LogicalType::String => match limit {
            Some(n) => format!("VARCHAR({n})"),
            None => "VARCHAR".to_string(),
        },
        LogicalType::Text => "TEXT".to_string(),
        LogicalType::Integer => integer_to_sql(limit)?.to_string(),
        LogicalType::Bigint => match limit {
            None => "BIGINT".to_string(),
            Some(16) => "HUGEINT".to_string(),
            Some(_) => integer_to_sql(limit)?.to_string(),
        },
        LogicalType::Float => "DOUBLE".to_string(),
        LogicalType::Decimal => match (precision, scale) {
            (Some(p), Some(s)) => format!("DECIMAL({p},{s})"),
            (Some(p), None) => format!("DECIMAL({p})"),
            _ => "DECIMAL".to_string(),
        },
        LogicalType::Datetime => match precision {
            Some(0) => "TIMESTAMP_S".to_string(),
            Some(3) => "TIMESTAMP_MS".to_string(),
            Some(9) => "TIMESTAMP_NS".to_string(),
            _ => "TIMESTAMP".to_string(),
        },
        LogicalType::Date => "DATE".to_string(),
        LogicalType::Time => "TIME".to_string(),
        LogicalType::Boolean => "BOOLEAN".to_string(),
        LogicalType::Binary => "BLOB".to_string(),
        LogicalType::Uuid => "UUID".to_string(),
        LogicalType::Interval => "INTERVAL".to_string(),
        LogicalType::Tinyint => "TINYINT".to_string(),
        LogicalType::Smallint => "SMALLINT".to_string(),
        LogicalType::Hugeint => "HUGEINT".to_string(),
        LogicalType::Utinyint => "UTINYINT".to_string(),
        LogicalType::Usmallint => "USMALLINT".to_string(),
        LogicalType::Uinteger => "UINTEGER".to_string(),
        LogicalType::Ubigint => "UBIGINT".to_string(),
        LogicalType::Uhugeint => "UHUGEINT".to_string(),
        LogicalType::Json => "JSON".to_string(),
        LogicalType::List | LogicalType::Struct | LogicalType::Map | LogicalType::Enum => {
            return Err(DbError::configuration(format!(
                "{logical_type} columns need a full type definition (e.g. INTEGER[])"
            )));
        }
    };
    Ok(sql)
}
