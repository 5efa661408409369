//! Schema introspection through DuckDB's pragmas and `duckdb_*()` functions.
//!
//! Everything here reads the `main` schema of the current database. Metadata
//! catalogs of attached DuckLake databases never show up as tables.

use std::sync::LazyLock;

use regex::Regex;

use super::column::{ColumnDefault, ColumnDescriptor};
use super::definition::IndexDefinition;
use super::sequences::{nextval_expression, sequence_name};
use crate::db::execution::into_result_set;
use crate::db::{Engine, Result, ResultSet, Value};
use crate::quoting::{quote_string, unquote_identifier};
use crate::types::LogicalType;

const UNKNOWN_COLUMN: &str = "unknown_column";
const FALLBACK_TYPE: &str = "VARCHAR";

const TABLES_SQL: &str = "SELECT table_name FROM information_schema.tables \
     WHERE table_schema = 'main' AND table_catalog = current_database() \
     AND table_catalog NOT LIKE '__ducklake_metadata_%' AND table_type = ? \
     ORDER BY table_name";

const INDEXES_SQL: &str = "SELECT index_name, is_unique, is_primary, expressions, sql FROM duckdb_indexes() \
     WHERE table_name = ? AND schema_name = 'main' AND database_name = current_database() \
     ORDER BY index_name";

const SEQUENCES_SQL: &str = "SELECT sequence_name FROM duckdb_sequences() \
     WHERE database_name = current_database() ORDER BY sequence_name";

static QUOTED_STRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^'((?:[^']|'')*)'$").expect("valid quoted string regex"));

static CAST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^CAST\((.+)\s+AS\s+([A-Z_][A-Z0-9_ ]*(?:\([^)]*\))?)\)$").expect("valid cast regex")
});

static INTEGER_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+$").expect("valid integer regex"));

static FLOAT_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^-?(?:\d+\.\d*|\.\d+|\d+)(?:e[+-]?\d+)?$").expect("valid float regex")
});

static INDEX_COLUMNS_FROM_SQL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]*)\)\s*;?\s*$").expect("valid index sql regex"));

fn text_at(row: &[Value], idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| row.get(i)).and_then(Value::to_text)
}

fn flag_at(row: &[Value], idx: Option<usize>) -> bool {
    idx.and_then(|i| row.get(i))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn boolean_text(literal: &str) -> Option<&'static str> {
    match literal.to_ascii_lowercase().as_str() {
        "t" | "true" => Some("true"),
        "f" | "false" => Some("false"),
        _ => None,
    }
}

/// Interpret a `dflt_value` from `pragma_table_info`.
///
/// `nextval(` defaults are always functions. Quoted strings, numbers and
/// casted literals become literal values; booleans are normalized to
/// `"true"`/`"false"`. Anything else with a call or a `current_*` keyword is a
/// function, and bare words pass through as raw literal text.
pub fn parse_default(raw: Option<&str>) -> ColumnDefault {
    let Some(raw) = raw.map(str::trim) else {
        return ColumnDefault::None;
    };
    if raw.is_empty() || raw.eq_ignore_ascii_case("NULL") {
        return ColumnDefault::None;
    }
    if raw.to_ascii_lowercase().contains("nextval(") {
        return ColumnDefault::Function(raw.to_string());
    }
    if let Some(caps) = QUOTED_STRING.captures(raw) {
        return ColumnDefault::Literal(Value::Text(caps[1].replace("''", "'")));
    }
    if let Some(caps) = CAST.captures(raw) {
        let inner = caps[1].trim();
        if caps[2].trim().eq_ignore_ascii_case("BOOLEAN") {
            let literal = QUOTED_STRING
                .captures(inner)
                .map(|c| c[1].to_string())
                .unwrap_or_else(|| inner.to_string());
            if let Some(b) = boolean_text(&literal) {
                return ColumnDefault::Literal(Value::from(b));
            }
        }
        return match parse_default(Some(inner)) {
            ColumnDefault::Literal(value) => ColumnDefault::Literal(value),
            _ => ColumnDefault::Function(raw.to_string()),
        };
    }
    if INTEGER_LITERAL.is_match(raw) {
        if let Ok(i) = raw.parse::<i64>() {
            return ColumnDefault::Literal(Value::Int(i));
        }
    }
    if FLOAT_LITERAL.is_match(raw) {
        if let Ok(f) = raw.parse::<f64>() {
            return ColumnDefault::Literal(Value::Float(f));
        }
    }
    if let Some(b) = boolean_text(raw) {
        return ColumnDefault::Literal(Value::from(b));
    }
    let lower = raw.to_ascii_lowercase();
    if raw.contains('(') || lower.starts_with("current_") {
        return ColumnDefault::Function(raw.to_string());
    }
    ColumnDefault::Literal(Value::Text(raw.to_string()))
}

fn run(engine: &dyn Engine, sql: &str, binds: &[Value]) -> Result<ResultSet> {
    Ok(into_result_set(engine.query(sql, binds)?))
}

/// One `pragma_table_info` row as a column descriptor.
fn column_from_row(table: &str, result: &ResultSet, row: &[Value]) -> ColumnDescriptor {
    let name = text_at(row, result.column_index("name")).unwrap_or_else(|| UNKNOWN_COLUMN.to_string());
    let sql_type = text_at(row, result.column_index("type")).unwrap_or_else(|| FALLBACK_TYPE.to_string());
    let not_null = flag_at(row, result.column_index("notnull"));
    let primary_key = flag_at(row, result.column_index("pk"));
    let mut default = parse_default(text_at(row, result.column_index("dflt_value")).as_deref());

    let column = ColumnDescriptor::new(name, sql_type);
    // Sequence-backed `id` keys report their default even when the catalog lost it.
    if default.is_none()
        && primary_key
        && column.name == "id"
        && matches!(column.logical_type(), LogicalType::Integer | LogicalType::Bigint)
        && column.limit().is_none()
    {
        default = ColumnDefault::Function(nextval_expression(&sequence_name(table, "id")));
    }

    column
        .with_nullable(!not_null)
        .with_default(default)
        .with_primary_key(primary_key)
}

fn table_info(engine: &dyn Engine, table: &str) -> Result<ResultSet> {
    run(
        engine,
        &format!("SELECT * FROM pragma_table_info({}) ORDER BY cid", quote_string(table)),
        &[],
    )
}

/// Columns of `table` in definition order.
pub fn columns(engine: &dyn Engine, table: &str) -> Result<Vec<ColumnDescriptor>> {
    let result = table_info(engine, table)?;
    Ok(result
        .rows
        .iter()
        .map(|row| column_from_row(table, &result, row))
        .collect())
}

/// Primary key column names in definition order.
pub fn primary_keys(engine: &dyn Engine, table: &str) -> Result<Vec<String>> {
    Ok(columns(engine, table)?
        .into_iter()
        .filter(|c| c.primary_key)
        .map(|c| c.name)
        .collect())
}

/// The primary key column when there is exactly one.
pub fn primary_key(engine: &dyn Engine, table: &str) -> Result<Option<String>> {
    let mut keys = primary_keys(engine, table)?;
    Ok(if keys.len() == 1 { keys.pop() } else { None })
}

fn names_of_type(engine: &dyn Engine, table_type: &str) -> Result<Vec<String>> {
    let result = run(engine, TABLES_SQL, &[Value::from(table_type)])?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| row.first().and_then(Value::to_text))
        .collect())
}

pub fn tables(engine: &dyn Engine) -> Result<Vec<String>> {
    names_of_type(engine, "BASE TABLE")
}

pub fn views(engine: &dyn Engine) -> Result<Vec<String>> {
    names_of_type(engine, "VIEW")
}

/// Tables and views together, sorted.
pub fn data_sources(engine: &dyn Engine) -> Result<Vec<String>> {
    let mut all = tables(engine)?;
    all.extend(views(engine)?);
    all.sort();
    Ok(all)
}

pub fn table_exists(engine: &dyn Engine, name: &str) -> Result<bool> {
    let name = unquote_identifier(name);
    Ok(tables(engine)?.iter().any(|t| *t == name))
}

pub fn view_exists(engine: &dyn Engine, name: &str) -> Result<bool> {
    let name = unquote_identifier(name);
    Ok(views(engine)?.iter().any(|v| *v == name))
}

/// Column names from `duckdb_indexes().expressions`.
///
/// The value arrives as a list or as its text rendering: `[email]`,
/// `['email', 'name']` or `["email"]`.
pub fn parse_index_expressions(value: &Value) -> Vec<String> {
    match value {
        Value::List(items) => items
            .iter()
            .filter_map(Value::to_text)
            .map(|s| clean_expression(&s))
            .filter(|s| !s.is_empty())
            .collect(),
        Value::Null => Vec::new(),
        other => {
            let text = other.to_text().unwrap_or_default();
            let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
            inner
                .split(',')
                .map(clean_expression)
                .filter(|s| !s.is_empty())
                .collect()
        }
    }
}

fn clean_expression(expr: &str) -> String {
    let trimmed = expr.trim();
    let unquoted = trimmed
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(trimmed);
    unquote_identifier(unquoted)
}

/// Column list of a `CREATE INDEX ... (a, b)` statement.
fn columns_from_index_sql(sql: &str) -> Vec<String> {
    INDEX_COLUMNS_FROM_SQL
        .captures(sql)
        .map(|caps| {
            caps[1]
                .split(',')
                .map(clean_expression)
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Secondary indexes on `table`; primary key indexes are left out.
pub fn indexes(engine: &dyn Engine, table: &str) -> Result<Vec<IndexDefinition>> {
    let result = run(engine, INDEXES_SQL, &[Value::from(unquote_identifier(table))])?;
    let name_idx = result.column_index("index_name");
    let unique_idx = result.column_index("is_unique");
    let primary_idx = result.column_index("is_primary");
    let expressions_idx = result.column_index("expressions");
    let sql_idx = result.column_index("sql");

    let mut indexes = Vec::new();
    for row in &result.rows {
        if flag_at(row, primary_idx) {
            continue;
        }
        let Some(name) = text_at(row, name_idx) else {
            continue;
        };
        let mut columns = expressions_idx
            .and_then(|i| row.get(i))
            .map(parse_index_expressions)
            .unwrap_or_default();
        if columns.is_empty() {
            columns = text_at(row, sql_idx)
                .map(|sql| columns_from_index_sql(&sql))
                .unwrap_or_default();
        }
        indexes.push(IndexDefinition {
            name,
            table: table.to_string(),
            columns,
            unique: flag_at(row, unique_idx),
        });
    }
    Ok(indexes)
}

/// Sequence names in the current database.
pub fn sequences(engine: &dyn Engine) -> Result<Vec<String>> {
    let result = run(engine, SEQUENCES_SQL, &[])?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| row.first().and_then(Value::to_text))
        .collect())
}
