//! DuckLake catalog metadata.
//!
//! An attached DuckLake database keeps its catalog in a schema named
//! `__ducklake_metadata_<database>`. The name is derived from the active
//! database on every call because `USE` can switch it at any time.

use std::collections::BTreeMap;

use tracing::debug;

use crate::db::config::SettingValue;
use crate::db::execution::into_result_set;
use crate::db::{Engine, Result, Value};
use crate::quoting::{quote_column_name, quote_string, quote_table_name};

pub const METADATA_SCHEMA_PREFIX: &str = "__ducklake_metadata_";

pub fn metadata_schema(database: &str) -> String {
    format!("{}{}", METADATA_SCHEMA_PREFIX, database)
}

pub fn current_database(engine: &dyn Engine) -> Result<String> {
    let result = into_result_set(engine.query("SELECT current_database()", &[])?);
    Ok(result.first_value().and_then(Value::to_text).unwrap_or_default())
}

/// Partition transform as stored in `ducklake_partition_column.transform`.
pub fn partition_expression(column: &str, transform: &str) -> String {
    match transform.trim().to_ascii_lowercase().as_str() {
        "" | "identity" => column.to_string(),
        other => format!("{}({})", other, column),
    }
}

/// Missing catalogs and unloaded extensions read as "nothing there".
fn or_empty<T: Default>(result: Result<T>, what: &str) -> Result<T> {
    match result {
        Err(e) if e.is_expected_absence() => {
            debug!(what, error = %e, "DuckLake metadata unavailable");
            Ok(T::default())
        }
        other => other,
    }
}

/// Active partition expressions of `table`, in key order.
pub fn partitions(engine: &dyn Engine, table: &str) -> Result<Vec<String>> {
    or_empty(read_partitions(engine, table), "partitions")
}

fn read_partitions(engine: &dyn Engine, table: &str) -> Result<Vec<String>> {
    let schema = quote_column_name(&metadata_schema(&current_database(engine)?));
    let sql = format!(
        "SELECT c.column_name, pc.transform \
         FROM {schema}.ducklake_table t \
         JOIN {schema}.ducklake_partition_info pi ON pi.table_id = t.table_id AND pi.end_snapshot IS NULL \
         JOIN {schema}.ducklake_partition_column pc ON pc.partition_id = pi.partition_id AND pc.table_id = t.table_id \
         JOIN {schema}.ducklake_column c ON c.column_id = pc.column_id AND c.table_id = t.table_id AND c.end_snapshot IS NULL \
         WHERE t.table_name = ? AND t.end_snapshot IS NULL \
         ORDER BY pc.partition_key_index"
    );
    let rows = into_result_set(engine.query(&sql, &[Value::from(table)])?).rows;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let column = row.first().and_then(Value::to_text)?;
            let transform = row.get(1).and_then(Value::to_text).unwrap_or_default();
            Some(partition_expression(&column, &transform))
        })
        .collect())
}

/// Global options, or the options scoped to `table`.
pub fn options(engine: &dyn Engine, table: Option<&str>) -> Result<BTreeMap<String, String>> {
    or_empty(read_options(engine, table), "options")
}

fn read_options(engine: &dyn Engine, table: Option<&str>) -> Result<BTreeMap<String, String>> {
    let schema = quote_column_name(&metadata_schema(&current_database(engine)?));
    let (sql, binds) = match table {
        None => (
            format!("SELECT key, value FROM {schema}.ducklake_metadata WHERE scope IS NULL ORDER BY key"),
            vec![],
        ),
        Some(table) => (
            format!(
                "SELECT m.key, m.value FROM {schema}.ducklake_metadata m \
                 JOIN {schema}.ducklake_table t ON m.scope_id = t.table_id AND t.end_snapshot IS NULL \
                 WHERE m.scope = 'table' AND t.table_name = ? ORDER BY m.key"
            ),
            vec![Value::from(table)],
        ),
    };
    let rows = into_result_set(engine.query(&sql, &binds)?).rows;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let key = row.first().and_then(Value::to_text)?;
            let value = row.get(1).and_then(Value::to_text).unwrap_or_default();
            Some((key, value))
        })
        .collect())
}

/// `CALL "<db>".set_option('key', value[, table_name => 'table'])`
pub fn set_option_sql(database: &str, key: &str, value: &SettingValue, table: Option<&str>) -> String {
    let mut args = vec![quote_string(key), value.to_sql()];
    if let Some(table) = table {
        args.push(format!("table_name => {}", quote_string(table)));
    }
    format!("CALL {}.set_option({})", quote_column_name(database), args.join(", "))
}

/// `ALTER TABLE ... SET PARTITIONED BY (...)`, or `RESET` for no expressions.
pub fn set_partitioned_by_sql(table: &str, expressions: &[String]) -> String {
    if expressions.is_empty() {
        format!("ALTER TABLE {} RESET PARTITIONED BY", quote_table_name(table))
    } else {
        format!(
            "ALTER TABLE {} SET PARTITIONED BY ({})",
            quote_table_name(table),
            expressions.join(", ")
        )
    }
}
