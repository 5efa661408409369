//! Sequence-backed primary keys.
//!
//! DuckDB has no auto-increment columns. Integer primary keys get a
//! `{table}_{pk}_seq` sequence and a `DEFAULT nextval(...)` on the key column.
//! The default is attached while the column is constructed; a pending
//! injection additionally lets the execute path rewrite the outgoing
//! `CREATE TABLE` text when the default is missing.

use std::borrow::Cow;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::{Engine, Result, Value};
use crate::quoting::{quote_string, quote_table_name, split_qualified_name};

const SEQUENCE_LOOKUP: &str = "SELECT sequence_name FROM duckdb_sequences() \
     WHERE sequence_name = ? AND database_name = current_database() AND schema_name = current_schema()";

static NEXTVAL_ARGUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)nextval\(\s*'((?:[^']|'')+)'").expect("valid nextval argument regex")
});

static CREATE_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?(?:TEMP(?:ORARY)?\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?((?:"(?:[^"]|"")+"|[\w$]+)(?:\.(?:"(?:[^"]|"")+"|[\w$]+))*)"#,
    )
    .expect("valid CREATE TABLE regex")
});

/// How the sequence default reaches the primary key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceInjection {
    /// Attach the default while building the column definition.
    #[default]
    Construction,
    /// Leave the column bare and rewrite the `CREATE TABLE` text on its way out.
    Rewrite,
}

/// Sequence default waiting for its `CREATE TABLE` to pass through execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSequenceInjection {
    pub table_name: String,
    pub pk_column_name: String,
    pub sequence_name: String,
}

impl PendingSequenceInjection {
    pub fn new(table_name: &str, pk_column_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            pk_column_name: pk_column_name.to_string(),
            sequence_name: sequence_name(table_name, pk_column_name),
        }
    }
}

/// `{table}_{pk}_seq`, using the unqualified table name.
pub fn sequence_name(table: &str, pk_column: &str) -> String {
    let table = split_qualified_name(table).pop().unwrap_or_default();
    format!("{}_{}_seq", table, pk_column)
}

pub fn nextval_expression(sequence: &str) -> String {
    format!("nextval({})", quote_string(sequence))
}

pub fn drop_sequence_sql(sequence: &str) -> String {
    format!("DROP SEQUENCE IF EXISTS {}", quote_table_name(sequence))
}

/// Slot holding the at-most-one pending injection of an adapter.
#[derive(Debug, Default)]
pub struct PendingSlot(Mutex<Option<PendingSequenceInjection>>);

impl PendingSlot {
    fn lock(&self) -> MutexGuard<'_, Option<PendingSequenceInjection>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install `pending` until the returned guard drops.
    pub fn arm(&self, pending: PendingSequenceInjection) -> PendingGuard<'_> {
        *self.lock() = Some(pending);
        PendingGuard { slot: self }
    }

    pub fn current(&self) -> Option<PendingSequenceInjection> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }
}

/// Clears the pending slot when table creation ends, successfully or not.
#[must_use = "the pending injection is cleared as soon as the guard drops"]
pub struct PendingGuard<'a> {
    slot: &'a PendingSlot,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

/// True if `sql` creates exactly the table named by `table`.
pub fn is_create_table_for(sql: &str, table: &str) -> bool {
    let Some(caps) = CREATE_TABLE.captures(sql) else {
        return false;
    };
    let created = split_qualified_name(&caps[1]).pop().unwrap_or_default();
    let wanted = split_qualified_name(table).pop().unwrap_or_default();
    created == wanted
}

fn primary_key_pattern(column: &str) -> Result<Regex> {
    let quoted = regex::escape(&format!("\"{}\"", column.replace('"', "\"\"")));
    let bare = regex::escape(column);
    let pattern = format!(
        r"(?i)(^|[\s(,])({quoted}|{bare})(\s+[A-Za-z_][A-Za-z0-9_]*(?:\s*\([^)]*\))?)\s+(PRIMARY\s+KEY)"
    );
    Regex::new(&pattern).map_err(|e| crate::db::DbError::configuration(e.to_string()))
}

/// Insert `DEFAULT nextval('<seq>')` before the pending column's `PRIMARY KEY`.
///
/// Only the first `<column> <type> PRIMARY KEY` for the exact column name is
/// touched. Returns `None` when nothing matched, including when the column
/// already carries a default.
pub fn rewrite_primary_key(sql: &str, pending: &PendingSequenceInjection) -> Result<Option<String>> {
    let pattern = primary_key_pattern(&pending.pk_column_name)?;
    if !pattern.is_match(sql) {
        return Ok(None);
    }
    let default = nextval_expression(&pending.sequence_name);
    let rewritten = pattern.replacen(sql, 1, |caps: &Captures| {
        format!("{}{}{} DEFAULT {} {}", &caps[1], &caps[2], &caps[3], default, &caps[4])
    });
    Ok(Some(rewritten.into_owned()))
}

/// Apply the pending injection to `sql` if it is the awaited `CREATE TABLE`.
pub fn intercept<'a>(sql: &'a str, pending: Option<&PendingSequenceInjection>) -> Result<Cow<'a, str>> {
    let Some(pending) = pending else {
        return Ok(Cow::Borrowed(sql));
    };
    if !is_create_table_for(sql, &pending.table_name) {
        return Ok(Cow::Borrowed(sql));
    }
    match rewrite_primary_key(sql, pending)? {
        Some(rewritten) => {
            debug!(table = %pending.table_name, sequence = %pending.sequence_name, "injected sequence default");
            Ok(Cow::Owned(rewritten))
        }
        None => Ok(Cow::Borrowed(sql)),
    }
}

/// Look the sequence up in the catalog of the current schema.
///
/// Never calls `nextval`: DuckDB keeps sequence increments even when the
/// surrounding transaction rolls back.
pub fn sequence_exists(engine: &dyn Engine, sequence: &str) -> Result<bool> {
    let result = engine.query(SEQUENCE_LOOKUP, &[Value::from(sequence)])?;
    Ok(!result.rows.is_empty())
}

/// Create the sequence unless it already exists.
pub fn ensure_sequence(engine: &dyn Engine, sequence: &str, start_with: i64) -> Result<()> {
    if sequence_exists(engine, sequence)? {
        debug!(sequence, "sequence already present");
        return Ok(());
    }
    let sql = format!("CREATE SEQUENCE {} START WITH {}", quote_table_name(sequence), start_with);
    match engine.query(&sql, &[]) {
        Ok(_) => {
            debug!(sequence, start_with, "created sequence");
            Ok(())
        }
        Err(e) if e.is_already_exists() => {
            debug!(sequence, error = %e, "sequence created concurrently");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Sequence named by a `nextval('<seq>')` default, unquoted.
pub fn sequence_from_default(expr: &str) -> Option<String> {
    let caps = NEXTVAL_ARGUMENT.captures(expr)?;
    let name = caps[1].replace("''", "'");
    split_qualified_name(&name).pop()
}
