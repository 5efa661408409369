//! Query execution shim.
//!
//! Host framework generations disagree on how a statement is run and how its
//! changed-row count is obtained. Each generation is one `ExecutionContract`
//! strategy; the adapter picks one at startup through [`HostGeneration`].

use std::sync::LazyLock;

use enum_dispatch::enum_dispatch;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{Engine, RawColumn, RawResult, Result, ResultSet, Value};

/// Name of the single column DuckDB returns for DML run as a query.
pub const COUNT_COLUMN: &str = "Count";

static WRITE_STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(INSERT|UPDATE|DELETE)\b").expect("valid write statement regex")
});

static RETURNING_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bRETURNING\b").expect("valid returning regex"));

/// DML without a `RETURNING` clause.
pub fn is_write_statement(sql: &str) -> bool {
    WRITE_STATEMENT.is_match(sql) && !RETURNING_CLAUSE.is_match(sql)
}

/// Host framework generation the adapter plugs into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostGeneration {
    /// Newer hosts override the query hook and read the driver's changed-rows counter.
    #[default]
    QueryOverride,
    /// Older hosts run everything through raw execution and read a `Count` row.
    RawExecute,
}

/// How a statement is run and its result shaped for the host framework.
#[enum_dispatch]
pub trait ExecutionContract {
    fn run(&self, engine: &dyn Engine, sql: &str, binds: &[Value]) -> Result<ResultSet>;

    fn generation(&self) -> HostGeneration;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOverride;

#[derive(Debug, Clone, Copy, Default)]
pub struct RawExecute;

/// Strategy selected for the adapter's lifetime.
#[enum_dispatch(ExecutionContract)]
#[derive(Debug, Clone, Copy)]
pub enum Execution {
    QueryOverride,
    RawExecute,
}

impl From<HostGeneration> for Execution {
    fn from(generation: HostGeneration) -> Self {
        match generation {
            HostGeneration::QueryOverride => QueryOverride.into(),
            HostGeneration::RawExecute => RawExecute.into(),
        }
    }
}

impl Default for Execution {
    fn default() -> Self {
        HostGeneration::default().into()
    }
}

impl ExecutionContract for QueryOverride {
    fn run(&self, engine: &dyn Engine, sql: &str, binds: &[Value]) -> Result<ResultSet> {
        trace!(sql, binds = binds.len(), "query override");
        if is_write_statement(sql) {
            let changed = engine.execute(sql, binds)?;
            return Ok(ResultSet {
                affected_rows: Some(changed),
                ..ResultSet::default()
            });
        }
        Ok(into_result_set(engine.query(sql, binds)?))
    }

    fn generation(&self) -> HostGeneration {
        HostGeneration::QueryOverride
    }
}

impl ExecutionContract for RawExecute {
    fn run(&self, engine: &dyn Engine, sql: &str, binds: &[Value]) -> Result<ResultSet> {
        trace!(sql, binds = binds.len(), "raw execute");
        Ok(into_result_set(engine.query(sql, binds)?))
    }

    fn generation(&self) -> HostGeneration {
        HostGeneration::RawExecute
    }
}

/// Header as a plain string; unnamed columns get a positional name.
pub fn column_name(index: usize, column: &RawColumn) -> String {
    let name = match column {
        RawColumn::Name(name) => Some(name.as_str()),
        RawColumn::Described(description) => description.name.as_deref(),
    };
    name.map(str::to_string)
        .unwrap_or_else(|| format!("column_{}", index))
}

pub fn into_result_set(raw: RawResult) -> ResultSet {
    ResultSet {
        columns: raw
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| column_name(i, c))
            .collect(),
        rows: raw.rows,
        affected_rows: None,
    }
}

/// Changed rows of a DML result, from the driver counter or the `Count` row.
pub fn affected_row_count(result: &ResultSet) -> u64 {
    if let Some(changed) = result.affected_rows {
        return changed;
    }
    match result.columns.as_slice() {
        [only] if only == COUNT_COLUMN => result
            .first_value()
            .and_then(Value::as_i64)
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0),
        _ => 0,
    }
}
