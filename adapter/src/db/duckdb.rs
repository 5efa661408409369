//! DuckDB backend implementation.
//!
//! Wraps a single `duckdb::Connection` behind a mutex. Cells are converted to
//! the adapter's [`Value`]; timestamps go through the injected `TimeConverter`.

use std::sync::{Arc, Mutex, MutexGuard};

use ::duckdb::types::{TimeUnit, Value as DuckValue};
use ::duckdb::{params_from_iter, Connection};
use chrono::NaiveDate;

use super::config::ConnectionConfig;
use super::time::{Time, TimeConverter, TimeParts, TimeZonePolicy};
use super::{ColumnDescription, Connector, DbError, Engine, RawColumn, RawResult, Result, Value};
use crate::interval::Interval;

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_CE_DAYS: i32 = 719_163;

/// DuckDB connection wrapper.
pub struct DuckDbEngine {
    conn: Mutex<Connection>,
    time_converter: Arc<dyn TimeConverter>,
}

impl DuckDbEngine {
    pub fn new(conn: Connection, time_converter: Arc<dyn TimeConverter>) -> Self {
        Self {
            conn: Mutex::new(conn),
            time_converter,
        }
    }

    /// Open a database file, or an in-memory database for `:memory:`.
    pub fn open(path: &str, time_converter: Arc<dyn TimeConverter>) -> Result<Self> {
        let conn = if path == super::config::MEMORY_DATABASE {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| DbError::OpenFailed {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::new(conn, time_converter))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DbError::configuration("DuckDB connection mutex poisoned"))
    }

    fn convert_value(&self, value: DuckValue) -> Value {
        match value {
            DuckValue::Null => Value::Null,
            DuckValue::Boolean(b) => Value::Bool(b),
            DuckValue::TinyInt(v) => Value::Int(i64::from(v)),
            DuckValue::SmallInt(v) => Value::Int(i64::from(v)),
            DuckValue::Int(v) => Value::Int(i64::from(v)),
            DuckValue::BigInt(v) => Value::Int(v),
            DuckValue::HugeInt(v) => Value::HugeInt(v),
            DuckValue::UHugeInt(v) => i128::try_from(v).map_or_else(|_| Value::Text(v.to_string()), Value::HugeInt),
            DuckValue::UTinyInt(v) => Value::Int(i64::from(v)),
            DuckValue::USmallInt(v) => Value::Int(i64::from(v)),
            DuckValue::UInt(v) => Value::Int(i64::from(v)),
            DuckValue::UBigInt(v) => Value::UInt(v),
            DuckValue::Float(v) => Value::Float(f64::from(v)),
            DuckValue::Double(v) => Value::Float(v),
            // Kept as text so no precision is lost
            DuckValue::Decimal(d) => Value::Text(d.to_string()),
            DuckValue::Text(s) | DuckValue::Enum(s) => Value::Text(s),
            DuckValue::Blob(b) | DuckValue::Geometry(b) => Value::Blob(b),
            DuckValue::Date32(days) => NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_CE_DAYS)
                .map_or(Value::Null, Value::Date),
            DuckValue::Timestamp(unit, count) => {
                let parts = match unit {
                    TimeUnit::Second => TimeParts::Seconds(count),
                    TimeUnit::Millisecond => TimeParts::Millis(count),
                    TimeUnit::Microsecond => TimeParts::Micros(count),
                    TimeUnit::Nanosecond => TimeParts::Nanos(count),
                };
                self.convert_time(parts)
            }
            DuckValue::Time64(unit, count) => {
                let micros = match unit {
                    TimeUnit::Second => count.saturating_mul(1_000_000),
                    TimeUnit::Millisecond => count.saturating_mul(1_000),
                    TimeUnit::Microsecond => count,
                    TimeUnit::Nanosecond => count / 1_000,
                };
                self.convert_time(TimeParts::TimeOfDay(micros))
            }
            DuckValue::Interval { months, days, nanos } => {
                Value::Interval(Interval::new(months, days, nanos / 1_000))
            }
            DuckValue::List(items) | DuckValue::Array(items) => {
                Value::List(items.into_iter().map(|v| self.convert_value(v)).collect())
            }
            DuckValue::Struct(fields) => self.nested_json(
                fields
                    .iter()
                    .map(|(name, v)| (name.clone(), self.convert_value(v.clone())))
                    .collect(),
            ),
            DuckValue::Map(entries) => self.nested_json(
                entries
                    .iter()
                    .map(|(k, v)| {
                        let key = self.convert_value(k.clone()).to_text().unwrap_or_else(|| "null".into());
                        (key, self.convert_value(v.clone()))
                    })
                    .collect(),
            ),
            DuckValue::Union(inner) => self.convert_value(*inner),
            other => {
                tracing::warn!(?other, "unhandled DuckDB value");
                Value::Text(format!("{other:?}"))
            }
        }
    }

    /// STRUCT and MAP cells come back as JSON object text, in engine order.
    fn nested_json(&self, entries: Vec<(String, Value)>) -> Value {
        match serde_json::to_string(&JsonObject(entries)) {
            Ok(json) => Value::Text(json),
            Err(e) => {
                tracing::warn!(error = %e, "could not render nested value as JSON");
                Value::Null
            }
        }
    }

    fn convert_time(&self, parts: TimeParts) -> Value {
        match self.time_converter.to_time(parts) {
            Some(Time::Timestamp(ts)) => Value::Timestamp(ts),
            Some(Time::TimeOfDay(t)) => Value::Time(t),
            None => Value::Null,
        }
    }
}

struct JsonObject(Vec<(String, Value)>);

impl serde::Serialize for JsonObject {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

fn to_duck(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Bool(b) => DuckValue::Boolean(*b),
        Value::Int(i) => DuckValue::BigInt(*i),
        Value::UInt(u) => DuckValue::UBigInt(*u),
        Value::HugeInt(h) => DuckValue::HugeInt(*h),
        Value::Float(f) => DuckValue::Double(*f),
        Value::Text(s) => DuckValue::Text(s.clone()),
        Value::Blob(b) => DuckValue::Blob(b.clone()),
        Value::Date(d) => DuckValue::Text(d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => DuckValue::Text(t.format("%H:%M:%S%.f").to_string()),
        Value::Timestamp(ts) => DuckValue::Text(ts.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string()),
        Value::Interval(i) => DuckValue::Interval {
            months: i.months,
            days: i.days,
            nanos: i.micros.saturating_mul(1_000),
        },
        Value::List(_) => DuckValue::Text(value.to_text().unwrap_or_default()),
    }
}

impl Engine for DuckDbEngine {
    fn query(&self, sql: &str, binds: &[Value]) -> Result<RawResult> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DbError::statement_invalid(sql, e.to_string()))?;
        let params: Vec<DuckValue> = binds.iter().map(to_duck).collect();

        // Column names are only available once the statement has run.
        let raw_rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let count = row.as_ref().column_count();
                (0..count)
                    .map(|i| row.get::<_, DuckValue>(i))
                    .collect::<std::result::Result<Vec<_>, _>>()
            })
            .map_err(|e| DbError::statement_invalid(sql, e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DbError::statement_invalid(sql, e.to_string()))?;

        let columns = (0..stmt.column_count())
            .map(|i| match stmt.column_name(i) {
                Ok(name) => RawColumn::Name(name.to_string()),
                Err(_) => RawColumn::Described(ColumnDescription {
                    name: None,
                    type_name: None,
                }),
            })
            .collect();
        let rows = raw_rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| self.convert_value(v)).collect())
            .collect();
        Ok(RawResult { columns, rows })
    }

    fn execute(&self, sql: &str, binds: &[Value]) -> Result<u64> {
        let conn = self.lock()?;
        let params: Vec<DuckValue> = binds.iter().map(to_duck).collect();
        let changed = conn
            .execute(sql, params_from_iter(params.iter()))
            .map_err(|e| DbError::statement_invalid(sql, e.to_string()))?;
        Ok(changed as u64)
    }

    fn backend_name(&self) -> &'static str {
        "DuckDB"
    }
}

/// Opens [`DuckDbEngine`] connections with a fixed time zone policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDbConnector {
    pub time_zone: TimeZonePolicy,
}

impl DuckDbConnector {
    pub fn new(time_zone: TimeZonePolicy) -> Self {
        Self { time_zone }
    }
}

impl Connector for DuckDbConnector {
    fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn Engine>> {
        let engine = DuckDbEngine::open(config.database()?, self.time_zone.converter())?;
        Ok(Box::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn engine() -> DuckDbEngine {
        DuckDbEngine::open(":memory:", TimeZonePolicy::Utc.converter()).expect("Failed to open in-memory DB")
    }

    #[rstest]
    fn test_select_literal(engine: DuckDbEngine) {
        let result = engine.query("SELECT 42 AS answer, 'x' AS label", &[]).unwrap();
        assert_eq!(
            result.columns,
            vec![RawColumn::Name("answer".into()), RawColumn::Name("label".into())]
        );
        assert_eq!(result.rows, vec![vec![Value::Int(42), Value::Text("x".into())]]);
    }

    #[rstest]
    fn test_positional_binds(engine: DuckDbEngine) {
        let result = engine
            .query("SELECT ? + 1, ?", &[Value::Int(1), Value::from("bound")])
            .unwrap();
        assert_eq!(result.rows[0], vec![Value::Int(2), Value::Text("bound".into())]);
    }

    #[rstest]
    fn test_execute_reports_changed_rows(engine: DuckDbEngine) {
        engine.execute("CREATE TABLE t (a INTEGER)", &[]).unwrap();
        let changed = engine.execute("INSERT INTO t VALUES (1), (2), (3)", &[]).unwrap();
        assert_eq!(changed, 3);
    }

    #[rstest]
    fn test_dml_as_query_returns_count_row(engine: DuckDbEngine) {
        engine.execute("CREATE TABLE t (a INTEGER)", &[]).unwrap();
        let result = engine.query("INSERT INTO t VALUES (1), (2)", &[]).unwrap();
        assert_eq!(result.columns, vec![RawColumn::Name("Count".into())]);
        assert_eq!(result.rows[0][0].as_i64(), Some(2));
    }

    #[rstest]
    fn test_temporal_values(engine: DuckDbEngine) {
        let result = engine
            .query(
                "SELECT DATE '2024-02-29', TIMESTAMP '2024-02-29 12:30:00', INTERVAL '2 hours 30 minutes'",
                &[],
            )
            .unwrap();
        let row = &result.rows[0];
        assert_eq!(row[0], Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        match &row[1] {
            Value::Timestamp(ts) => assert_eq!(ts.to_rfc3339(), "2024-02-29T12:30:00+00:00"),
            other => panic!("Expected timestamp, got {:?}", other),
        }
        match &row[2] {
            Value::Interval(i) => assert_eq!(i.to_duration().total_seconds(), 9000.0),
            other => panic!("Expected interval, got {:?}", other),
        }
    }

    #[rstest]
    fn test_struct_and_map_cells_are_json(engine: DuckDbEngine) {
        let result = engine
            .query("SELECT {'b': 1, 'a': 'x', 'n': [1, 2]}, MAP {'k': 1, 'j': NULL}", &[])
            .unwrap();
        let row = &result.rows[0];
        let Value::Text(text) = &row[0] else {
            panic!("Expected JSON text, got {:?}", row[0]);
        };
        assert_eq!(text, r#"{"b":1,"a":"x","n":[1,2]}"#);
        let parsed: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["n"], serde_json::json!([1, 2]));

        let Value::Text(text) = &row[1] else {
            panic!("Expected JSON text, got {:?}", row[1]);
        };
        let parsed: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed, serde_json::json!({ "k": 1, "j": null }));
    }

    #[rstest]
    fn test_end_of_day_time_is_kept(engine: DuckDbEngine) {
        let result = engine.query("SELECT TIME '24:00:00'", &[]).unwrap();
        match &result.rows[0][0] {
            Value::Time(t) => assert_eq!(t.format("%H:%M:%S%.6f").to_string(), "23:59:59.999999"),
            other => panic!("Expected time, got {:?}", other),
        }
    }

    #[rstest]
    fn test_malformed_sql_is_statement_invalid(engine: DuckDbEngine) {
        let err = engine.query("SELEC 1", &[]).unwrap_err();
        assert!(matches!(err, DbError::StatementInvalid { .. }));
    }

    #[rstest]
    fn test_open_failure_reports_path() {
        let err = DuckDbEngine::open("/nonexistent/dir/db.duckdb", TimeZonePolicy::Utc.converter())
            .err()
            .expect("open should fail");
        assert!(matches!(err, DbError::OpenFailed { path, .. } if path.contains("nonexistent")));
    }
}
