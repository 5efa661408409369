//! Declarative schema dump and replay.
//!
//! A dump captures every table in the current database: its primary key,
//! remaining columns, secondary indexes and, for DuckLake catalogs, partition
//! expressions and options. A single sequence-backed key is recorded by kind so
//! replay recreates its sequence; any other key is kept as a column list. Loading a dump replays it through the adapter's own
//! schema statements so sequences and DuckLake rules apply as usual.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::column::ColumnDescriptor;
use super::definition::{ColumnDefinition, CreateTableOptions, IdColumn, IndexDefinition};
use crate::adapter::DuckDbAdapter;
use crate::db::config::SettingValue;
use crate::db::{DbError, Result};
use crate::types::{LogicalType, PrimaryKeyKind};

/// Sequence-backed primary key of a dumped table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeyDump {
    pub name: String,
    pub kind: PrimaryKeyKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDump {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKeyDump>,
    /// Key columns replayed as a table-level `PRIMARY KEY (...)`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_keys: Vec<String>,
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partitioned_by: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaDump {
    pub tables: Vec<TableDump>,
    /// Global DuckLake options.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl SchemaDump {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DbError::configuration(format!("Failed to serialize schema: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| DbError::configuration(format!("Invalid schema dump: {}", e)))
    }

    pub fn table(&self, name: &str) -> Option<&TableDump> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// Kind a single sequence-backed key column is recreated with.
fn sequence_key_kind(column: &ColumnDescriptor) -> Option<PrimaryKeyKind> {
    if !column.auto_increment() || column.limit().is_some() {
        return None;
    }
    match column.logical_type() {
        LogicalType::Bigint => Some(PrimaryKeyKind::Bigint),
        LogicalType::Integer => Some(PrimaryKeyKind::Integer),
        _ => None,
    }
}

fn dump_table(adapter: &DuckDbAdapter, name: &str) -> Result<TableDump> {
    let mut columns = adapter.columns(name)?;
    let keys: Vec<&ColumnDescriptor> = columns.iter().filter(|c| c.primary_key).collect();

    let primary_key = match keys.as_slice() {
        [only] => sequence_key_kind(only).map(|kind| PrimaryKeyDump {
            name: only.name.clone(),
            kind,
        }),
        _ => None,
    };
    let primary_keys = match &primary_key {
        Some(_) => Vec::new(),
        None => keys.iter().map(|c| c.name.clone()).collect(),
    };
    if let Some(pk) = &primary_key {
        columns.retain(|c| c.name != pk.name);
    }

    let (indexes, partitioned_by, options) = if adapter.is_ducklake() {
        (Vec::new(), adapter.partitions(name)?, adapter.ducklake_options(Some(name))?)
    } else {
        (adapter.indexes(name)?, Vec::new(), BTreeMap::new())
    };

    Ok(TableDump {
        name: name.to_string(),
        primary_key,
        primary_keys,
        columns,
        indexes,
        partitioned_by,
        options,
    })
}

/// Introspect every table of the current database.
pub fn dump_schema(adapter: &DuckDbAdapter) -> Result<SchemaDump> {
    let tables = adapter
        .tables()?
        .iter()
        .map(|name| dump_table(adapter, name))
        .collect::<Result<Vec<_>>>()?;
    let options = if adapter.is_ducklake() {
        adapter.ducklake_options(None)?
    } else {
        BTreeMap::new()
    };
    debug!(tables = tables.len(), "schema dumped");
    Ok(SchemaDump { tables, options })
}

fn column_definition(column: &ColumnDescriptor) -> ColumnDefinition {
    let mut definition = ColumnDefinition::new(column.name.clone(), column.parsed.clone());
    definition.null = column.nullable;
    definition.default = column.default.clone();
    definition
}

/// Recreate every table of `dump` through the adapter.
pub fn load_schema(adapter: &DuckDbAdapter, dump: &SchemaDump) -> Result<()> {
    for (key, value) in &dump.options {
        adapter.set_option(key, &SettingValue::Text(value.clone()), None)?;
    }
    for table in &dump.tables {
        let options = match &table.primary_key {
            Some(pk) => CreateTableOptions::default()
                .with_id(IdColumn::Kind(pk.kind))
                .with_primary_key(pk.name.clone()),
            None => CreateTableOptions::default().with_id(IdColumn::None),
        };
        adapter.create_table(&table.name, options, |t| {
            for column in &table.columns {
                t.columns.push(column_definition(column));
            }
            if !table.primary_keys.is_empty() {
                let keys: Vec<&str> = table.primary_keys.iter().map(String::as_str).collect();
                t.primary_key_columns(&keys);
            }
        })?;
        if !adapter.is_ducklake() {
            for index in &table.indexes {
                adapter.add_index(index)?;
            }
        }
        if !table.partitioned_by.is_empty() {
            adapter.set_partitioned_by(&table.name, &table.partitioned_by)?;
        }
        for (key, value) in &table.options {
            adapter.set_option(key, &SettingValue::Text(value.clone()), Some(&table.name))?;
        }
    }
    debug!(tables = dump.tables.len(), "schema loaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ConnectionConfig, Value};
    use crate::schema::column::ColumnDefault;
    use crate::test_utils::RecordingEngine;
    use rstest::rstest;

    fn sample_dump() -> SchemaDump {
        SchemaDump {
            tables: vec![TableDump {
                name: "users".into(),
                primary_key: Some(PrimaryKeyDump {
                    name: "id".into(),
                    kind: PrimaryKeyKind::Bigint,
                }),
                primary_keys: vec![],
                columns: vec![
                    ColumnDescriptor::new("email", "VARCHAR").with_nullable(false),
                    ColumnDescriptor::new("active", "BOOLEAN")
                        .with_default(ColumnDefault::Literal(Value::from("true"))),
                ],
                indexes: vec![IndexDefinition::new("users", &["email"]).unique()],
                partitioned_by: vec![],
                options: BTreeMap::new(),
            }],
            options: BTreeMap::new(),
        }
    }

    #[rstest]
    fn test_json_round_trip() {
        let dump = sample_dump();
        let json = dump.to_json().unwrap();
        assert!(json.contains("\"kind\": \"bigint\""));
        assert_eq!(SchemaDump::from_json(&json).unwrap(), dump);
    }

    #[rstest]
    fn test_invalid_json_is_a_configuration_error() {
        assert!(matches!(SchemaDump::from_json("[]"), Err(DbError::Configuration { .. })));
    }

    #[rstest]
    fn test_load_replays_through_create_table() {
        let engine = RecordingEngine::new();
        let mut adapter = DuckDbAdapter::new(ConnectionConfig::memory(), engine.clone());
        adapter.connect().unwrap();
        engine.clear();

        load_schema(&adapter, &sample_dump()).unwrap();
        let statements = engine.statements();
        assert!(statements.contains(&r#"CREATE SEQUENCE "users_id_seq" START WITH 1"#.to_string()));
        assert!(statements.contains(
            &r#"CREATE TABLE "users" ("id" BIGINT DEFAULT nextval('users_id_seq') PRIMARY KEY, "email" VARCHAR NOT NULL, "active" BOOLEAN DEFAULT 'true')"#
                .to_string()
        ));
        assert_eq!(
            statements.last().unwrap(),
            r#"CREATE UNIQUE INDEX IF NOT EXISTS "index_users_on_email" ON "users" ("email")"#
        );
    }

    #[rstest]
    fn test_dump_separates_primary_key() {
        let engine = RecordingEngine::new();
        engine.respond_rows("information_schema.tables", &["table_name"], vec![vec![Value::from("users")]]);
        engine.respond_rows(
            "pragma_table_info('users')",
            &["cid", "name", "type", "notnull", "dflt_value", "pk"],
            vec![
                vec![
                    Value::Int(0),
                    Value::from("id"),
                    Value::from("BIGINT"),
                    Value::Bool(true),
                    Value::from("nextval('users_id_seq')"),
                    Value::Bool(true),
                ],
                vec![
                    Value::Int(1),
                    Value::from("email"),
                    Value::from("VARCHAR"),
                    Value::Bool(false),
                    Value::Null,
                    Value::Bool(false),
                ],
            ],
        );
        let mut adapter = DuckDbAdapter::new(ConnectionConfig::memory(), engine.clone());
        adapter.connect().unwrap();

        let dump = dump_schema(&adapter).unwrap();
        let users = dump.table("users").unwrap();
        assert_eq!(
            users.primary_key,
            Some(PrimaryKeyDump {
                name: "id".into(),
                kind: PrimaryKeyKind::Bigint
            })
        );
        assert_eq!(users.columns.len(), 1);
        assert_eq!(users.columns[0].name, "email");
    }

    fn pragma_row(cid: i64, name: &str, sql_type: &str, default: Value, pk: bool) -> Vec<Value> {
        vec![
            Value::Int(cid),
            Value::from(name),
            Value::from(sql_type),
            Value::Bool(pk),
            default,
            Value::Bool(pk),
        ]
    }

    fn adapter_over(table: &str, rows: Vec<Vec<Value>>) -> (RecordingEngine, DuckDbAdapter) {
        let engine = RecordingEngine::new();
        engine.respond_rows("information_schema.tables", &["table_name"], vec![vec![Value::from(table)]]);
        engine.respond_rows(
            &format!("pragma_table_info('{}')", table),
            &["cid", "name", "type", "notnull", "dflt_value", "pk"],
            rows,
        );
        let mut adapter = DuckDbAdapter::new(ConnectionConfig::memory(), engine.clone());
        adapter.connect().unwrap();
        (engine, adapter)
    }

    #[rstest]
    fn test_composite_key_survives_dump_and_load() {
        let (_, source) = adapter_over(
            "pairs",
            vec![
                pragma_row(0, "a", "INTEGER", Value::Null, true),
                pragma_row(1, "b", "INTEGER", Value::Null, true),
            ],
        );
        let dump = dump_schema(&source).unwrap();
        let pairs = dump.table("pairs").unwrap();
        assert_eq!(pairs.primary_key, None);
        assert_eq!(pairs.primary_keys, vec!["a", "b"]);
        assert_eq!(pairs.columns.len(), 2);

        let engine = RecordingEngine::new();
        let mut target = DuckDbAdapter::new(ConnectionConfig::memory(), engine.clone());
        target.connect().unwrap();
        engine.clear();
        load_schema(&target, &dump).unwrap();
        assert_eq!(
            engine.statements(),
            vec![r#"CREATE TABLE "pairs" ("a" INTEGER NOT NULL, "b" INTEGER NOT NULL, PRIMARY KEY ("a", "b"))"#]
        );
    }

    #[rstest]
    #[case("SMALLINT", Value::Null)]
    #[case("INTEGER", Value::Null)]
    #[case("UUID", Value::from("gen_random_uuid()"))]
    fn test_single_key_without_sequence_is_kept_as_column(#[case] sql_type: &str, #[case] default: Value) {
        let (_, adapter) = adapter_over("codes", vec![pragma_row(0, "code", sql_type, default, true)]);
        let dump = dump_schema(&adapter).unwrap();
        let codes = dump.table("codes").unwrap();
        assert_eq!(codes.primary_key, None);
        assert_eq!(codes.primary_keys, vec!["code"]);
        assert_eq!(codes.columns[0].name, "code");
    }
}
