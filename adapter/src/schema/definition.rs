//! Table definition DSL.
//!
//! A `TableDefinition` is filled in by the caller's callback during
//! `create_table` and rendered to a single `CREATE TABLE` statement. Index
//! definitions are rendered separately since DuckDB creates indexes with their
//! own statements.

use serde::{Deserialize, Serialize};

use super::column::ColumnDefault;
use crate::db::{DbError, Result, Value};
use crate::quoting::{quote_column_name, quote_string, quote_table_name, quote_value};
use crate::types::{LogicalType, PrimaryKeyKind, SqlType};

/// Primary key requested for a new table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdColumn {
    /// Use the adapter's configured primary key kind.
    #[default]
    Default,
    Kind(PrimaryKeyKind),
    /// No primary key column.
    None,
}

impl IdColumn {
    /// Resolve against the adapter-wide default.
    pub fn resolve(self, default: PrimaryKeyKind) -> Option<PrimaryKeyKind> {
        match self {
            IdColumn::Default => Some(default),
            IdColumn::Kind(kind) => Some(kind),
            IdColumn::None => None,
        }
    }
}

/// Options accepted by `create_table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateTableOptions {
    pub id: IdColumn,
    /// Primary key column name.
    pub primary_key: String,
    /// First value handed out by the primary key sequence.
    pub start_with: i64,
    pub if_not_exists: bool,
    pub temporary: bool,
}

impl Default for CreateTableOptions {
    fn default() -> Self {
        Self {
            id: IdColumn::Default,
            primary_key: "id".to_string(),
            start_with: 1,
            if_not_exists: false,
            temporary: false,
        }
    }
}

impl CreateTableOptions {
    pub fn with_id(mut self, id: IdColumn) -> Self {
        self.id = id;
        self
    }

    pub fn with_primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = name.into();
        self
    }

    pub fn with_start_with(mut self, start_with: i64) -> Self {
        self.start_with = start_with;
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }
}

/// One non-primary-key column of a new table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub sql_type: SqlType,
    #[serde(default = "default_null")]
    pub null: bool,
    #[serde(default, skip_serializing_if = "ColumnDefault::is_none")]
    pub default: ColumnDefault,
}

fn default_null() -> bool {
    true
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            null: true,
            default: ColumnDefault::None,
        }
    }

    pub fn null(&mut self, null: bool) -> &mut Self {
        self.null = null;
        self
    }

    pub fn default_value(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = ColumnDefault::Literal(value.into());
        self
    }

    pub fn default_function(&mut self, expr: impl Into<String>) -> &mut Self {
        self.default = ColumnDefault::Function(expr.into());
        self
    }

    pub fn limit(&mut self, limit: u32) -> &mut Self {
        self.sql_type.limit = Some(limit);
        self
    }

    pub fn precision(&mut self, precision: u32) -> &mut Self {
        self.sql_type.precision = Some(precision);
        self
    }

    pub fn scale(&mut self, scale: u32) -> &mut Self {
        self.sql_type.scale = Some(scale);
        self
    }

    /// `"name" TYPE [NOT NULL] [DEFAULT ...]`
    pub fn to_sql(&self) -> Result<String> {
        let mut sql = format!("{} {}", quote_column_name(&self.name), self.sql_type.to_sql()?);
        if !self.null {
            sql.push_str(" NOT NULL");
        }
        match &self.default {
            ColumnDefault::None => {}
            ColumnDefault::Literal(value) => {
                sql.push_str(" DEFAULT ");
                sql.push_str(&quote_value(value));
            }
            ColumnDefault::Function(expr) => {
                sql.push_str(" DEFAULT ");
                sql.push_str(expr);
            }
        }
        Ok(sql)
    }
}

/// Secondary index on a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexDefinition {
    /// Index named `index_<table>_on_<col>_and_<col>`.
    pub fn new(table: &str, columns: &[&str]) -> Self {
        Self {
            name: default_index_name(table, columns),
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn to_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| quote_column_name(c)).collect();
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            quote_column_name(&self.name),
            quote_table_name(&self.table),
            columns.join(", ")
        )
    }
}

pub fn default_index_name(table: &str, columns: &[&str]) -> String {
    format!("index_{}_on_{}", table, columns.join("_and_"))
}

/// Primary key column of a table being created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyColumn {
    pub name: String,
    pub kind: PrimaryKeyKind,
    /// Sequence whose `nextval` becomes the column default.
    pub sequence: Option<String>,
}

/// Table under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub primary_key: Option<PrimaryKeyColumn>,
    pub columns: Vec<ColumnDefinition>,
    pub indexes: Vec<IndexDefinition>,
    /// Table-level `PRIMARY KEY (...)` over existing columns.
    pub key_columns: Vec<String>,
    pub if_not_exists: bool,
    pub temporary: bool,
    /// DuckLake drops constraint suffixes and indexes.
    pub ducklake: bool,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: None,
            columns: Vec::new(),
            indexes: Vec::new(),
            key_columns: Vec::new(),
            if_not_exists: false,
            temporary: false,
            ducklake: false,
        }
    }

    pub fn column(&mut self, name: &str, sql_type: SqlType) -> &mut ColumnDefinition {
        self.columns.push(ColumnDefinition::new(name, sql_type));
        let last = self.columns.len() - 1;
        &mut self.columns[last]
    }

    pub fn string(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, SqlType::new(LogicalType::String))
    }

    pub fn text(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, SqlType::new(LogicalType::Text))
    }

    pub fn integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, SqlType::new(LogicalType::Integer))
    }

    pub fn bigint(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, SqlType::new(LogicalType::Bigint))
    }

    pub fn float(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, SqlType::new(LogicalType::Float))
    }

    pub fn decimal(&mut self, name: &str, precision: u32, scale: u32) -> &mut ColumnDefinition {
        self.column(
            name,
            SqlType::new(LogicalType::Decimal)
                .with_precision(precision)
                .with_scale(scale),
        )
    }

    pub fn boolean(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, SqlType::new(LogicalType::Boolean))
    }

    pub fn datetime(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, SqlType::new(LogicalType::Datetime))
    }

    pub fn date(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, SqlType::new(LogicalType::Date))
    }

    pub fn uuid(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, SqlType::new(LogicalType::Uuid))
    }

    pub fn interval(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, SqlType::new(LogicalType::Interval))
    }

    /// Composite column spelled out in full, e.g. `INTEGER[]` or `MAP(VARCHAR, INTEGER)`.
    pub fn composite(&mut self, name: &str, logical_type: LogicalType, definition: &str) -> &mut ColumnDefinition {
        self.column(name, SqlType::new(logical_type).with_definition(definition))
    }

    /// `created_at` and `updated_at`, both NOT NULL.
    pub fn timestamps(&mut self) {
        self.datetime("created_at").null(false);
        self.datetime("updated_at").null(false);
    }

    /// `<name>_id BIGINT` plus an index on it.
    pub fn references(&mut self, name: &str) -> &mut ColumnDefinition {
        let column = format!("{}_id", name);
        let index = IndexDefinition::new(&self.name, &[column.as_str()]);
        self.indexes.push(index);
        self.bigint(&column)
    }

    pub fn index(&mut self, columns: &[&str]) {
        self.indexes.push(IndexDefinition::new(&self.name, columns));
    }

    pub fn unique_index(&mut self, columns: &[&str]) {
        self.indexes.push(IndexDefinition::new(&self.name, columns).unique());
    }

    /// Declare a (possibly composite) primary key over columns of this table.
    pub fn primary_key_columns(&mut self, columns: &[&str]) {
        self.key_columns = columns.iter().map(|c| c.to_string()).collect();
    }

    /// Render the primary key column: `"id" BIGINT [DEFAULT nextval('...')] PRIMARY KEY`.
    fn primary_key_sql(&self, pk: &PrimaryKeyColumn) -> String {
        let mut sql = pk.kind.to_sql(self.ducklake);
        if let Some(sequence) = &pk.sequence {
            let default = format!(" DEFAULT nextval({})", quote_string(sequence));
            match sql.find(" PRIMARY KEY") {
                Some(pos) => sql.insert_str(pos, &default),
                None => sql.push_str(&default),
            }
        }
        format!("{} {}", quote_column_name(&pk.name), sql)
    }

    pub fn to_sql(&self) -> Result<String> {
        let mut parts = Vec::with_capacity(self.columns.len() + 1);
        if let Some(pk) = &self.primary_key {
            parts.push(self.primary_key_sql(pk));
        }
        for column in &self.columns {
            parts.push(column.to_sql()?);
        }
        if !self.key_columns.is_empty() {
            if self.primary_key.is_some() {
                return Err(DbError::configuration(format!(
                    "Table '{}' declares both a key column and a table-level primary key",
                    self.name
                )));
            }
            if !self.ducklake {
                let keys: Vec<String> = self.key_columns.iter().map(|c| quote_column_name(c)).collect();
                parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
            }
        }
        if parts.is_empty() {
            return Err(DbError::configuration(format!(
                "Table '{}' has no columns",
                self.name
            )));
        }
        Ok(format!(
            "CREATE {}TABLE {}{} ({})",
            if self.temporary { "TEMPORARY " } else { "" },
            if self.if_not_exists { "IF NOT EXISTS " } else { "" },
            quote_table_name(&self.name),
            parts.join(", ")
        ))
    }
}
