//! Schema statements and introspection.
//!
//! - `column`: column metadata rebuilt from `pragma_table_info`
//! - `definition`: table definition DSL rendered to `CREATE TABLE`
//! - `sequences`: sequence-backed primary keys and the `CREATE TABLE` rewrite
//! - `introspection`: tables, views, columns, indexes, primary keys, sequences
//! - `ducklake`: partitioning and options of DuckLake catalogs
//! - `dumper`: declarative schema dump and replay

pub mod column;
pub mod definition;
pub mod ducklake;
pub mod dumper;
pub mod introspection;
pub mod sequences;

pub use column::{ColumnDefault, ColumnDescriptor};
pub use definition::{
    ColumnDefinition, CreateTableOptions, IdColumn, IndexDefinition, PrimaryKeyColumn, TableDefinition,
};
pub use dumper::{dump_schema, load_schema, SchemaDump, TableDump};
pub use sequences::{PendingSequenceInjection, SequenceInjection};
