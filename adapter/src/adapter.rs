//! The connection adapter the host framework talks to.
//!
//! `DuckDbAdapter` owns one physical connection, configures it once, runs
//! statements through the selected execution strategy and exposes schema
//! statements and introspection in terms of the host's relational model.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db::config::{ConnectionConfig, SettingValue};
use crate::db::configure::{self, ConfigurationState};
use crate::db::execution::{self, Execution, ExecutionContract, HostGeneration};
use crate::db::time::TimeZonePolicy;
use crate::db::{Connector, DbError, Engine, Result, ResultSet, Value};
use crate::quoting::{quote_column_name, quote_table_name};
use crate::schema::column::ColumnDescriptor;
use crate::schema::definition::{
    ColumnDefinition, CreateTableOptions, IndexDefinition, PrimaryKeyColumn, TableDefinition,
};
use crate::schema::sequences::{
    self, drop_sequence_sql, PendingSequenceInjection, PendingSlot, SequenceInjection,
};
use crate::schema::{ducklake, introspection};
use crate::types::PrimaryKeyKind;

/// Per-adapter behaviour chosen at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterOptions {
    pub primary_key: PrimaryKeyKind,
    pub host_generation: HostGeneration,
    pub time_zone: TimeZonePolicy,
    pub sequence_injection: SequenceInjection,
}

struct PhysicalConnection {
    engine: Box<dyn Engine>,
    state: ConfigurationState,
}

/// DuckDB connection adapter.
pub struct DuckDbAdapter {
    config: ConnectionConfig,
    options: AdapterOptions,
    connector: Box<dyn Connector>,
    connection: Option<PhysicalConnection>,
    execution: Execution,
    pending: PendingSlot,
    in_transaction: AtomicBool,
}

impl DuckDbAdapter {
    /// Build an adapter without connecting. Options come from the config's `adapter` section.
    pub fn new(config: ConnectionConfig, connector: impl Connector + 'static) -> Self {
        let options = config.adapter;
        Self {
            config,
            options,
            connector: Box::new(connector),
            connection: None,
            execution: Execution::from(options.host_generation),
            pending: PendingSlot::default(),
            in_transaction: AtomicBool::new(false),
        }
    }

    /// Open and configure a DuckDB connection.
    #[cfg(feature = "backend-duckdb")]
    pub fn open(config: ConnectionConfig) -> Result<Self> {
        let connector = crate::db::duckdb::DuckDbConnector::new(config.adapter.time_zone);
        let mut adapter = Self::new(config, connector);
        adapter.connect()?;
        Ok(adapter)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    pub fn is_ducklake(&self) -> bool {
        self.config.is_ducklake()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn engine(&self) -> Result<&dyn Engine> {
        self.connection
            .as_ref()
            .map(|c| c.engine.as_ref())
            .ok_or(DbError::NotConnected)
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// Open a new physical connection and configure it.
    pub fn connect(&mut self) -> Result<()> {
        let database = self.config.database()?.to_string();
        let engine = self.connector.open(&self.config)?;
        info!(database = %database, backend = engine.backend_name(), "connected");
        self.connection = Some(PhysicalConnection {
            engine,
            state: ConfigurationState::Unconfigured,
        });
        self.in_transaction.store(false, Ordering::SeqCst);
        self.configure()
    }

    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            debug!("disconnected");
        }
        self.in_transaction.store(false, Ordering::SeqCst);
    }

    /// Drop the current connection and start over with a fresh, unconfigured one.
    pub fn reconnect(&mut self) -> Result<()> {
        self.disconnect();
        self.connect()?;
        info!("reconnected");
        Ok(())
    }

    /// Re-apply configuration. A locked connection is left untouched.
    pub fn reset(&mut self) -> Result<()> {
        match self.configuration_state() {
            Some(ConfigurationState::Locked) | None => Ok(()),
            Some(_) => self.configure(),
        }
    }

    /// Apply the connection configuration once; later calls are no-ops.
    pub fn configure(&mut self) -> Result<()> {
        let Some(connection) = self.connection.as_mut() else {
            return Ok(());
        };
        configure::configure(connection.engine.as_ref(), &self.config, &mut connection.state)
    }

    pub fn configuration_state(&self) -> Option<ConfigurationState> {
        self.connection.as_ref().map(|c| c.state)
    }

    /// Live check of the engine's `lock_configuration` setting.
    pub fn configuration_locked(&self) -> Result<bool> {
        configure::is_locked(self.engine()?)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Run `sql` with positional binds. Pending sequence injections are applied here.
    pub fn execute(&self, sql: &str, binds: &[Value]) -> Result<ResultSet> {
        let engine = self.engine()?;
        let pending = self.pending.current();
        let sql = sequences::intercept(sql, pending.as_ref())?;
        self.execution.run(engine, &sql, binds)
    }

    pub fn exec_query(&self, sql: &str, binds: &[Value]) -> Result<ResultSet> {
        self.execute(sql, binds)
    }

    pub fn exec_update(&self, sql: &str, binds: &[Value]) -> Result<u64> {
        Ok(execution::affected_row_count(&self.execute(sql, binds)?))
    }

    pub fn exec_delete(&self, sql: &str, binds: &[Value]) -> Result<u64> {
        self.exec_update(sql, binds)
    }

    pub fn affected_row_count(&self, result: &ResultSet) -> u64 {
        execution::affected_row_count(result)
    }

    pub fn host_generation(&self) -> HostGeneration {
        self.execution.generation()
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    pub fn begin_db_transaction(&self) -> Result<()> {
        self.execute("BEGIN TRANSACTION", &[])?;
        self.in_transaction.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn commit_db_transaction(&self) -> Result<()> {
        let result = self.execute("COMMIT", &[]);
        self.in_transaction.store(false, Ordering::SeqCst);
        result.map(|_| ())
    }

    pub fn rollback_db_transaction(&self) -> Result<()> {
        let result = self.execute("ROLLBACK", &[]);
        self.in_transaction.store(false, Ordering::SeqCst);
        result.map(|_| ())
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::SeqCst)
    }

    pub fn create_savepoint(&self, _name: &str) -> Result<()> {
        Err(DbError::SavepointUnsupported)
    }

    pub fn release_savepoint(&self, _name: &str) -> Result<()> {
        Err(DbError::SavepointUnsupported)
    }

    pub fn rollback_to_savepoint(&self, _name: &str) -> Result<()> {
        Err(DbError::SavepointUnsupported)
    }

    // =========================================================================
    // Capabilities
    // =========================================================================

    pub fn supports_savepoints(&self) -> bool {
        false
    }

    /// Keys come from column defaults, never fetched ahead of the insert.
    pub fn prefetch_primary_key(&self) -> bool {
        false
    }

    pub fn supports_insert_returning(&self) -> bool {
        !self.is_ducklake()
    }

    pub fn supports_foreign_keys(&self) -> bool {
        !self.is_ducklake()
    }

    pub fn supports_indexes(&self) -> bool {
        !self.is_ducklake()
    }

    pub fn supports_ddl_transactions(&self) -> bool {
        true
    }

    // =========================================================================
    // Schema statements
    // =========================================================================

    /// Create `name`, letting `define` add columns and indexes.
    ///
    /// Integer primary keys get a `{table}_{pk}_seq` sequence first. The pending
    /// injection stays armed until this call returns, whatever the outcome.
    pub fn create_table<F>(&self, name: &str, options: CreateTableOptions, define: F) -> Result<()>
    where
        F: FnOnce(&mut TableDefinition),
    {
        let engine = self.engine()?;
        let ducklake = self.is_ducklake();
        let kind = options.id.resolve(self.options.primary_key);

        let mut table = TableDefinition::new(name);
        table.if_not_exists = options.if_not_exists;
        table.temporary = options.temporary;
        table.ducklake = ducklake;
        table.primary_key = kind.map(|kind| PrimaryKeyColumn {
            name: options.primary_key.clone(),
            kind,
            sequence: None,
        });

        let pending = match kind {
            Some(kind) if kind.is_sequence_backed() && !ducklake => {
                Some(PendingSequenceInjection::new(name, &options.primary_key))
            }
            _ => None,
        };
        let _guard = pending.clone().map(|p| self.pending.arm(p));

        if let Some(pending) = &pending {
            sequences::ensure_sequence(engine, &pending.sequence_name, options.start_with)?;
            if self.options.sequence_injection == SequenceInjection::Construction {
                if let Some(pk) = table.primary_key.as_mut() {
                    pk.sequence = Some(pending.sequence_name.clone());
                }
            }
        }

        define(&mut table);
        self.execute(&table.to_sql()?, &[])?;

        if ducklake {
            if !table.indexes.is_empty() {
                debug!(table = name, count = table.indexes.len(), "skipping indexes on DuckLake table");
            }
        } else {
            for index in &table.indexes {
                self.execute(&index.to_sql(), &[])?;
            }
        }
        Ok(())
    }

    /// Drop `name` and the sequences its primary key draws from.
    ///
    /// Sequences are read from the key columns' `nextval(...)` defaults before
    /// the table goes away; tables without one leave no sequence behind.
    pub fn drop_table(&self, name: &str, if_exists: bool) -> Result<()> {
        let owned_sequences: Vec<String> = if self.is_ducklake() || !self.table_exists(name)? {
            Vec::new()
        } else {
            self.columns(name)?
                .iter()
                .filter(|c| c.primary_key)
                .filter_map(|c| c.default_function().and_then(sequences::sequence_from_default))
                .collect()
        };
        self.execute(
            &format!(
                "DROP TABLE {}{}",
                if if_exists { "IF EXISTS " } else { "" },
                quote_table_name(name)
            ),
            &[],
        )?;
        for sequence in &owned_sequences {
            self.execute(&drop_sequence_sql(sequence), &[])?;
        }
        Ok(())
    }

    pub fn add_column(&self, table: &str, column: &ColumnDefinition) -> Result<()> {
        let sql = format!("ALTER TABLE {} ADD COLUMN {}", quote_table_name(table), column.to_sql()?);
        self.execute(&sql, &[]).map(|_| ())
    }

    pub fn add_index(&self, index: &IndexDefinition) -> Result<()> {
        if self.is_ducklake() {
            return Err(DbError::configuration("DuckLake tables do not support indexes"));
        }
        self.execute(&index.to_sql(), &[]).map(|_| ())
    }

    pub fn remove_index(&self, name: &str) -> Result<()> {
        self.execute(&format!("DROP INDEX IF EXISTS {}", quote_column_name(name)), &[])
            .map(|_| ())
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        introspection::columns(self.engine()?, table)
    }

    pub fn tables(&self) -> Result<Vec<String>> {
        introspection::tables(self.engine()?)
    }

    pub fn views(&self) -> Result<Vec<String>> {
        introspection::views(self.engine()?)
    }

    pub fn data_sources(&self) -> Result<Vec<String>> {
        introspection::data_sources(self.engine()?)
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        introspection::table_exists(self.engine()?, name)
    }

    pub fn view_exists(&self, name: &str) -> Result<bool> {
        introspection::view_exists(self.engine()?, name)
    }

    pub fn indexes(&self, table: &str) -> Result<Vec<IndexDefinition>> {
        introspection::indexes(self.engine()?, table)
    }

    pub fn primary_keys(&self, table: &str) -> Result<Vec<String>> {
        introspection::primary_keys(self.engine()?, table)
    }

    pub fn primary_key(&self, table: &str) -> Result<Option<String>> {
        introspection::primary_key(self.engine()?, table)
    }

    pub fn sequences(&self) -> Result<Vec<String>> {
        introspection::sequences(self.engine()?)
    }

    // =========================================================================
    // DuckLake
    // =========================================================================

    pub fn partitions(&self, table: &str) -> Result<Vec<String>> {
        ducklake::partitions(self.engine()?, table)
    }

    pub fn ducklake_options(&self, table: Option<&str>) -> Result<std::collections::BTreeMap<String, String>> {
        ducklake::options(self.engine()?, table)
    }

    /// Set a DuckLake option on the active database, globally or for one table.
    pub fn set_option(&self, key: &str, value: &SettingValue, table: Option<&str>) -> Result<()> {
        let database = ducklake::current_database(self.engine()?)?;
        self.execute(&ducklake::set_option_sql(&database, key, value, table), &[])
            .map(|_| ())
    }

    pub fn set_partitioned_by(&self, table: &str, expressions: &[String]) -> Result<()> {
        self.execute(&ducklake::set_partitioned_by_sql(table, expressions), &[])
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::config::Attachment;
    use crate::schema::definition::IdColumn;
    use crate::test_utils::RecordingEngine;
    use rstest::{fixture, rstest};

    fn adapter_with(engine: &RecordingEngine, options: AdapterOptions) -> DuckDbAdapter {
        let mut config = ConnectionConfig::memory();
        config.adapter = options;
        let mut adapter = DuckDbAdapter::new(config, engine.clone());
        adapter.connect().unwrap();
        engine.clear();
        adapter
    }

    #[fixture]
    fn engine() -> RecordingEngine {
        RecordingEngine::new()
    }

    fn create_statement(engine: &RecordingEngine) -> String {
        engine
            .statements()
            .into_iter()
            .find(|s| s.starts_with("CREATE TABLE"))
            .expect("CREATE TABLE executed")
    }

    #[rstest]
    fn test_connect_configures_and_locks(engine: RecordingEngine) {
        let mut adapter = DuckDbAdapter::new(ConnectionConfig::memory(), engine.clone());
        adapter.connect().unwrap();
        assert_eq!(adapter.configuration_state(), Some(ConfigurationState::Locked));
        assert!(adapter.configuration_locked().unwrap());
    }

    #[rstest]
    fn test_configure_without_connection_is_a_no_op(engine: RecordingEngine) {
        let mut adapter = DuckDbAdapter::new(ConnectionConfig::memory(), engine.clone());
        adapter.configure().unwrap();
        assert!(engine.statements().is_empty());
    }

    #[rstest]
    fn test_missing_database_fails_connect(engine: RecordingEngine) {
        let mut adapter = DuckDbAdapter::new(ConnectionConfig::default(), engine.clone());
        assert!(matches!(adapter.connect(), Err(DbError::MissingParameter { .. })));
        assert_eq!(engine.opened(), 0);
    }

    #[rstest]
    fn test_reconnect_reconfigures_fresh_connection(engine: RecordingEngine) {
        let mut adapter = adapter_with(&engine, AdapterOptions::default());
        adapter.reset().unwrap();
        assert!(engine.statements().is_empty());

        adapter.reconnect().unwrap();
        assert_eq!(engine.opened(), 2);
        assert!(engine.statements().contains(&configure::LOCK_STATEMENT.to_string()));
        assert_eq!(adapter.configuration_state(), Some(ConfigurationState::Locked));
    }

    #[rstest]
    fn test_create_table_attaches_sequence_default(engine: RecordingEngine) {
        let adapter = adapter_with(&engine, AdapterOptions::default());
        adapter
            .create_table("posts", CreateTableOptions::default(), |t| {
                t.string("title");
                t.references("user");
                t.references("category");
            })
            .unwrap();

        let statements = engine.statements();
        let create_seq = statements.iter().position(|s| s.starts_with("CREATE SEQUENCE")).unwrap();
        let create_table = statements.iter().position(|s| s.starts_with("CREATE TABLE")).unwrap();
        assert!(create_seq < create_table);

        let sql = create_statement(&engine);
        assert_eq!(sql.matches("nextval").count(), 1);
        assert!(sql.contains(r#""id" BIGINT DEFAULT nextval('posts_id_seq') PRIMARY KEY"#));
        assert!(sql.contains(r#""user_id" BIGINT,"#));
        assert!(sql.contains(r#""category_id" BIGINT)"#));
        assert!(adapter.pending.is_empty());
    }

    #[rstest]
    fn test_rewrite_mode_injects_through_execute(engine: RecordingEngine) {
        let options = AdapterOptions {
            sequence_injection: SequenceInjection::Rewrite,
            ..AdapterOptions::default()
        };
        let adapter = adapter_with(&engine, options);
        adapter
            .create_table("posts", CreateTableOptions::default(), |t| {
                t.references("user");
            })
            .unwrap();
        let sql = create_statement(&engine);
        assert!(sql.contains(r#""id" BIGINT DEFAULT nextval('posts_id_seq') PRIMARY KEY"#));
        assert!(!sql.contains("\"user_id\" BIGINT DEFAULT"));
    }

    #[rstest]
    #[case(PrimaryKeyKind::Uuid)]
    #[case(PrimaryKeyKind::String)]
    fn test_non_integer_keys_get_no_sequence(engine: RecordingEngine, #[case] kind: PrimaryKeyKind) {
        let adapter = adapter_with(&engine, AdapterOptions::default());
        adapter
            .create_table("tokens", CreateTableOptions::default().with_id(IdColumn::Kind(kind)), |t| {
                t.string("value");
            })
            .unwrap();
        assert!(!engine.statements().iter().any(|s| s.contains("SEQUENCE") || s.contains("nextval")));
    }

    #[rstest]
    fn test_table_without_id_gets_no_sequence(engine: RecordingEngine) {
        let adapter = adapter_with(&engine, AdapterOptions::default());
        adapter
            .create_table("tags", CreateTableOptions::default().with_id(IdColumn::None), |t| {
                t.string("name");
            })
            .unwrap();
        assert_eq!(engine.statements(), vec![r#"CREATE TABLE "tags" ("name" VARCHAR)"#]);
    }

    #[rstest]
    fn test_pending_cleared_after_failed_create(engine: RecordingEngine) {
        engine.fail_on("CREATE TABLE", "Catalog Error: Table with name posts already exists!");
        let adapter = adapter_with(&engine, AdapterOptions::default());
        let result = adapter.create_table("posts", CreateTableOptions::default(), |t| {
            t.string("title");
        });
        assert!(result.is_err());
        assert!(adapter.pending.is_empty());
    }

    #[rstest]
    fn test_custom_primary_key_and_start(engine: RecordingEngine) {
        let adapter = adapter_with(&engine, AdapterOptions::default());
        let options = CreateTableOptions::default()
            .with_primary_key("uid")
            .with_start_with(100);
        adapter.create_table("accounts", options, |t| {
            t.string("name");
        })
        .unwrap();
        assert!(engine
            .statements()
            .contains(&r#"CREATE SEQUENCE "accounts_uid_seq" START WITH 100"#.to_string()));
        assert!(create_statement(&engine).contains(r#""uid" BIGINT DEFAULT nextval('accounts_uid_seq') PRIMARY KEY"#));
    }

    #[rstest]
    fn test_ducklake_mode_skips_sequences_and_constraints(engine: RecordingEngine) {
        let mut config = ConnectionConfig::memory();
        config.attachments.push(Attachment {
            name: "lake".into(),
            connection_string: "ducklake:meta.ducklake".into(),
            kind: None,
            options: Default::default(),
        });
        let mut adapter = DuckDbAdapter::new(config, engine.clone());
        adapter.connect().unwrap();
        engine.clear();

        adapter
            .create_table("events", CreateTableOptions::default(), |t| {
                t.references("user");
            })
            .unwrap();
        assert_eq!(
            engine.statements(),
            vec![r#"CREATE TABLE "events" ("id" BIGINT, "user_id" BIGINT)"#]
        );
        assert!(!adapter.supports_insert_returning());
        assert!(adapter.add_index(&IndexDefinition::new("events", &["user_id"])).is_err());
    }

    #[rstest]
    fn test_savepoints_unsupported(engine: RecordingEngine) {
        let adapter = adapter_with(&engine, AdapterOptions::default());
        assert!(!adapter.supports_savepoints());
        assert!(!adapter.prefetch_primary_key());
        assert!(matches!(adapter.create_savepoint("sp1"), Err(DbError::SavepointUnsupported)));
        assert!(matches!(adapter.rollback_to_savepoint("sp1"), Err(DbError::SavepointUnsupported)));
    }

    #[rstest]
    fn test_sequence_lookup_inside_transaction(engine: RecordingEngine) {
        let adapter = adapter_with(&engine, AdapterOptions::default());
        adapter.begin_db_transaction().unwrap();
        adapter
            .create_table("notes", CreateTableOptions::default(), |t| {
                t.text("body");
            })
            .unwrap();
        adapter.commit_db_transaction().unwrap();
        let statements = engine.statements();
        assert_eq!(statements.iter().filter(|s| s.as_str() == "BEGIN TRANSACTION").count(), 1);
        assert!(statements.iter().any(|s| s.contains("duckdb_sequences()")));
        assert!(!adapter.in_transaction());
    }

    fn table_with_key(engine: &RecordingEngine, table: &str, key: &str, default: Value) {
        engine.respond_rows("information_schema.tables", &["table_name"], vec![vec![Value::from(table)]]);
        engine.respond_rows(
            &format!("pragma_table_info('{}')", table),
            &["cid", "name", "type", "notnull", "dflt_value", "pk"],
            vec![
                vec![Value::Int(0), Value::from(key), Value::from("BIGINT"), Value::Bool(true), default, Value::Bool(true)],
                vec![Value::Int(1), Value::from("title"), Value::from("VARCHAR"), Value::Bool(false), Value::Null, Value::Bool(false)],
            ],
        );
    }

    #[rstest]
    fn test_drop_table_drops_sequence(engine: RecordingEngine) {
        table_with_key(&engine, "posts", "id", Value::from("nextval('posts_id_seq')"));
        let adapter = adapter_with(&engine, AdapterOptions::default());
        adapter.drop_table("posts", true).unwrap();
        let statements = engine.statements();
        assert!(statements.contains(&r#"DROP TABLE IF EXISTS "posts""#.to_string()));
        assert_eq!(statements.last().unwrap(), r#"DROP SEQUENCE IF EXISTS "posts_id_seq""#);
    }

    #[rstest]
    fn test_drop_table_follows_custom_key_sequence(engine: RecordingEngine) {
        table_with_key(&engine, "accounts", "uid", Value::from("nextval('accounts_uid_seq')"));
        let adapter = adapter_with(&engine, AdapterOptions::default());
        adapter.drop_table("accounts", false).unwrap();
        assert_eq!(engine.statements().last().unwrap(), r#"DROP SEQUENCE IF EXISTS "accounts_uid_seq""#);
    }

    #[rstest]
    fn test_drop_table_without_sequence_key(engine: RecordingEngine) {
        table_with_key(&engine, "codes", "code", Value::Null);
        let adapter = adapter_with(&engine, AdapterOptions::default());
        adapter.drop_table("codes", false).unwrap();
        assert!(!engine.statements().iter().any(|s| s.contains("DROP SEQUENCE")));
    }

    #[rstest]
    fn test_drop_missing_table_leaves_sequences_alone(engine: RecordingEngine) {
        let adapter = adapter_with(&engine, AdapterOptions::default());
        adapter.drop_table("ghosts", true).unwrap();
        assert_eq!(engine.statements().last().unwrap(), r#"DROP TABLE IF EXISTS "ghosts""#);
        assert!(!engine.statements().iter().any(|s| s.contains("DROP SEQUENCE")));
    }

    #[rstest]
    fn test_exec_update_counts_rows_for_each_generation(engine: RecordingEngine) {
        engine.respond_count("UPDATE posts", 4);
        for generation in [HostGeneration::QueryOverride, HostGeneration::RawExecute] {
            let adapter = adapter_with(
                &engine,
                AdapterOptions {
                    host_generation: generation,
                    ..AdapterOptions::default()
                },
            );
            assert_eq!(adapter.exec_update("UPDATE posts SET title = ?", &[Value::from("x")]).unwrap(), 4);
        }
    }

    #[rstest]
    fn test_disconnected_adapter_reports_not_connected(engine: RecordingEngine) {
        let mut adapter = adapter_with(&engine, AdapterOptions::default());
        adapter.disconnect();
        assert!(matches!(adapter.execute("SELECT 1", &[]), Err(DbError::NotConnected)));
        assert!(matches!(adapter.tables(), Err(DbError::NotConnected)));
    }
}
