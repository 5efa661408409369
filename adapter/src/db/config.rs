//! Connection configuration delivered at connection-establishment time.
//!
//! This module provides loading and parsing of `.duckdb_adapter.json` files,
//! connection URLs and the `DATABASE_URL` environment variable.
//!
//! # Format
//!
//! ```json
//! {
//!   "database": "analytics.duckdb",
//!   "settings": { "threads": 4, "allow_unsigned_extensions": true },
//!   "extensions": ["ducklake", { "name": "h3", "repository": "community" }],
//!   "secrets": {
//!     "s3": { "key_id": "AKIA...", "secret": "..." },
//!     "warehouse": { "type": "s3", "region": "eu-west-1" }
//!   },
//!   "attachments": [
//!     { "name": "lake", "connection_string": "ducklake:meta.ducklake",
//!       "options": { "data_path": "s3://bucket/lake/" } }
//!   ],
//!   "use_database": "lake",
//!   "adapter": { "primary_key": "bigint", "host_generation": "raw_execute" }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{DbError, Result};
use crate::adapter::AdapterOptions;
use crate::quoting::quote_string;

/// In-memory database sentinel.
pub const MEMORY_DATABASE: &str = ":memory:";

/// Configuration file looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".duckdb_adapter.json";

/// Scalar value of a setting, secret field or attachment option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SettingValue {
    /// SQL literal form: strings quoted, everything else bare.
    pub fn to_sql(&self) -> String {
        match self {
            SettingValue::Bool(b) => b.to_string(),
            SettingValue::Int(i) => i.to_string(),
            SettingValue::Float(f) => f.to_string(),
            SettingValue::Text(s) => quote_string(s),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Text(s) => f.write_str(s),
            other => f.write_str(&other.to_sql()),
        }
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::Text(s.to_string())
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        SettingValue::Bool(b)
    }
}

impl From<i64> for SettingValue {
    fn from(i: i64) -> Self {
        SettingValue::Int(i)
    }
}

/// Extension to install and load, optionally from a named repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtensionSpec {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        repository: Option<String>,
    },
}

impl ExtensionSpec {
    pub fn name(&self) -> &str {
        match self {
            ExtensionSpec::Name(name) => name,
            ExtensionSpec::Detailed { name, .. } => name,
        }
    }

    pub fn repository(&self) -> Option<&str> {
        match self {
            ExtensionSpec::Name(_) => None,
            ExtensionSpec::Detailed { repository, .. } => repository.as_deref(),
        }
    }
}

/// Secondary database to `ATTACH` after settings are applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub connection_string: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub options: BTreeMap<String, SettingValue>,
}

impl Attachment {
    pub fn is_ducklake(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|kind| kind.eq_ignore_ascii_case("ducklake"))
            || self.connection_string.starts_with("ducklake:")
    }
}

/// Settings map delivered by the host framework when a connection is established.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// File path or `:memory:`
    pub database: Option<String>,
    pub settings: BTreeMap<String, SettingValue>,
    pub extensions: Vec<ExtensionSpec>,
    pub secrets: BTreeMap<String, BTreeMap<String, SettingValue>>,
    pub attachments: Vec<Attachment>,
    pub use_database: Option<String>,
    pub adapter: AdapterOptions,
}

impl ConnectionConfig {
    /// In-memory database with no extras.
    pub fn memory() -> Self {
        Self {
            database: Some(MEMORY_DATABASE.to_string()),
            ..Self::default()
        }
    }

    /// Database path, or a `MissingParameter` error when none was configured.
    pub fn database(&self) -> Result<&str> {
        match self.database.as_deref().map(str::trim) {
            Some(db) if !db.is_empty() => Ok(db),
            _ => Err(DbError::MissingParameter {
                name: "database".to_string(),
            }),
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self.database.as_deref(), Some(MEMORY_DATABASE))
    }

    /// True when any attached database is a DuckLake catalog.
    pub fn is_ducklake(&self) -> bool {
        self.attachments.iter().any(Attachment::is_ducklake)
    }

    /// Parse from a connection URL or file path.
    ///
    /// Supported formats:
    /// - `:memory:` or `duckdb::memory:` → in-memory
    /// - `duckdb:///path/to/db.duckdb` or `duckdb://relative.duckdb` → file
    /// - anything else → file path
    pub fn from_url(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DbError::MissingParameter {
                name: "database".to_string(),
            });
        }
        if url == MEMORY_DATABASE || url == "duckdb::memory:" || url == "duckdb://:memory:" {
            return Ok(Self::memory());
        }
        let path = url.strip_prefix("duckdb://").unwrap_or(url);
        if path.contains("://") {
            return Err(DbError::configuration(format!(
                "Unsupported connection URL '{}'",
                url
            )));
        }
        Ok(Self {
            database: Some(path.to_string()),
            ..Self::default()
        })
    }

    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DbError::ConfigFile {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Load a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigFile` if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| DbError::ConfigFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| DbError::ConfigFile {
            path: path.display().to_string(),
            message: format!("Invalid JSON: {}", e),
        })
    }

    /// Load from the `DATABASE_URL` environment variable, if set.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var("DATABASE_URL") {
            Ok(url) => Ok(Some(Self::from_url(&url)?)),
            Err(_) => Ok(None),
        }
    }

    /// Resolve configuration.
    ///
    /// Priority: `.duckdb_adapter.json` in the current directory > `DATABASE_URL` > `:memory:`
    pub fn resolve() -> Result<Self> {
        let config_path = PathBuf::from(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Self::load(&config_path);
        }
        if let Some(config) = Self::from_env()? {
            return Ok(config);
        }
        Ok(Self::memory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimaryKeyKind;
    use rstest::rstest;
    use serial_test::serial;

    #[rstest]
    fn test_full_document_deserialization() {
        let json = r#"
        {
            "database": "analytics.duckdb",
            "settings": { "threads": 4, "allow_unsigned_extensions": true, "memory_limit": "2GB" },
            "extensions": ["ducklake", { "name": "h3", "repository": "community" }],
            "secrets": {
                "s3": { "key_id": "AKIA", "secret": "shh" },
                "warehouse": { "type": "s3", "region": "eu-west-1" }
            },
            "attachments": [
                { "name": "lake", "connection_string": "ducklake:meta.ducklake",
                  "options": { "data_path": "data/" } }
            ],
            "use_database": "lake",
            "adapter": { "primary_key": "uuid" }
        }
        "#;
        let config = ConnectionConfig::from_json(json).unwrap();
        assert_eq!(config.database().unwrap(), "analytics.duckdb");
        assert_eq!(config.settings["threads"], SettingValue::Int(4));
        assert_eq!(config.settings["allow_unsigned_extensions"], SettingValue::Bool(true));
        assert_eq!(config.settings["memory_limit"], SettingValue::Text("2GB".into()));
        assert_eq!(config.extensions[0].name(), "ducklake");
        assert_eq!(config.extensions[1].repository(), Some("community"));
        assert_eq!(config.secrets["warehouse"]["type"], SettingValue::Text("s3".into()));
        assert!(config.is_ducklake());
        assert_eq!(config.use_database.as_deref(), Some("lake"));
        assert_eq!(config.adapter.primary_key, PrimaryKeyKind::Uuid);
    }

    #[rstest]
    fn test_missing_database_is_reported() {
        let config = ConnectionConfig::from_json("{}").unwrap();
        assert!(matches!(
            config.database(),
            Err(DbError::MissingParameter { name }) if name == "database"
        ));
    }

    #[rstest]
    fn test_attachment_type_marks_ducklake() {
        let attachment = Attachment {
            name: "lake".into(),
            connection_string: "meta.sqlite".into(),
            kind: Some("DUCKLAKE".into()),
            options: BTreeMap::new(),
        };
        assert!(attachment.is_ducklake());
    }

    #[rstest]
    #[case(":memory:", Some(MEMORY_DATABASE))]
    #[case("duckdb::memory:", Some(MEMORY_DATABASE))]
    #[case("duckdb:///tmp/test.duckdb", Some("/tmp/test.duckdb"))]
    #[case("./local.duckdb", Some("./local.duckdb"))]
    fn test_from_url(#[case] url: &str, #[case] expected: Option<&str>) {
        let config = ConnectionConfig::from_url(url).unwrap();
        assert_eq!(config.database.as_deref(), expected);
    }

    #[rstest]
    fn test_from_url_rejects_foreign_schemes() {
        let result = ConnectionConfig::from_url("postgres://localhost/test");
        assert!(matches!(result, Err(DbError::Configuration { .. })));
    }

    #[rstest]
    fn test_from_url_rejects_empty() {
        assert!(matches!(
            ConnectionConfig::from_url("  "),
            Err(DbError::MissingParameter { .. })
        ));
    }

    #[rstest]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{ "database": ":memory:", "settings": { "threads": 2 } }"#).unwrap();
        let config = ConnectionConfig::load(&path).unwrap();
        assert!(config.is_memory());
        assert_eq!(config.settings["threads"], SettingValue::Int(2));
    }

    #[rstest]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();
        let err = ConnectionConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[rstest]
    fn test_load_missing_file() {
        let err = ConnectionConfig::load(Path::new("/nonexistent/.duckdb_adapter.json")).unwrap_err();
        assert!(matches!(err, DbError::ConfigFile { .. }));
    }

    #[rstest]
    #[serial]
    fn test_from_env_database_url() {
        unsafe {
            std::env::set_var("DATABASE_URL", "duckdb:///tmp/from_env.duckdb");
        }
        let config = ConnectionConfig::from_env().unwrap().unwrap();
        assert_eq!(config.database.as_deref(), Some("/tmp/from_env.duckdb"));
        unsafe {
            std::env::remove_var("DATABASE_URL");
        }
    }

    #[rstest]
    #[serial]
    fn test_resolve_falls_back_to_memory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let old_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();
        unsafe {
            std::env::remove_var("DATABASE_URL");
        }
        let config = ConnectionConfig::resolve();
        std::env::set_current_dir(old_dir).unwrap();
        assert!(config.unwrap().is_memory());
    }

    #[rstest]
    #[serial]
    fn test_resolve_prefers_config_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            r#"{ "database": "from_file.duckdb" }"#,
        )
        .unwrap();
        let old_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();
        unsafe {
            std::env::set_var("DATABASE_URL", "from_env.duckdb");
        }
        let config = ConnectionConfig::resolve();
        std::env::set_current_dir(old_dir).unwrap();
        unsafe {
            std::env::remove_var("DATABASE_URL");
        }
        assert_eq!(config.unwrap().database.as_deref(), Some("from_file.duckdb"));
    }

    #[rstest]
    fn test_setting_value_sql() {
        assert_eq!(SettingValue::Text("it's".into()).to_sql(), "'it''s'");
        assert_eq!(SettingValue::Bool(false).to_sql(), "false");
        assert_eq!(SettingValue::Int(8).to_sql(), "8");
    }
}
