//! One-time configuration of a physical connection.
//!
//! Settings are applied in a fixed order and the connection is then locked with
//! `SET lock_configuration = true`. A locked connection rejects further `SET`s,
//! so configuring it again is a no-op. A reconnect produces a fresh connection
//! that starts over at [`ConfigurationState::Unconfigured`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::config::{Attachment, ConnectionConfig, ExtensionSpec, SettingValue};
use super::{DbError, Engine, Result, Value};
use crate::quoting::{quote_column_name, quote_string};

/// Settings that must be in place before any extension is installed.
pub const EARLY_SETTINGS: &[&str] = &[
    "allow_unsigned_extensions",
    "allow_community_extensions",
    "allow_extensions_metadata_mismatch",
    "autoinstall_known_extensions",
    "autoload_known_extensions",
    "extension_directory",
    "custom_extension_repository",
    "autoinstall_extension_repository",
];

pub const LOCK_STATEMENT: &str = "SET lock_configuration = true";

const LOCK_SETTING_QUERY: &str = "SELECT current_setting('lock_configuration')";

static SETTING_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid setting name regex"));

/// Per-connection configuration progress. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ConfigurationState {
    #[default]
    Unconfigured,
    EarlySettingsApplied,
    ExtensionsLoaded,
    SettingsApplied,
    Locked,
}

impl ConfigurationState {
    pub fn is_locked(&self) -> bool {
        matches!(self, ConfigurationState::Locked)
    }
}

pub fn is_early_setting(name: &str) -> bool {
    EARLY_SETTINGS.iter().any(|s| s.eq_ignore_ascii_case(name))
}

fn validate_name<'a>(kind: &str, name: &'a str) -> Result<&'a str> {
    if SETTING_NAME.is_match(name) {
        Ok(name)
    } else {
        Err(DbError::configuration(format!("Invalid {} name '{}'", kind, name)))
    }
}

/// `SET name = value`
pub fn set_statement(name: &str, value: &SettingValue) -> Result<String> {
    let name = validate_name("setting", name)?;
    Ok(format!("SET {} = {}", name, value.to_sql()))
}

/// `INSTALL` followed by `LOAD` for one extension.
pub fn extension_statements(extension: &ExtensionSpec) -> Result<[String; 2]> {
    let name = validate_name("extension", extension.name())?;
    let install = match extension.repository() {
        Some(repo) => format!("INSTALL {} FROM {}", name, validate_name("repository", repo)?),
        None => format!("INSTALL {}", name),
    };
    Ok([install, format!("LOAD {}", name)])
}

/// `CREATE OR REPLACE SECRET`.
///
/// With an explicit `type` field the map key names the secret; otherwise the key
/// is the secret type and the secret stays unnamed.
pub fn create_secret_statement(key: &str, fields: &BTreeMap<String, SettingValue>) -> Result<String> {
    let explicit_type = fields.get("type").and_then(SettingValue::as_str);
    let (name, secret_type) = match explicit_type {
        Some(t) => (Some(validate_name("secret", key)?), t),
        None => (None, key),
    };
    let mut parts = vec![format!("TYPE {}", validate_name("secret type", secret_type)?)];
    for (field, value) in fields.iter().filter(|(field, _)| field.as_str() != "type") {
        let field = validate_name("secret field", field)?;
        parts.push(format!("{} {}", field.to_uppercase(), value.to_sql()));
    }
    Ok(match name {
        Some(name) => format!("CREATE OR REPLACE SECRET {} ({})", name, parts.join(", ")),
        None => format!("CREATE OR REPLACE SECRET ({})", parts.join(", ")),
    })
}

/// `ATTACH IF NOT EXISTS '<conn>' AS "name" (TYPE t, KEY value, ...)`
pub fn attach_statement(attachment: &Attachment) -> Result<String> {
    let mut options = Vec::new();
    if let Some(kind) = &attachment.kind {
        options.push(format!("TYPE {}", validate_name("attachment type", kind)?));
    }
    for (key, value) in &attachment.options {
        let key = validate_name("attachment option", key)?;
        options.push(format!("{} {}", key.to_uppercase(), value.to_sql()));
    }
    let mut sql = format!(
        "ATTACH IF NOT EXISTS {} AS {}",
        quote_string(&attachment.connection_string),
        quote_column_name(&attachment.name)
    );
    if !options.is_empty() {
        sql.push_str(&format!(" ({})", options.join(", ")));
    }
    Ok(sql)
}

pub fn use_statement(database: &str) -> String {
    format!("USE {}", quote_column_name(database))
}

/// Ask the live connection whether its configuration is already locked.
pub fn is_locked(engine: &dyn Engine) -> Result<bool> {
    let result = engine.query(LOCK_SETTING_QUERY, &[])?;
    Ok(result
        .rows
        .first()
        .and_then(|row| row.first())
        .and_then(Value::as_bool)
        .unwrap_or(false))
}

fn run(engine: &dyn Engine, sql: &str) -> Result<()> {
    engine.query(sql, &[]).map(|_| ())
}

/// Bring a connection from `state` to [`ConfigurationState::Locked`].
///
/// Phases already recorded in `state` are skipped, so a retry after a failure
/// resumes where the previous attempt stopped.
pub fn configure(engine: &dyn Engine, config: &ConnectionConfig, state: &mut ConfigurationState) -> Result<()> {
    if state.is_locked() {
        return Ok(());
    }
    if is_locked(engine)? {
        debug!("configuration already locked, skipping");
        *state = ConfigurationState::Locked;
        return Ok(());
    }

    let (early, late): (Vec<_>, Vec<_>) = config
        .settings
        .iter()
        .partition(|(name, _)| is_early_setting(name));

    if *state < ConfigurationState::EarlySettingsApplied {
        for (name, value) in &early {
            run(engine, &set_statement(name, value)?)?;
        }
        *state = ConfigurationState::EarlySettingsApplied;
        debug!(count = early.len(), "early settings applied");
    }

    if *state < ConfigurationState::ExtensionsLoaded {
        for extension in &config.extensions {
            for sql in extension_statements(extension)? {
                run(engine, &sql)?;
            }
        }
        *state = ConfigurationState::ExtensionsLoaded;
        debug!(count = config.extensions.len(), "extensions loaded");
    }

    if *state < ConfigurationState::SettingsApplied {
        for (name, value) in &late {
            run(engine, &set_statement(name, value)?)?;
        }
        *state = ConfigurationState::SettingsApplied;
        debug!(count = late.len(), "settings applied");
    }

    for (key, fields) in &config.secrets {
        run(engine, &create_secret_statement(key, fields)?)?;
    }
    for attachment in &config.attachments {
        run(engine, &attach_statement(attachment)?)?;
        debug!(name = %attachment.name, ducklake = attachment.is_ducklake(), "database attached");
    }
    if let Some(database) = &config.use_database {
        run(engine, &use_statement(database))?;
    }

    run(engine, LOCK_STATEMENT)?;
    *state = ConfigurationState::Locked;
    debug!("configuration locked");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingEngine;
    use rstest::rstest;

    fn config_from(json: &str) -> ConnectionConfig {
        ConnectionConfig::from_json(json).unwrap()
    }

    #[rstest]
    fn test_phases_run_in_fixed_order() {
        let engine = RecordingEngine::new();
        let config = config_from(
            r#"{
                "database": ":memory:",
                "settings": { "threads": 2, "allow_community_extensions": true },
                "extensions": [{ "name": "h3", "repository": "community" }],
                "secrets": { "s3": { "key_id": "k" } },
                "attachments": [{ "name": "lake", "connection_string": "ducklake:meta.ducklake" }],
                "use_database": "lake"
            }"#,
        );
        let mut state = ConfigurationState::Unconfigured;
        configure(&engine, &config, &mut state).unwrap();

        assert_eq!(state, ConfigurationState::Locked);
        assert_eq!(
            engine.statements(),
            vec![
                LOCK_SETTING_QUERY.to_string(),
                "SET allow_community_extensions = true".to_string(),
                "INSTALL h3 FROM community".to_string(),
                "LOAD h3".to_string(),
                "SET threads = 2".to_string(),
                "CREATE OR REPLACE SECRET (TYPE s3, KEY_ID 'k')".to_string(),
                r#"ATTACH IF NOT EXISTS 'ducklake:meta.ducklake' AS "lake""#.to_string(),
                r#"USE "lake""#.to_string(),
                LOCK_STATEMENT.to_string(),
            ]
        );
    }

    #[rstest]
    fn test_configure_twice_is_a_no_op() {
        let engine = RecordingEngine::new();
        let config = config_from(r#"{ "database": ":memory:", "settings": { "threads": 2 } }"#);
        let mut state = ConfigurationState::Unconfigured;
        configure(&engine, &config, &mut state).unwrap();
        let first = engine.statements().len();
        configure(&engine, &config, &mut state).unwrap();
        assert_eq!(engine.statements().len(), first);
    }

    #[rstest]
    fn test_live_lock_short_circuits_fresh_state() {
        let engine = RecordingEngine::new();
        let config = config_from(r#"{ "database": ":memory:", "settings": { "threads": 2 } }"#);
        let mut state = ConfigurationState::Unconfigured;
        configure(&engine, &config, &mut state).unwrap();

        let mut fresh = ConfigurationState::Unconfigured;
        engine.clear();
        configure(&engine, &config, &mut fresh).unwrap();
        assert_eq!(fresh, ConfigurationState::Locked);
        assert_eq!(engine.statements(), vec![LOCK_SETTING_QUERY.to_string()]);
    }

    #[rstest]
    fn test_no_extensions_means_no_installs() {
        let engine = RecordingEngine::new();
        let mut state = ConfigurationState::Unconfigured;
        configure(&engine, &ConnectionConfig::memory(), &mut state).unwrap();
        assert!(!engine.statements().iter().any(|s| s.starts_with("INSTALL")));
    }

    #[rstest]
    #[case("threads; DROP TABLE users")]
    #[case("memory limit")]
    #[case("")]
    fn test_invalid_setting_names_rejected(#[case] name: &str) {
        let result = set_statement(name, &SettingValue::Int(1));
        assert!(matches!(result, Err(DbError::Configuration { .. })));
    }

    #[rstest]
    fn test_named_secret_uses_key_as_name() {
        let mut fields = BTreeMap::new();
        fields.insert("type".to_string(), SettingValue::from("s3"));
        fields.insert("region".to_string(), SettingValue::from("eu-west-1"));
        assert_eq!(
            create_secret_statement("warehouse", &fields).unwrap(),
            "CREATE OR REPLACE SECRET warehouse (TYPE s3, REGION 'eu-west-1')"
        );
    }

    #[rstest]
    fn test_attach_with_type_and_options() {
        let mut options = BTreeMap::new();
        options.insert("data_path".to_string(), SettingValue::from("data/"));
        let attachment = Attachment {
            name: "lake".into(),
            connection_string: "meta.sqlite".into(),
            kind: Some("ducklake".into()),
            options,
        };
        assert_eq!(
            attach_statement(&attachment).unwrap(),
            r#"ATTACH IF NOT EXISTS 'meta.sqlite' AS "lake" (TYPE ducklake, DATA_PATH 'data/')"#
        );
    }

    #[rstest]
    fn test_failed_phase_resumes_on_retry() {
        let engine = RecordingEngine::new();
        engine.fail_on("LOAD spatial", "IO Error: extension not available");
        let config = config_from(
            r#"{ "database": ":memory:", "settings": { "autoload_known_extensions": false }, "extensions": ["spatial"] }"#,
        );
        let mut state = ConfigurationState::Unconfigured;
        assert!(configure(&engine, &config, &mut state).is_err());
        assert_eq!(state, ConfigurationState::EarlySettingsApplied);

        engine.clear_failures();
        engine.clear();
        configure(&engine, &config, &mut state).unwrap();
        assert!(!engine.statements().iter().any(|s| s.starts_with("SET autoload")));
        assert_eq!(state, ConfigurationState::Locked);
    }
}
