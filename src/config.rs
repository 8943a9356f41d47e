use crate::core::db::{IsolationLevel, Session, SqliteProvider};
use crate::core::{OrmError, Result};
use crate::dialect::Dialect;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub session: Option<SessionSettings>,
}

/// Connection settings.
#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path, or `:memory:`
    pub path: String,
    pub busy_timeout_ms: Option<u64>,
    /// PRAGMA statements applied to every new connection, e.g. `"foreign_keys = ON"`
    pub pragmas: Option<Vec<String>>,
}

/// Session defaults.
#[derive(Debug, Default, Deserialize)]
pub struct SessionSettings {
    pub dialect: Option<Dialect>,
    pub isolation: Option<IsolationLevel>,
}

impl Config {
    /// Builds the connection provider described by `[database]`.
    pub fn provider(&self) -> SqliteProvider {
        let mut provider = SqliteProvider::new(self.database.path.clone());
        if let Some(ms) = self.database.busy_timeout_ms {
            provider = provider.with_busy_timeout(Duration::from_millis(ms));
        }
        for pragma in self.database.pragmas.iter().flatten() {
            provider = provider.with_pragma(pragma.clone());
        }
        provider
    }

    /// Creates a closed session from this configuration.
    pub fn open_session(&self) -> Session {
        let settings = self.session.as_ref();
        let dialect = settings.and_then(|s| s.dialect).unwrap_or_default();
        let isolation = settings.and_then(|s| s.isolation).unwrap_or_default();
        Session::from_boxed(Box::new(self.provider()), dialect.encoder()).with_isolation(isolation)
    }
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| OrmError::Configuration(format!("Invalid config: {}", e)))
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = rowbind::config::load_config("rowbind.toml").expect("Failed to load config");
/// let mut session = config.open_session();
/// session.open().expect("Failed to open session");
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// `<config dir>/rowbind/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rowbind").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_CONFIG: &str = r#"
[database]
path = ":memory:"
busy_timeout_ms = 5000
pragmas = ["foreign_keys = ON"]

[session]
dialect = "mysql"
isolation = "serializable"
"#;

    #[test]
    fn test_parse_config_from_str() {
        let config = parse_config(SAMPLE_CONFIG).expect("Failed to parse sample config");
        assert_eq!(config.database.path, ":memory:");
        assert_eq!(config.database.busy_timeout_ms, Some(5000));
        assert_eq!(config.database.pragmas.as_ref().unwrap().len(), 1);
        if let Some(session) = &config.session {
            assert_eq!(session.dialect, Some(Dialect::Mysql));
            assert_eq!(session.isolation, Some(IsolationLevel::Serializable));
        } else {
            panic!("Session configuration not found");
        }
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config("[database]\npath = \":memory:\"\n").unwrap();
        assert!(config.session.is_none());

        let mut session = config.open_session();
        assert!(session.is_closed());
        assert_eq!(session.encoder().encode("t"), "\"t\"");
        session.open().unwrap();
        assert!(!session.is_closed());
    }

    #[test]
    fn test_config_session_applies_settings() {
        let config = parse_config(SAMPLE_CONFIG).unwrap();
        let mut session = config.open_session();
        assert_eq!(session.encoder().encode("t"), "`t`");
        session.begin_transaction().unwrap();
        assert!(session.is_in_transaction());
        session.close();
    }

    #[test]
    fn test_invalid_config_is_configuration_error() {
        match parse_config("[session]\ndialect = \"oracle\"\n") {
            Err(OrmError::Configuration(_)) => {}
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE_CONFIG).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.database.busy_timeout_ms, Some(5000));

        assert!(matches!(
            load_config("/nonexistent/rowbind.toml"),
            Err(OrmError::Io(_))
        ));
    }

    #[test]
    fn test_default_config_path_shape() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("rowbind/config.toml"));
        }
    }
}
