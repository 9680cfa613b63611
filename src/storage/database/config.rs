//! Database source configuration
//!
//! Sources are usually kept in a TOML or YAML file:
//!
//! ```toml
//! [[source]]
//! name = "main"
//! driver = "duckdb"
//! location = "/var/lib/kwcms/main.duckdb"
//! ```

use crate::error::MapperError;
use crate::storage::dialects::DialectKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Driver used to reach the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "sqlserver")]
    MsSql,
    Oracle,
    #[serde(alias = "postgresql", alias = "pgsql")]
    Postgres,
    Sqlite,
    DuckDb,
}

impl Driver {
    /// Dialect of queries the driver understands
    pub fn dialect(&self) -> Result<DialectKind, MapperError> {
        match self {
            Driver::MySql => Ok(DialectKind::MySql),
            Driver::MsSql => Ok(DialectKind::TransactSql),
            Driver::Postgres => Ok(DialectKind::Postgres),
            Driver::Sqlite => Ok(DialectKind::Sqlite),
            Driver::DuckDb => Ok(DialectKind::DuckDb),
            Driver::Oracle => Err(MapperError::UnknownDialect("oracle".to_string())),
        }
    }
}

/// Definition of one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Name the mappers refer to
    pub name: String,
    pub driver: Driver,
    /// Host or file path
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
    /// Seconds to wait for the connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub persistent: bool,
}

impl Config {
    pub fn new(name: impl Into<String>, driver: Driver) -> Self {
        Self {
            name: name.into(),
            driver,
            location: String::new(),
            port: None,
            user: String::new(),
            password: String::new(),
            database: String::new(),
            timeout: None,
            persistent: false,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ConfigDocument {
    #[serde(default, rename = "source")]
    sources: Vec<Config>,
}

/// Configured sources by name
#[derive(Debug, Clone, Default)]
pub struct ConfigStorage {
    configs: HashMap<String, Config>,
}

impl ConfigStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source; an existing source of the same name is replaced
    pub fn add(&mut self, config: Config) -> &mut Self {
        self.configs.insert(config.name.clone(), config);
        self
    }

    pub fn get(&self, source: &str) -> Result<&Config, MapperError> {
        self.configs
            .get(source)
            .ok_or_else(|| MapperError::UnknownSource(source.to_string()))
    }

    pub fn contains(&self, source: &str) -> bool {
        self.configs.contains_key(source)
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, MapperError> {
        let document: ConfigDocument = toml::from_str(content)
            .map_err(|e| MapperError::Config(format!("Failed to parse TOML: {}", e)))?;
        Ok(Self::from_document(document))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, MapperError> {
        let document: ConfigDocument = serde_yaml::from_str(content)
            .map_err(|e| MapperError::Config(format!("Failed to parse YAML: {}", e)))?;
        Ok(Self::from_document(document))
    }

    /// Load sources from a file, format chosen by extension
    pub fn from_file(path: &Path) -> Result<Self, MapperError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MapperError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!("Loading database sources from {}", path.display());
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            other => Err(MapperError::Config(format!(
                "Unsupported configuration format: {}",
                other.unwrap_or("none")
            ))),
        }
    }

    fn from_document(document: ConfigDocument) -> Self {
        let mut storage = Self::new();
        for config in document.sources {
            storage.add(config);
        }
        storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_sources() {
        let storage = ConfigStorage::from_toml_str(
            r#"
            [[source]]
            name = "main"
            driver = "postgresql"
            location = "db.example.org"
            port = 5432
            user = "kwcms"
            database = "site"

            [[source]]
            name = "local"
            driver = "duckdb"
            "#,
        )
        .unwrap();
        let main = storage.get("main").unwrap();
        assert_eq!(main.driver, Driver::Postgres);
        assert_eq!(main.port, Some(5432));
        assert!(!main.persistent);
        assert_eq!(storage.get("local").unwrap().location, "");
        assert!(matches!(
            storage.get("other"),
            Err(MapperError::UnknownSource(_))
        ));
    }

    #[test]
    fn test_yaml_sources() {
        let storage = ConfigStorage::from_yaml_str(
            "source:\n  - name: legacy\n    driver: mysql\n    timeout: 30\n    persistent: true\n",
        )
        .unwrap();
        let legacy = storage.get("legacy").unwrap();
        assert_eq!(legacy.driver.dialect().unwrap(), DialectKind::MySql);
        assert_eq!(legacy.timeout, Some(30));
        assert!(legacy.persistent);
        assert!(ConfigStorage::from_yaml_str("source: 12").is_err());
    }

    #[test]
    fn test_oracle_has_no_dialect() {
        assert!(Driver::Oracle.dialect().is_err());
    }
}
