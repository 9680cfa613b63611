//! Registry of database connections
//!
//! Every source gets one connection, created on first use and shared by
//! all mappers asking for that source afterwards.

use super::{Config, ConfigStorage, Database, Driver};
use crate::error::MapperError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Creates a connection for a configured source
pub type Connector = Arc<dyn Fn(&Config) -> Result<Arc<dyn Database>, MapperError> + Send + Sync>;

pub struct DatabaseRegistry {
    configs: ConfigStorage,
    connectors: HashMap<Driver, Connector>,
    connections: Mutex<HashMap<String, Arc<dyn Database>>>,
}

impl DatabaseRegistry {
    /// Registry over the given sources with the bundled connectors
    pub fn new(configs: ConfigStorage) -> Self {
        #[allow(unused_mut)]
        let mut registry = Self {
            configs,
            connectors: HashMap::new(),
            connections: Mutex::new(HashMap::new()),
        };
        #[cfg(feature = "duckdb-backend")]
        registry.register_connector(Driver::DuckDb, |config| {
            Ok(Arc::new(super::DuckDbDatabase::new(config.clone())) as Arc<dyn Database>)
        });
        registry
    }

    /// Use `connector` for every source with the driver
    pub fn register_connector<F>(&mut self, driver: Driver, connector: F) -> &mut Self
    where
        F: Fn(&Config) -> Result<Arc<dyn Database>, MapperError> + Send + Sync + 'static,
    {
        self.connectors.insert(driver, Arc::new(connector));
        self
    }

    pub fn configs(&self) -> &ConfigStorage {
        &self.configs
    }

    /// Shared connection to the source
    pub fn database(&self, source: &str) -> Result<Arc<dyn Database>, MapperError> {
        let mut connections = self
            .connections
            .lock()
            .map_err(|e| MapperError::Database(format!("Connection registry poisoned: {}", e)))?;
        if let Some(database) = connections.get(source) {
            return Ok(Arc::clone(database));
        }

        let config = self.configs.get(source)?;
        let connector = self
            .connectors
            .get(&config.driver)
            .ok_or_else(|| MapperError::UnknownDriver(format!("{:?}", config.driver)))?;
        debug!("Connecting source {} through {:?}", source, config.driver);
        let database = connector(config)?;
        connections.insert(source.to_string(), Arc::clone(&database));
        Ok(database)
    }

    /// Drop the cached connection, next request connects again
    pub fn disconnect(&self, source: &str) -> Result<(), MapperError> {
        self.connections
            .lock()
            .map_err(|e| MapperError::Database(format!("Connection registry poisoned: {}", e)))?
            .remove(source);
        Ok(())
    }
}

impl std::fmt::Debug for DatabaseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseRegistry")
            .field("configs", &self.configs)
            .field("drivers", &self.connectors.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::testing::RecordingDatabase;
    use crate::storage::dialects::DialectKind;

    fn registry() -> DatabaseRegistry {
        let mut configs = ConfigStorage::new();
        configs
            .add(Config::new("main", Driver::Postgres))
            .add(Config::new("legacy", Driver::Oracle));
        let mut registry = DatabaseRegistry::new(configs);
        registry.register_connector(Driver::Postgres, |config| {
            Ok(Arc::new(RecordingDatabase::new(&config.name, DialectKind::Postgres))
                as Arc<dyn Database>)
        });
        registry
    }

    #[test]
    fn test_one_connection_per_source() {
        let registry = registry();
        let first = registry.database("main").unwrap();
        let second = registry.database("main").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.source(), "main");

        registry.disconnect("main").unwrap();
        let third = registry.database("main").unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_unknown_source_and_driver() {
        let registry = registry();
        assert!(matches!(
            registry.database("nope"),
            Err(MapperError::UnknownSource(_))
        ));
        assert!(matches!(
            registry.database("legacy"),
            Err(MapperError::UnknownDriver(_))
        ));
    }
}
