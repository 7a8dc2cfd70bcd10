//! Storage factory for runtime experiment store selection

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::domain::{DomainError, ExperimentStore};
use crate::infrastructure::experiment::{InMemoryExperimentStore, PostgresExperimentStore};

use super::postgres::PostgresConfig;

/// Supported storage types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    #[default]
    #[serde(alias = "inmemory", alias = "in-memory", alias = "in_memory")]
    Memory,
    /// PostgreSQL storage
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// In-memory storage configuration
    InMemory,
    /// PostgreSQL storage configuration
    Postgres(PostgresConfig),
}

impl StorageConfig {
    /// Creates an in-memory storage configuration
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    /// Creates a PostgreSQL storage configuration
    pub fn postgres(config: PostgresConfig) -> Self {
        Self::Postgres(config)
    }

    /// Returns the storage type
    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::InMemory => StorageType::Memory,
            Self::Postgres(_) => StorageType::Postgres,
        }
    }
}

/// Factory for creating experiment stores
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates an experiment store based on the configuration.
    ///
    /// The PostgreSQL backend connects eagerly and ensures its schema.
    pub async fn create(
        config: &StorageConfig,
    ) -> Result<Arc<dyn ExperimentStore>, DomainError> {
        match config {
            StorageConfig::InMemory => {
                info!("Using in-memory experiment store");
                Ok(Arc::new(InMemoryExperimentStore::new()))
            }
            StorageConfig::Postgres(pg_config) => {
                let store: Arc<dyn ExperimentStore> = Self::create_postgres(pg_config).await?;
                Ok(store)
            }
        }
    }

    /// Creates a PostgreSQL experiment store with its schema in place
    pub async fn create_postgres(
        config: &PostgresConfig,
    ) -> Result<Arc<PostgresExperimentStore>, DomainError> {
        let pool = config.connect().await?;
        let store = PostgresExperimentStore::new(pool);
        store.ensure_schema().await?;

        info!(
            max_connections = config.max_connections,
            "Using PostgreSQL experiment store"
        );
        Ok(Arc::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CreateExperimentRequest, ExperimentName, NewVariant, VariantData};

    #[test]
    fn test_storage_type_deserialize_aliases() {
        let parsed: StorageType = serde_json::from_str("\"pg\"").unwrap();
        assert_eq!(parsed, StorageType::Postgres);

        let parsed: StorageType = serde_json::from_str("\"in-memory\"").unwrap();
        assert_eq!(parsed, StorageType::Memory);
    }

    #[test]
    fn test_storage_config_types() {
        let in_memory = StorageConfig::in_memory();
        assert_eq!(in_memory.storage_type(), StorageType::Memory);

        let postgres = StorageConfig::postgres(PostgresConfig::default());
        assert_eq!(postgres.storage_type(), StorageType::Postgres);
    }

    #[tokio::test]
    async fn test_create_in_memory_store() {
        let store = StorageFactory::create(&StorageConfig::in_memory())
            .await
            .unwrap();

        let request = CreateExperimentRequest::new(
            ExperimentName::new("factory").unwrap(),
            vec![NewVariant::new(VariantData::new("on").unwrap(), 1.0)],
        );
        let created = store.create(request).await.unwrap();

        let fetched = store.get(&created.id()).await.unwrap();
        assert_eq!(fetched, Some(created));
    }
}
