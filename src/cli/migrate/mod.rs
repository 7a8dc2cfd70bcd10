//! Migrate command - ensures the experiment schema exists

use tracing::info;

use crate::infrastructure::storage::{StorageConfig, StorageFactory};

/// Create the experiment tables in the configured store
pub async fn run() -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    match config.storage.to_storage_config() {
        StorageConfig::InMemory => {
            info!("In-memory store configured, nothing to migrate");
        }
        StorageConfig::Postgres(pg_config) => {
            StorageFactory::create_postgres(&pg_config).await?;
            info!("Experiment schema is up to date");
        }
    }

    Ok(())
}
