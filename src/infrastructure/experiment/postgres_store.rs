//! PostgreSQL-backed experiment store

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{PgConnection, Postgres, QueryBuilder, Row, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::experiment::{
    CreateExperimentRequest, Experiment, ExperimentId, ExperimentName, ExperimentStore, Variant,
    VariantData, VariantId,
};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_lifecycle;
use crate::infrastructure::storage::postgres::{is_unique_violation, map_sqlx_error};

const CREATE_EXPERIMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS experiments (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TIMESTAMPTZ NOT NULL,
    finished_at TIMESTAMPTZ NULL
)
"#;

const CREATE_VARIANTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS experiment_variants (
    id UUID PRIMARY KEY,
    experiment_id UUID NOT NULL REFERENCES experiments(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    data TEXT NOT NULL,
    distribution DOUBLE PRECISION NOT NULL,
    UNIQUE (experiment_id, position)
)
"#;

const SELECT_EXPERIMENT_BY_ID: &str =
    "SELECT id, name, created_at, finished_at FROM experiments WHERE id = $1";

const SELECT_EXPERIMENT_BY_ID_FOR_UPDATE: &str =
    "SELECT id, name, created_at, finished_at FROM experiments WHERE id = $1 FOR UPDATE";

const SELECT_EXPERIMENT_BY_NAME: &str =
    "SELECT id, name, created_at, finished_at FROM experiments WHERE name = $1";

const SELECT_ALL_EXPERIMENTS: &str =
    "SELECT id, name, created_at, finished_at FROM experiments ORDER BY created_at, name";

const SELECT_VARIANTS: &str = r#"
SELECT id, experiment_id, position, data, distribution
FROM experiment_variants
WHERE experiment_id = $1
ORDER BY position, id
"#;

const SELECT_ALL_VARIANTS: &str = r#"
SELECT id, experiment_id, position, data, distribution
FROM experiment_variants
ORDER BY experiment_id, position, id
"#;

/// Row of the `experiments` table before its variants are attached
struct ExperimentRow {
    id: ExperimentId,
    name: ExperimentName,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl ExperimentRow {
    fn decode(row: &PgRow) -> Result<Self, DomainError> {
        let id: Uuid = row.try_get("id").map_err(|e| decode_error("id", e))?;
        let name: String = row.try_get("name").map_err(|e| decode_error("name", e))?;
        let created_at = row
            .try_get("created_at")
            .map_err(|e| decode_error("created_at", e))?;
        let finished_at = row
            .try_get("finished_at")
            .map_err(|e| decode_error("finished_at", e))?;

        let name = ExperimentName::new(&name).map_err(|e| {
            DomainError::internal(format!("Stored experiment name is invalid: {}", e))
        })?;

        Ok(Self {
            id: ExperimentId::from(id),
            name,
            created_at,
            finished_at,
        })
    }

    fn with_variants(self, variants: Vec<Variant>) -> Experiment {
        Experiment::from_parts(
            self.id,
            self.name,
            self.created_at,
            self.finished_at,
            variants,
        )
    }
}

fn decode_variant(row: &PgRow) -> Result<Variant, DomainError> {
    let id: Uuid = row.try_get("id").map_err(|e| decode_error("id", e))?;
    let experiment_id: Uuid = row
        .try_get("experiment_id")
        .map_err(|e| decode_error("experiment_id", e))?;
    let position: i32 = row
        .try_get("position")
        .map_err(|e| decode_error("position", e))?;
    let data: String = row.try_get("data").map_err(|e| decode_error("data", e))?;
    let weight: f64 = row
        .try_get("distribution")
        .map_err(|e| decode_error("distribution", e))?;

    let position = u32::try_from(position)
        .map_err(|_| DomainError::internal(format!("Stored variant position {} is negative", position)))?;
    let data = VariantData::new(data)
        .map_err(|e| DomainError::internal(format!("Stored variant data is invalid: {}", e)))?;

    Ok(Variant::new(
        VariantId::from(id),
        ExperimentId::from(experiment_id),
        position,
        data,
        weight,
    ))
}

fn decode_error(column: &str, err: sqlx::Error) -> DomainError {
    map_sqlx_error(&format!("Failed to decode column '{}'", column), err)
}

/// PostgreSQL experiment store.
///
/// Writes run in a transaction holding a row lock on the experiment;
/// reads run in a read-only REPEATABLE READ transaction so the experiment
/// row and its variants come from one snapshot.
#[derive(Debug, Clone)]
pub struct PostgresExperimentStore {
    pool: PgPool,
}

impl PostgresExperimentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables if they do not exist
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        for statement in [CREATE_EXPERIMENTS_TABLE, CREATE_VARIANTS_TABLE] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("Failed to create experiment tables", e))?;
        }

        info!("Experiment schema ensured");
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, DomainError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to begin transaction", e))
    }

    async fn begin_snapshot(&self) -> Result<Transaction<'static, Postgres>, DomainError> {
        let mut tx = self.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to start snapshot", e))?;

        Ok(tx)
    }

    async fn commit(tx: Transaction<'static, Postgres>) -> Result<(), DomainError> {
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit transaction", e))
    }

    async fn fetch_variants(
        conn: &mut PgConnection,
        id: ExperimentId,
    ) -> Result<Vec<Variant>, DomainError> {
        let rows = sqlx::query(SELECT_VARIANTS)
            .bind(id.into_inner())
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("Failed to load variants", e))?;

        rows.iter().map(decode_variant).collect()
    }

    async fn fetch_experiment(
        conn: &mut PgConnection,
        query: &'static str,
        bind: ExperimentKey<'_>,
    ) -> Result<Option<Experiment>, DomainError> {
        let query = sqlx::query(query);
        let query = match bind {
            ExperimentKey::Id(id) => query.bind(id.into_inner()),
            ExperimentKey::Name(name) => query.bind(name.as_str().to_string()),
        };

        let row = query
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("Failed to load experiment", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let row = ExperimentRow::decode(&row)?;
        let variants = Self::fetch_variants(conn, row.id).await?;

        Ok(Some(row.with_variants(variants)))
    }

    async fn lock_experiment(
        conn: &mut PgConnection,
        id: &ExperimentId,
    ) -> Result<Experiment, DomainError> {
        Self::fetch_experiment(conn, SELECT_EXPERIMENT_BY_ID_FOR_UPDATE, ExperimentKey::Id(*id))
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Experiment '{}' not found", id)))
    }

    async fn snapshot_read(
        &self,
        query: &'static str,
        bind: ExperimentKey<'_>,
    ) -> Result<Option<Experiment>, DomainError> {
        let mut tx = self.begin_snapshot().await?;
        let experiment = Self::fetch_experiment(&mut *tx, query, bind).await?;
        Self::commit(tx).await?;

        Ok(experiment)
    }
}

enum ExperimentKey<'a> {
    Id(ExperimentId),
    Name(&'a ExperimentName),
}

#[async_trait]
impl ExperimentStore for PostgresExperimentStore {
    async fn create(&self, request: CreateExperimentRequest) -> Result<Experiment, DomainError> {
        let experiment = Experiment::create(request, Utc::now())?;
        let mut tx = self.begin().await?;

        sqlx::query(
            "INSERT INTO experiments (id, name, created_at, finished_at) VALUES ($1, $2, $3, NULL)",
        )
        .bind(experiment.id().into_inner())
        .bind(experiment.name().as_str().to_string())
        .bind(experiment.created_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                warn!(name = %experiment.name(), "Experiment name already exists");
                DomainError::duplicate_name(experiment.name().as_str())
            } else {
                map_sqlx_error("Failed to insert experiment", e)
            }
        })?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO experiment_variants (id, experiment_id, position, data, distribution) ",
        );
        builder.push_values(experiment.variants(), |mut b, variant| {
            b.push_bind(variant.id().into_inner())
                .push_bind(variant.experiment_id().into_inner())
                .push_bind(variant.position() as i32)
                .push_bind(variant.data().as_str().to_string())
                .push_bind(variant.weight());
        });

        builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to insert variants", e))?;

        Self::commit(tx).await?;

        info!(
            experiment_id = %experiment.id(),
            name = %experiment.name(),
            variants = experiment.variants().len(),
            "Created experiment"
        );
        record_lifecycle("created");

        Ok(experiment)
    }

    async fn get(&self, id: &ExperimentId) -> Result<Option<Experiment>, DomainError> {
        debug!(experiment_id = %id, "Getting experiment");
        self.snapshot_read(SELECT_EXPERIMENT_BY_ID, ExperimentKey::Id(*id))
            .await
    }

    async fn get_by_name(&self, name: &ExperimentName) -> Result<Option<Experiment>, DomainError> {
        debug!(name = %name, "Getting experiment by name");
        self.snapshot_read(SELECT_EXPERIMENT_BY_NAME, ExperimentKey::Name(name))
            .await
    }

    async fn list(&self) -> Result<Vec<Experiment>, DomainError> {
        let mut tx = self.begin_snapshot().await?;

        let experiment_rows = sqlx::query(SELECT_ALL_EXPERIMENTS)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to list experiments", e))?;

        let variant_rows = sqlx::query(SELECT_ALL_VARIANTS)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to list variants", e))?;

        Self::commit(tx).await?;

        let mut variants: HashMap<ExperimentId, Vec<Variant>> = HashMap::new();
        for row in &variant_rows {
            let variant = decode_variant(row)?;
            variants
                .entry(variant.experiment_id())
                .or_default()
                .push(variant);
        }

        experiment_rows
            .iter()
            .map(|row| {
                let row = ExperimentRow::decode(row)?;
                let owned = variants.remove(&row.id).unwrap_or_default();
                Ok(row.with_variants(owned))
            })
            .collect()
    }

    async fn list_variants(&self, experiment_id: &ExperimentId) -> Result<Vec<Variant>, DomainError> {
        let mut tx = self.begin_snapshot().await?;
        let variants = Self::fetch_variants(&mut *tx, *experiment_id).await?;
        Self::commit(tx).await?;

        Ok(variants)
    }

    async fn finish(&self, id: &ExperimentId) -> Result<Experiment, DomainError> {
        let mut tx = self.begin().await?;
        let mut experiment = Self::lock_experiment(&mut *tx, id).await?;

        experiment.finish(Utc::now())?;

        sqlx::query("UPDATE experiments SET finished_at = $1 WHERE id = $2")
            .bind(experiment.finished_at())
            .bind(id.into_inner())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to finish experiment", e))?;

        Self::commit(tx).await?;

        info!(experiment_id = %id, name = %experiment.name(), "Finished experiment");
        record_lifecycle("finished");

        Ok(experiment)
    }

    async fn delete(&self, id: &ExperimentId) -> Result<(), DomainError> {
        let mut tx = self.begin().await?;
        let experiment = Self::lock_experiment(&mut *tx, id).await?;

        if let Err(e) = experiment.ensure_unfinished() {
            warn!(experiment_id = %id, "Rejected delete of finished experiment");
            return Err(e);
        }

        sqlx::query("DELETE FROM experiment_variants WHERE experiment_id = $1")
            .bind(id.into_inner())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to delete variants", e))?;

        sqlx::query("DELETE FROM experiments WHERE id = $1")
            .bind(id.into_inner())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to delete experiment", e))?;

        Self::commit(tx).await?;

        info!(experiment_id = %id, name = %experiment.name(), "Deleted experiment");
        record_lifecycle("deleted");

        Ok(())
    }

    async fn rebalance(
        &self,
        id: &ExperimentId,
        weights: Vec<(VariantId, f64)>,
    ) -> Result<Experiment, DomainError> {
        let mut tx = self.begin().await?;
        let mut experiment = Self::lock_experiment(&mut *tx, id).await?;

        experiment.rebalance(&weights)?;

        for variant in experiment.variants() {
            sqlx::query(
                "UPDATE experiment_variants SET distribution = $1 WHERE id = $2 AND experiment_id = $3",
            )
            .bind(variant.weight())
            .bind(variant.id().into_inner())
            .bind(id.into_inner())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to update variant weight", e))?;
        }

        Self::commit(tx).await?;

        info!(experiment_id = %id, name = %experiment.name(), "Rebalanced experiment");
        record_lifecycle("rebalanced");

        Ok(experiment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::NewVariant;
    use crate::infrastructure::storage::postgres::PostgresConfig;

    #[test]
    fn test_variant_table_cascades_from_experiments() {
        assert!(CREATE_VARIANTS_TABLE.contains("REFERENCES experiments(id) ON DELETE CASCADE"));
        assert!(CREATE_VARIANTS_TABLE.contains("UNIQUE (experiment_id, position)"));
        assert!(CREATE_EXPERIMENTS_TABLE.contains("name TEXT NOT NULL UNIQUE"));
    }

    #[test]
    fn test_writes_lock_the_experiment_row() {
        assert!(SELECT_EXPERIMENT_BY_ID_FOR_UPDATE.ends_with("FOR UPDATE"));
        assert!(!SELECT_EXPERIMENT_BY_ID.contains("FOR UPDATE"));
    }

    #[test]
    fn test_variants_are_read_in_position_order() {
        assert!(SELECT_VARIANTS.contains("ORDER BY position, id"));
    }

    #[tokio::test]
    async fn test_unreachable_database_is_storage_unavailable() {
        let config = PostgresConfig {
            url: "postgres://abexp@127.0.0.1:1/abexp".to_string(),
            min_connections: 0,
            connect_timeout_secs: 2,
            ..Default::default()
        };
        let pool = config.connect_lazy().unwrap();
        let store = PostgresExperimentStore::new(pool);

        let result = store.get(&ExperimentId::generate()).await;

        let err = result.unwrap_err();
        assert!(err.is_transient(), "expected transient error, got {:?}", err);
    }

    // The tests below run against a live database:
    // DATABASE_URL=postgres://... cargo test -- --ignored

    async fn database_store() -> Option<PostgresExperimentStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let config = PostgresConfig {
            url,
            ..Default::default()
        };
        let pool = config.connect().await.unwrap();
        let store = PostgresExperimentStore::new(pool);
        store.ensure_schema().await.unwrap();
        Some(store)
    }

    fn request(prefix: &str, weights: &[f64]) -> CreateExperimentRequest {
        let name = format!("{}-{}", prefix, Uuid::new_v4());
        CreateExperimentRequest::new(
            ExperimentName::new(&name).unwrap(),
            weights
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    NewVariant::new(
                        VariantData::new(format!("v{}", i)).unwrap(),
                        *w,
                    )
                })
                .collect(),
        )
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_duplicate_name_leaves_first_intact() {
        let Some(store) = database_store().await else {
            return;
        };
        let first = store.create(request("dup", &[0.5, 0.5])).await.unwrap();

        let again = CreateExperimentRequest::new(
            first.name().clone(),
            vec![NewVariant::new(
                VariantData::new("other").unwrap(),
                1.0,
            )],
        );
        let result = store.create(again).await;

        assert!(matches!(result, Err(DomainError::DuplicateName { .. })));
        let stored = store.get_by_name(first.name()).await.unwrap().unwrap();
        assert_eq!(stored.id(), first.id());
        assert_eq!(store.list_variants(&first.id()).await.unwrap().len(), 2);

        store.delete(&first.id()).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_delete_cascades_to_variants() {
        let Some(store) = database_store().await else {
            return;
        };
        let experiment = store.create(request("cascade", &[0.2, 0.8])).await.unwrap();

        store.delete(&experiment.id()).await.unwrap();

        assert!(store.get(&experiment.id()).await.unwrap().is_none());
        assert!(store.list_variants(&experiment.id()).await.unwrap().is_empty());
        let result = store.delete(&experiment.id()).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_finish_is_terminal() {
        let Some(store) = database_store().await else {
            return;
        };
        let experiment = store.create(request("finish", &[1.0])).await.unwrap();

        let finished = store.finish(&experiment.id()).await.unwrap();
        assert!(finished.is_finished());

        let result = store.finish(&experiment.id()).await;
        assert!(matches!(result, Err(DomainError::AlreadyFinished { .. })));

        let result = store.delete(&experiment.id()).await;
        assert!(matches!(result, Err(DomainError::ExperimentFinished { .. })));

        let stored = store.get(&experiment.id()).await.unwrap().unwrap();
        assert!(stored.is_finished());
        assert_eq!(store.list_variants(&experiment.id()).await.unwrap().len(), 1);
        assert!(store.load_active(experiment.name()).await.is_err());
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_rebalance_replaces_weights() {
        let Some(store) = database_store().await else {
            return;
        };
        let experiment = store.create(request("rebalance", &[0.5, 0.5])).await.unwrap();
        let a = experiment.variants()[0].id();
        let b = experiment.variants()[1].id();

        let result = store.rebalance(&experiment.id(), vec![(a, 0.5), (b, 0.6)]).await;
        assert!(matches!(result, Err(DomainError::InvalidDistribution { .. })));

        store
            .rebalance(&experiment.id(), vec![(a, 0.1), (b, 0.9)])
            .await
            .unwrap();

        let variants = store.list_variants(&experiment.id()).await.unwrap();
        assert_eq!(variants[0].id(), a);
        assert_eq!(variants[0].weight(), 0.1);
        assert_eq!(variants[1].weight(), 0.9);

        store.delete(&experiment.id()).await.unwrap();
    }
}
