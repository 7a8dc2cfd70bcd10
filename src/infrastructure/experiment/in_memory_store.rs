//! In-memory implementation of the experiment store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::domain::experiment::{
    CreateExperimentRequest, Experiment, ExperimentId, ExperimentName, ExperimentStore, Variant,
    VariantId,
};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_lifecycle;

/// Experiment row without its variants
#[derive(Debug, Clone)]
struct ExperimentRow {
    id: ExperimentId,
    name: ExperimentName,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

/// Mirrors the relational layout: experiments, a unique name index, and
/// variant rows keyed by their owning experiment.
#[derive(Debug, Default)]
struct Tables {
    experiments: HashMap<ExperimentId, ExperimentRow>,
    names: HashMap<ExperimentName, ExperimentId>,
    variants: HashMap<ExperimentId, Vec<Variant>>,
}

impl Tables {
    fn assemble(&self, id: &ExperimentId) -> Option<Experiment> {
        let row = self.experiments.get(id)?;
        let variants = self.variants.get(id).cloned().unwrap_or_default();

        Some(Experiment::from_parts(
            row.id,
            row.name.clone(),
            row.created_at,
            row.finished_at,
            variants,
        ))
    }

    fn insert(&mut self, experiment: &Experiment) {
        let id = experiment.id();

        self.experiments.insert(
            id,
            ExperimentRow {
                id,
                name: experiment.name().clone(),
                created_at: experiment.created_at(),
                finished_at: experiment.finished_at(),
            },
        );
        self.names.insert(experiment.name().clone(), id);
        self.variants.insert(id, experiment.variants().to_vec());
    }
}

/// Thread-safe in-memory experiment store.
///
/// All tables sit behind one `RwLock`: every write is a single-writer
/// transaction and every read sees a consistent snapshot. Data is lost when
/// the process terminates.
#[derive(Debug, Default)]
pub struct InMemoryExperimentStore {
    tables: RwLock<Tables>,
}

impl InMemoryExperimentStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, DomainError> {
        self.tables
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, DomainError> {
        self.tables
            .write()
            .map_err(|e| DomainError::internal(format!("Failed to acquire write lock: {}", e)))
    }

    fn not_found(id: &ExperimentId) -> DomainError {
        DomainError::not_found(format!("Experiment '{}' not found", id))
    }
}

#[async_trait]
impl ExperimentStore for InMemoryExperimentStore {
    async fn create(&self, request: CreateExperimentRequest) -> Result<Experiment, DomainError> {
        let experiment = Experiment::create(request, Utc::now())?;
        let mut tables = self.write()?;

        if tables.names.contains_key(experiment.name()) {
            warn!(name = %experiment.name(), "Rejected duplicate experiment name");
            return Err(DomainError::duplicate_name(experiment.name().as_str()));
        }

        tables.insert(&experiment);
        info!(experiment_id = %experiment.id(), name = %experiment.name(), "Experiment created");
        record_lifecycle("created");

        Ok(experiment)
    }

    async fn get(&self, id: &ExperimentId) -> Result<Option<Experiment>, DomainError> {
        Ok(self.read()?.assemble(id))
    }

    async fn get_by_name(&self, name: &ExperimentName) -> Result<Option<Experiment>, DomainError> {
        let tables = self.read()?;

        Ok(tables
            .names
            .get(name)
            .and_then(|id| tables.assemble(id)))
    }

    async fn list(&self) -> Result<Vec<Experiment>, DomainError> {
        let tables = self.read()?;

        let mut results: Vec<_> = tables
            .experiments
            .keys()
            .filter_map(|id| tables.assemble(id))
            .collect();

        results.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.name().cmp(b.name()))
        });

        Ok(results)
    }

    async fn list_variants(&self, experiment_id: &ExperimentId) -> Result<Vec<Variant>, DomainError> {
        let tables = self.read()?;

        let mut variants = tables
            .variants
            .get(experiment_id)
            .cloned()
            .unwrap_or_default();
        variants.sort_by_key(|v| (v.position(), v.id()));

        Ok(variants)
    }

    async fn finish(&self, id: &ExperimentId) -> Result<Experiment, DomainError> {
        let mut tables = self.write()?;
        let mut experiment = tables.assemble(id).ok_or_else(|| Self::not_found(id))?;

        experiment.finish(Utc::now())?;

        if let Some(row) = tables.experiments.get_mut(id) {
            row.finished_at = experiment.finished_at();
        }

        info!(experiment_id = %id, "Experiment finished");
        record_lifecycle("finished");
        Ok(experiment)
    }

    async fn delete(&self, id: &ExperimentId) -> Result<(), DomainError> {
        let mut tables = self.write()?;
        let experiment = tables.assemble(id).ok_or_else(|| Self::not_found(id))?;

        if let Err(e) = experiment.ensure_unfinished() {
            warn!(experiment_id = %id, "Rejected delete of finished experiment");
            return Err(e);
        }

        // children first, then the parent row and its name
        let removed = tables.variants.remove(id).map(|v| v.len()).unwrap_or(0);

        if let Some(row) = tables.experiments.remove(id) {
            tables.names.remove(&row.name);
        }

        debug!(experiment_id = %id, removed_variants = removed, "Cascaded variant delete");
        info!(experiment_id = %id, "Experiment deleted");
        record_lifecycle("deleted");

        Ok(())
    }

    async fn rebalance(
        &self,
        id: &ExperimentId,
        weights: Vec<(VariantId, f64)>,
    ) -> Result<Experiment, DomainError> {
        let mut tables = self.write()?;
        let mut experiment = tables.assemble(id).ok_or_else(|| Self::not_found(id))?;

        experiment.rebalance(&weights)?;
        tables
            .variants
            .insert(*id, experiment.variants().to_vec());

        info!(experiment_id = %id, "Experiment rebalanced");
        record_lifecycle("rebalanced");
        Ok(experiment)
    }
}
