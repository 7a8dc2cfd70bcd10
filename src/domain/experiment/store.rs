//! Experiment store trait

use async_trait::async_trait;

use super::entity::{CreateExperimentRequest, Experiment, ExperimentId, ExperimentName, Variant, VariantId};
use super::variant_set::VariantSet;
use crate::domain::DomainError;

/// Owner of experiment and variant records.
///
/// Implementations apply every write as a single-writer transaction so no
/// reader ever observes a variant set whose weights are mid-update, and
/// delete cascades to the experiment's variants explicitly.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExperimentStore: Send + Sync {
    /// Persist a new unfinished experiment and its variants.
    ///
    /// # Errors
    ///
    /// - [`DomainError::InvalidDistribution`] if the variants fail validation
    /// - [`DomainError::DuplicateName`] if the name is taken; nothing is written
    async fn create(&self, request: CreateExperimentRequest) -> Result<Experiment, DomainError>;

    /// Get an experiment by ID
    async fn get(&self, id: &ExperimentId) -> Result<Option<Experiment>, DomainError>;

    /// Get an experiment by its unique name
    async fn get_by_name(&self, name: &ExperimentName) -> Result<Option<Experiment>, DomainError>;

    /// All experiments, oldest first
    async fn list(&self) -> Result<Vec<Experiment>, DomainError>;

    /// Variant rows owned by an experiment, in position order. Empty when the
    /// experiment does not exist.
    async fn list_variants(&self, experiment_id: &ExperimentId) -> Result<Vec<Variant>, DomainError>;

    /// Set the finish timestamp.
    ///
    /// # Errors
    ///
    /// - [`DomainError::NotFound`] if the experiment does not exist
    /// - [`DomainError::AlreadyFinished`] if it was finished before
    async fn finish(&self, id: &ExperimentId) -> Result<Experiment, DomainError>;

    /// Delete an unfinished experiment and all of its variants.
    ///
    /// # Errors
    ///
    /// - [`DomainError::NotFound`] if the experiment does not exist
    /// - [`DomainError::ExperimentFinished`] if it is finished; nothing is removed
    async fn delete(&self, id: &ExperimentId) -> Result<(), DomainError>;

    /// Replace the weights of the whole variant set at once.
    ///
    /// # Errors
    ///
    /// - [`DomainError::NotFound`] if the experiment does not exist
    /// - [`DomainError::ExperimentFinished`] if it is finished
    /// - [`DomainError::InvalidDistribution`] if `weights` does not cover the
    ///   variant set exactly or fails validation
    async fn rebalance(
        &self,
        id: &ExperimentId,
        weights: Vec<(VariantId, f64)>,
    ) -> Result<Experiment, DomainError>;

    /// All unfinished experiments, oldest first
    async fn list_active(&self) -> Result<Vec<Experiment>, DomainError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|e| !e.is_finished())
            .collect())
    }

    /// Resolve an experiment that may still serve assignments.
    ///
    /// # Errors
    ///
    /// - [`DomainError::NotFound`] if no experiment has this name
    /// - [`DomainError::ExperimentFinished`] if it has a finish timestamp
    async fn load_active(
        &self,
        name: &ExperimentName,
    ) -> Result<(Experiment, VariantSet), DomainError> {
        let experiment = self
            .get_by_name(name)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Experiment '{}' not found", name)))?;

        if experiment.is_finished() {
            return Err(DomainError::experiment_finished(name.as_str()));
        }

        let variant_set = experiment.variant_set()?;
        Ok((experiment, variant_set))
    }
}
