//! Assignment engine
//!
//! Resolves a participant to one variant of a named experiment. The engine is
//! stateless apart from the injected store, so clones can be shared freely
//! across tasks.

use std::sync::Arc;

use tracing::debug;

use crate::domain::experiment::{
    Assignment, Experiment, ExperimentName, ExperimentStore, ParticipantId, VariantSet,
};
use crate::domain::DomainError;
use crate::infrastructure::experiment::AssignmentHasher;
use crate::infrastructure::observability::{record_assignment, record_assignment_error};

/// Deterministic variant assignment over an [`ExperimentStore`]
#[derive(Debug)]
pub struct AssignmentEngine<S: ExperimentStore + ?Sized> {
    store: Arc<S>,
}

impl<S: ExperimentStore + ?Sized> Clone for AssignmentEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ExperimentStore + ?Sized> AssignmentEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    /// Assign a participant to a variant of the named experiment.
    ///
    /// The same participant always receives the same variant for as long as
    /// the experiment's weights are unchanged.
    ///
    /// # Errors
    ///
    /// - [`DomainError::Validation`] for a blank name or participant id
    /// - [`DomainError::NotFound`] if no experiment has this name
    /// - [`DomainError::ExperimentFinished`] if the experiment is finished
    /// - [`DomainError::StorageUnavailable`] if the store cannot be reached
    pub async fn assign(
        &self,
        experiment_name: &str,
        participant_id: &str,
    ) -> Result<Assignment, DomainError> {
        let result = self.resolve(experiment_name, participant_id).await;

        match &result {
            Ok(assignment) => record_assignment(assignment.experiment_name.as_str()),
            Err(e) => {
                debug!(
                    experiment = %experiment_name,
                    error = %e,
                    "Assignment failed"
                );
                record_assignment_error(e);
            }
        }

        result
    }

    /// Assign a participant to every unfinished experiment, oldest first
    pub async fn assign_all(&self, participant_id: &str) -> Result<Vec<Assignment>, DomainError> {
        let participant = ParticipantId::new(participant_id)?;
        let experiments = self.store.list_active().await?;

        let mut assignments = Vec::with_capacity(experiments.len());

        for experiment in &experiments {
            let variant_set = experiment.variant_set()?;
            let assignment = Self::bucket(experiment, &variant_set, participant.clone())?;

            record_assignment(assignment.experiment_name.as_str());
            assignments.push(assignment);
        }

        debug!(
            participant_id = %participant,
            count = assignments.len(),
            "Assigned participant to active experiments"
        );

        Ok(assignments)
    }

    async fn resolve(
        &self,
        experiment_name: &str,
        participant_id: &str,
    ) -> Result<Assignment, DomainError> {
        let name = ExperimentName::new(experiment_name)?;
        let participant = ParticipantId::new(participant_id)?;

        let (experiment, variant_set) = self.store.load_active(&name).await?;

        Self::bucket(&experiment, &variant_set, participant)
    }

    fn bucket(
        experiment: &Experiment,
        variant_set: &VariantSet,
        participant: ParticipantId,
    ) -> Result<Assignment, DomainError> {
        let r = AssignmentHasher::hash(&experiment.id(), &participant);
        let variant_id = variant_set.lookup(r);

        let variant = experiment.variant(variant_id).ok_or_else(|| {
            DomainError::internal(format!(
                "Variant '{}' missing from experiment '{}'",
                variant_id,
                experiment.id()
            ))
        })?;

        debug!(
            experiment_id = %experiment.id(),
            variant_id = %variant_id,
            participant_id = %participant,
            hash = r,
            "Assigned variant to participant"
        );

        Ok(Assignment::new(
            experiment.id(),
            experiment.name().clone(),
            participant,
            variant_id,
            variant.data().clone(),
        ))
    }
}
