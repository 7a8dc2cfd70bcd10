//! Experiment domain module for A/B testing
//!
//! Types and traits for managing experiment lifecycles and the weighted
//! variant sets participants are bucketed into.

mod assignment;
mod entity;
mod store;
mod validation;
mod variant_set;

pub use assignment::Assignment;
pub use entity::{
    CreateExperimentRequest, Experiment, ExperimentId, ExperimentName, NewVariant, ParticipantId,
    Variant, VariantData, VariantId,
};
pub use store::ExperimentStore;
pub use validation::{ExperimentValidationError, DISTRIBUTION_EPSILON};
pub use variant_set::VariantSet;

#[cfg(test)]
pub use store::MockExperimentStore;
