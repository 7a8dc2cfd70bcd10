//! Domain layer - Core business logic and types

pub mod error;
pub mod experiment;

pub use error::DomainError;
pub use experiment::{
    Assignment, CreateExperimentRequest, Experiment, ExperimentId, ExperimentName,
    ExperimentStore, NewVariant, ParticipantId, Variant, VariantData, VariantId, VariantSet,
};
