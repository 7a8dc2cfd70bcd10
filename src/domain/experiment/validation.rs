//! Experiment validation utilities

use thiserror::Error;

use crate::domain::DomainError;

/// Maximum length for experiment names
pub const MAX_EXPERIMENT_NAME_LENGTH: usize = 255;

/// Maximum length for participant IDs
pub const MAX_PARTICIPANT_ID_LENGTH: usize = 255;

/// Allowed deviation of the weight sum from 1.0
pub const DISTRIBUTION_EPSILON: f64 = 1e-6;

/// Validation errors for experiments, variants and participants
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExperimentValidationError {
    #[error("Experiment name cannot be empty")]
    EmptyName,

    #[error("Experiment name exceeds maximum length of {0} characters")]
    NameTooLong(usize),

    #[error("Participant ID cannot be empty")]
    EmptyParticipantId,

    #[error("Participant ID exceeds maximum length of {0} characters")]
    ParticipantIdTooLong(usize),

    #[error("Variant data cannot be empty")]
    EmptyVariantData,

    #[error("Experiment must have at least one variant")]
    NoVariants,

    #[error("Variant weight must be a finite number, got {0}")]
    NonFiniteWeight(f64),

    #[error("Variant weight cannot be negative, got {0}")]
    NegativeWeight(f64),

    #[error("Variant weights must sum to 1.0, got {0}")]
    InvalidWeightSum(f64),

    #[error("Duplicate variant ID: '{0}'")]
    DuplicateVariantId(String),

    #[error("Weights must cover exactly the experiment's variants: {0}")]
    VariantMismatch(String),
}

impl ExperimentValidationError {
    /// Whether the error concerns the traffic distribution rather than naming
    pub fn is_distribution_error(&self) -> bool {
        matches!(
            self,
            Self::NoVariants
                | Self::NonFiniteWeight(_)
                | Self::NegativeWeight(_)
                | Self::InvalidWeightSum(_)
                | Self::DuplicateVariantId(_)
                | Self::VariantMismatch(_)
        )
    }
}

impl From<ExperimentValidationError> for DomainError {
    fn from(err: ExperimentValidationError) -> Self {
        if err.is_distribution_error() {
            DomainError::invalid_distribution(err.to_string())
        } else {
            DomainError::validation(err.to_string())
        }
    }
}

/// Validate an experiment name, returning the trimmed form
pub fn validate_experiment_name(name: &str) -> Result<&str, ExperimentValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ExperimentValidationError::EmptyName);
    }

    if trimmed.chars().count() > MAX_EXPERIMENT_NAME_LENGTH {
        return Err(ExperimentValidationError::NameTooLong(
            MAX_EXPERIMENT_NAME_LENGTH,
        ));
    }

    Ok(trimmed)
}

/// Validate a participant ID, returning the trimmed form
pub fn validate_participant_id(id: &str) -> Result<&str, ExperimentValidationError> {
    let trimmed = id.trim();

    if trimmed.is_empty() {
        return Err(ExperimentValidationError::EmptyParticipantId);
    }

    if trimmed.chars().count() > MAX_PARTICIPANT_ID_LENGTH {
        return Err(ExperimentValidationError::ParticipantIdTooLong(
            MAX_PARTICIPANT_ID_LENGTH,
        ));
    }

    Ok(trimmed)
}

/// Validate an opaque variant payload
pub fn validate_variant_data(data: &str) -> Result<(), ExperimentValidationError> {
    if data.is_empty() {
        return Err(ExperimentValidationError::EmptyVariantData);
    }

    Ok(())
}

/// Validate a single variant weight
pub fn validate_weight(weight: f64) -> Result<(), ExperimentValidationError> {
    if !weight.is_finite() {
        return Err(ExperimentValidationError::NonFiniteWeight(weight));
    }

    if weight < 0.0 {
        return Err(ExperimentValidationError::NegativeWeight(weight));
    }

    Ok(())
}

/// Validate that weights sum to 1.0 within [`DISTRIBUTION_EPSILON`]
pub fn validate_weight_sum(weights: &[f64]) -> Result<(), ExperimentValidationError> {
    if weights.is_empty() {
        return Err(ExperimentValidationError::NoVariants);
    }

    for &weight in weights {
        validate_weight(weight)?;
    }

    let sum: f64 = weights.iter().sum();

    if (sum - 1.0).abs() > DISTRIBUTION_EPSILON {
        return Err(ExperimentValidationError::InvalidWeightSum(sum));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert_eq!(validate_experiment_name("price"), Ok("price"));
        assert_eq!(validate_experiment_name("  button color  "), Ok("button color"));
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(
            validate_experiment_name(""),
            Err(ExperimentValidationError::EmptyName)
        );
        assert_eq!(
            validate_experiment_name("   "),
            Err(ExperimentValidationError::EmptyName)
        );
    }

    #[test]
    fn test_name_too_long() {
        let name = "a".repeat(MAX_EXPERIMENT_NAME_LENGTH + 1);
        assert_eq!(
            validate_experiment_name(&name),
            Err(ExperimentValidationError::NameTooLong(
                MAX_EXPERIMENT_NAME_LENGTH
            ))
        );
    }

    #[test]
    fn test_participant_id() {
        assert_eq!(validate_participant_id(" user42 "), Ok("user42"));
        assert_eq!(
            validate_participant_id(""),
            Err(ExperimentValidationError::EmptyParticipantId)
        );
    }

    #[test]
    fn test_variant_data() {
        assert!(validate_variant_data("{\"color\":\"red\"}").is_ok());
        assert_eq!(
            validate_variant_data(""),
            Err(ExperimentValidationError::EmptyVariantData)
        );
    }

    #[test]
    fn test_weights() {
        assert!(validate_weight(0.0).is_ok());
        assert!(validate_weight(0.5).is_ok());
        assert_eq!(
            validate_weight(-0.1),
            Err(ExperimentValidationError::NegativeWeight(-0.1))
        );
        assert!(matches!(
            validate_weight(f64::NAN),
            Err(ExperimentValidationError::NonFiniteWeight(_))
        ));
        assert!(matches!(
            validate_weight(f64::INFINITY),
            Err(ExperimentValidationError::NonFiniteWeight(_))
        ));
    }

    #[test]
    fn test_weight_sum_within_epsilon() {
        assert!(validate_weight_sum(&[0.3, 0.7]).is_ok());
        assert!(validate_weight_sum(&[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]).is_ok());
        assert!(validate_weight_sum(&[0.5, 0.5 + 0.5e-6]).is_ok());
    }

    #[test]
    fn test_weight_sum_outside_epsilon() {
        assert!(matches!(
            validate_weight_sum(&[0.6, 0.415]),
            Err(ExperimentValidationError::InvalidWeightSum(_))
        ));
        assert!(matches!(
            validate_weight_sum(&[0.5, 0.5 - 2e-6]),
            Err(ExperimentValidationError::InvalidWeightSum(_))
        ));
        assert_eq!(
            validate_weight_sum(&[]),
            Err(ExperimentValidationError::NoVariants)
        );
    }

    #[test]
    fn test_domain_error_mapping() {
        let err: DomainError = ExperimentValidationError::InvalidWeightSum(0.9).into();
        assert!(matches!(err, DomainError::InvalidDistribution { .. }));

        let err: DomainError = ExperimentValidationError::EmptyName.into();
        assert!(matches!(err, DomainError::Validation { .. }));
    }
}
