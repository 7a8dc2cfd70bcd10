//! Experiment domain entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use super::validation::{
    validate_experiment_name, validate_participant_id, validate_variant_data,
    ExperimentValidationError,
};
use super::variant_set::VariantSet;
use crate::domain::DomainError;

// ============================================================================
// ExperimentId
// ============================================================================

/// Unique identifier for an experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentId(Uuid);

impl ExperimentId {
    /// Generate a fresh random ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an ID from its hyphenated form
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        Uuid::try_parse(raw.trim())
            .map(Self)
            .map_err(|_| DomainError::validation(format!("'{}' is not a valid experiment ID", raw)))
    }

    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for ExperimentId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// VariantId
// ============================================================================

/// Unique identifier for a variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(Uuid);

impl VariantId {
    /// Generate a fresh random ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an ID from its hyphenated form
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        Uuid::try_parse(raw.trim())
            .map(Self)
            .map_err(|_| DomainError::validation(format!("'{}' is not a valid variant ID", raw)))
    }

    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for VariantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ExperimentName
// ============================================================================

/// Always-valid experiment name (trimmed, non-empty)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExperimentName(String);

impl ExperimentName {
    pub fn new(raw: &str) -> Result<Self, ExperimentValidationError> {
        validate_experiment_name(raw).map(|name| Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ExperimentName {
    type Error = ExperimentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<ExperimentName> for String {
    fn from(name: ExperimentName) -> Self {
        name.0
    }
}

impl fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ExperimentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// ParticipantId
// ============================================================================

/// Identity of whoever is being bucketed (user, device, session)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(raw: &str) -> Result<Self, ExperimentValidationError> {
        validate_participant_id(raw).map(|id| Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = ExperimentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<ParticipantId> for String {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// VariantData
// ============================================================================

/// Opaque serialized payload owned by the caller.
///
/// The engine stores and returns it unchanged and never inspects its
/// contents; interpretation belongs to whatever feature-flag or config
/// system consumes the assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariantData(String);

impl VariantData {
    pub fn new(raw: impl Into<String>) -> Result<Self, ExperimentValidationError> {
        let raw = raw.into();
        validate_variant_data(&raw)?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VariantData {
    type Error = ExperimentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VariantData> for String {
    fn from(data: VariantData) -> Self {
        data.0
    }
}

impl fmt::Display for VariantData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Variant
// ============================================================================

/// One treatment arm of an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    id: VariantId,
    experiment_id: ExperimentId,
    position: u32,
    data: VariantData,
    weight: f64,
}

impl Variant {
    pub fn new(
        id: VariantId,
        experiment_id: ExperimentId,
        position: u32,
        data: VariantData,
        weight: f64,
    ) -> Self {
        Self {
            id,
            experiment_id,
            position,
            data,
            weight,
        }
    }

    pub fn id(&self) -> VariantId {
        self.id
    }

    pub fn experiment_id(&self) -> ExperimentId {
        self.experiment_id
    }

    /// Creation order within the experiment; the stable bucketing key
    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn data(&self) -> &VariantData {
        &self.data
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// A variant as supplied by the caller, before identity is assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVariant {
    pub data: VariantData,
    pub weight: f64,
}

impl NewVariant {
    pub fn new(data: VariantData, weight: f64) -> Self {
        Self { data, weight }
    }
}

/// Data required to create an [`Experiment`]
#[derive(Debug, Clone, PartialEq)]
pub struct CreateExperimentRequest {
    name: ExperimentName,
    variants: Vec<NewVariant>,
}

impl CreateExperimentRequest {
    pub fn new(name: ExperimentName, variants: Vec<NewVariant>) -> Self {
        Self { name, variants }
    }

    pub fn name(&self) -> &ExperimentName {
        &self.name
    }

    pub fn variants(&self) -> &[NewVariant] {
        &self.variants
    }
}

// ============================================================================
// Experiment
// ============================================================================

/// A named experiment together with its variant set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    id: ExperimentId,
    name: ExperimentName,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finished_at: Option<DateTime<Utc>>,
    variants: Vec<Variant>,
}

impl Experiment {
    /// Build a new unfinished experiment from a create request.
    ///
    /// Variants receive fresh IDs and positions in request order, and the
    /// distribution is validated before anything is returned.
    pub fn create(
        request: CreateExperimentRequest,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let id = ExperimentId::generate();
        let variants: Vec<Variant> = request
            .variants
            .into_iter()
            .enumerate()
            .map(|(position, v)| {
                Variant::new(VariantId::generate(), id, position as u32, v.data, v.weight)
            })
            .collect();

        let experiment = Self {
            id,
            name: request.name,
            created_at: now,
            finished_at: None,
            variants,
        };

        experiment.variant_set()?;

        Ok(experiment)
    }

    /// Reassemble an experiment from persisted rows. Variants are sorted by
    /// position so the bucketing order does not depend on row order.
    pub fn from_parts(
        id: ExperimentId,
        name: ExperimentName,
        created_at: DateTime<Utc>,
        finished_at: Option<DateTime<Utc>>,
        mut variants: Vec<Variant>,
    ) -> Self {
        variants.sort_by_key(|v| (v.position, v.id));

        Self {
            id,
            name,
            created_at,
            finished_at,
            variants,
        }
    }

    pub fn id(&self) -> ExperimentId {
        self.id
    }

    pub fn name(&self) -> &ExperimentName {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn variant(&self, id: VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    /// Validated bucketing view of the variants, in position order
    pub fn variant_set(&self) -> Result<VariantSet, DomainError> {
        VariantSet::new(self.variants.iter().map(|v| (v.id, v.weight)))
    }

    /// Reject any transition out of the finished state
    pub fn ensure_unfinished(&self) -> Result<(), DomainError> {
        if self.is_finished() {
            return Err(DomainError::experiment_finished(self.name.as_str()));
        }

        Ok(())
    }

    /// One-time transition to finished
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.is_finished() {
            return Err(DomainError::already_finished(self.id.to_string()));
        }

        self.finished_at = Some(now);
        Ok(())
    }

    /// Replace every variant weight at once.
    ///
    /// `weights` must name each variant of the experiment exactly once. On any
    /// error the experiment is left untouched.
    pub fn rebalance(&mut self, weights: &[(VariantId, f64)]) -> Result<(), DomainError> {
        self.ensure_unfinished()?;

        let mut seen = HashSet::with_capacity(weights.len());

        for (id, _) in weights {
            if !seen.insert(*id) {
                return Err(ExperimentValidationError::DuplicateVariantId(id.to_string()).into());
            }

            if self.variant(*id).is_none() {
                return Err(ExperimentValidationError::VariantMismatch(format!(
                    "unknown variant '{}'",
                    id
                ))
                .into());
            }
        }

        if seen.len() != self.variants.len() {
            return Err(ExperimentValidationError::VariantMismatch(format!(
                "expected {} weights, got {}",
                self.variants.len(),
                seen.len()
            ))
            .into());
        }

        let reweighted: Vec<(VariantId, f64)> = self
            .variants
            .iter()
            .map(|v| {
                let weight = weights
                    .iter()
                    .find(|(id, _)| *id == v.id)
                    .map(|(_, w)| *w)
                    .unwrap_or(v.weight);
                (v.id, weight)
            })
            .collect();

        VariantSet::new(reweighted.iter().copied())?;

        for (variant, (_, weight)) in self.variants.iter_mut().zip(reweighted) {
            variant.weight = weight;
        }

        Ok(())
    }
}
