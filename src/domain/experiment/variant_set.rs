//! Weighted bucketing over an experiment's variants

use std::collections::HashSet;

use super::entity::VariantId;
use super::validation::{validate_weight_sum, ExperimentValidationError};
use crate::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bucket {
    variant_id: VariantId,
    weight: f64,
    /// Exclusive upper bound of this variant's cumulative interval
    upper: f64,
}

/// Immutable, validated distribution of traffic across variants.
///
/// The order of construction is the bucketing order: variant `i` owns the
/// half-open interval `[sum(w[..i]), sum(w[..=i]))` of the unit range.
/// Stores hand variants over sorted by position, so a given sample maps to
/// the same variant in every process.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSet {
    buckets: Vec<Bucket>,
    /// Index of the last variant with positive weight; absorbs samples that
    /// fall past the final cumulative bound due to rounding.
    last_positive: usize,
}

impl VariantSet {
    /// Build and validate a variant set.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidDistribution`] if the set is empty, a variant is
    /// repeated, any weight is negative or non-finite, or the weights do not
    /// sum to 1.0 within the configured epsilon.
    pub fn new(
        weights: impl IntoIterator<Item = (VariantId, f64)>,
    ) -> Result<Self, DomainError> {
        let entries: Vec<(VariantId, f64)> = weights.into_iter().collect();

        let mut seen = HashSet::with_capacity(entries.len());
        for (id, _) in &entries {
            if !seen.insert(*id) {
                return Err(ExperimentValidationError::DuplicateVariantId(id.to_string()).into());
            }
        }

        let raw: Vec<f64> = entries.iter().map(|(_, w)| *w).collect();
        validate_weight_sum(&raw)?;

        let mut cumulative = 0.0;
        let buckets: Vec<Bucket> = entries
            .into_iter()
            .map(|(variant_id, weight)| {
                cumulative += weight;
                Bucket {
                    variant_id,
                    weight,
                    upper: cumulative,
                }
            })
            .collect();

        let last_positive = buckets
            .iter()
            .rposition(|b| b.weight > 0.0)
            .ok_or_else(|| DomainError::invalid_distribution("all variant weights are zero"))?;

        Ok(Self {
            buckets,
            last_positive,
        })
    }

    /// Variant whose cumulative interval contains `r`.
    ///
    /// `r` is expected in `[0, 1)`; values outside are clamped and NaN is
    /// treated as 0. Zero-weight variants are never returned.
    pub fn lookup(&self, r: f64) -> VariantId {
        let r = if r.is_nan() { 0.0 } else { r.clamp(0.0, 1.0) };

        let idx = self.buckets.partition_point(|b| b.upper <= r);

        match self.buckets.get(idx) {
            Some(bucket) if idx <= self.last_positive => bucket.variant_id,
            _ => self.buckets[self.last_positive].variant_id,
        }
    }

    /// Number of variants, including zero-weight ones
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Always false for a constructed set; present for API symmetry
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Weight configured for a variant
    pub fn weight_of(&self, id: VariantId) -> Option<f64> {
        self.buckets
            .iter()
            .find(|b| b.variant_id == id)
            .map(|b| b.weight)
    }

    /// Variants and weights in bucketing order
    pub fn iter(&self) -> impl Iterator<Item = (VariantId, f64)> + '_ {
        self.buckets.iter().map(|b| (b.variant_id, b.weight))
    }
}
