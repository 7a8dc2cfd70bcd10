//! Assignment of a participant to an experiment variant

use serde::{Deserialize, Serialize};

use super::entity::{ExperimentId, ExperimentName, ParticipantId, VariantData, VariantId};

/// Result of bucketing one participant into one experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub experiment_id: ExperimentId,
    pub experiment_name: ExperimentName,
    pub participant_id: ParticipantId,
    pub variant_id: VariantId,
    /// Payload of the chosen variant, passed through unchanged
    pub data: VariantData,
}

impl Assignment {
    pub fn new(
        experiment_id: ExperimentId,
        experiment_name: ExperimentName,
        participant_id: ParticipantId,
        variant_id: VariantId,
        data: VariantData,
    ) -> Self {
        Self {
            experiment_id,
            experiment_name,
            participant_id,
            variant_id,
            data,
        }
    }
}
