use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Experiment with name '{name}' already exists")]
    DuplicateName { name: String },

    #[error("Invalid distribution: {message}")]
    InvalidDistribution { message: String },

    #[error("Experiment '{id}' is already finished")]
    AlreadyFinished { id: String },

    #[error("Experiment '{name}' is finished and no longer assigns participants")]
    ExperimentFinished { name: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Storage unavailable: {message}")]
    StorageUnavailable { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    pub fn invalid_distribution(message: impl Into<String>) -> Self {
        Self::InvalidDistribution {
            message: message.into(),
        }
    }

    pub fn already_finished(id: impl Into<String>) -> Self {
        Self::AlreadyFinished { id: id.into() }
    }

    pub fn experiment_finished(name: impl Into<String>) -> Self {
        Self::ExperimentFinished { name: name.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the caller may retry the operation with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }

    /// Short stable label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::DuplicateName { .. } => "duplicate_name",
            Self::InvalidDistribution { .. } => "invalid_distribution",
            Self::AlreadyFinished { .. } => "already_finished",
            Self::ExperimentFinished { .. } => "experiment_finished",
            Self::Validation { .. } => "validation",
            Self::StorageUnavailable { .. } => "storage_unavailable",
            Self::Internal { .. } => "internal",
        }
    }
}
