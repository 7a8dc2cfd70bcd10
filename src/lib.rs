//! abexp - Experiment Assignment Engine
//!
//! Deterministic A/B variant bucketing:
//! - Experiments own weighted variant sets that sum to one
//! - Participants hash to a stable point of the unit interval per experiment
//! - Pluggable experiment stores (in-memory and PostgreSQL)

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{Assignment, DomainError, ExperimentStore};
pub use infrastructure::services::AssignmentEngine;
