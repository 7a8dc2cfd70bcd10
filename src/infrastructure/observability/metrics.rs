//! Assignment and lifecycle counters
//!
//! Emitted through the `metrics` facade; without an installed recorder the
//! macros are no-ops, so the library never forces an exporter on its host.

use metrics::counter;

use crate::domain::DomainError;

/// Count one successful assignment for an experiment
pub fn record_assignment(experiment: &str) {
    let labels = [("experiment", experiment.to_string())];

    counter!("experiment_assignments_total", &labels).increment(1);
}

/// Count one failed assignment, labelled by error kind
pub fn record_assignment_error(error: &DomainError) {
    let labels = [("kind", error.kind().to_string())];

    counter!("experiment_assignment_errors_total", &labels).increment(1);
}

/// Count a store lifecycle event (created, finished, rebalanced, deleted)
pub fn record_lifecycle(event: &'static str) {
    counter!("experiment_lifecycle_total", "event" => event).increment(1);
}
