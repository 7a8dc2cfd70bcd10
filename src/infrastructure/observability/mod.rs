//! Observability infrastructure - Metrics

mod metrics;

pub use metrics::{record_assignment, record_assignment_error, record_lifecycle};
