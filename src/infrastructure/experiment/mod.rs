//! Infrastructure layer for experiment A/B testing
//!
//! Experiment store implementations and the assignment hash.

mod consistent_hashing;
mod in_memory_store;
mod postgres_store;

pub use consistent_hashing::AssignmentHasher;
pub use in_memory_store::InMemoryExperimentStore;
pub use postgres_store::PostgresExperimentStore;
