//! Storage infrastructure - backend selection and PostgreSQL plumbing

mod factory;
pub mod postgres;

pub use factory::{StorageConfig, StorageFactory, StorageType};
pub use postgres::PostgresConfig;
