//! Infrastructure layer - Store implementations, hashing and runtime plumbing

pub mod experiment;
pub mod logging;
pub mod observability;
pub mod services;
pub mod storage;
