//! PostgreSQL connection pooling and error mapping

use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::domain::DomainError;

/// SQLSTATE for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/abexp".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
    }

    /// Open a pool and establish the minimum connections
    pub async fn connect(&self) -> Result<PgPool, DomainError> {
        self.pool_options()
            .connect(&self.url)
            .await
            .map_err(|e| map_sqlx_error("Failed to connect to PostgreSQL", e))
    }

    /// Build a pool that connects on first use
    pub fn connect_lazy(&self) -> Result<PgPool, DomainError> {
        self.pool_options()
            .connect_lazy(&self.url)
            .map_err(|e| DomainError::validation(format!("Invalid PostgreSQL URL: {}", e)))
    }
}

/// Whether a SQLSTATE code denotes a fault worth retrying
pub fn is_transient_sqlstate(code: &str) -> bool {
    // class 08: connection exceptions
    code.starts_with("08")
        || matches!(
            code,
            "40001" // serialization_failure
                | "40P01" // deadlock_detected
                | "53300" // too_many_connections
                | "57P01" // admin_shutdown
                | "57P02" // crash_shutdown
                | "57P03" // cannot_connect_now
        )
}

/// Whether the error is a unique constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code == UNIQUE_VIOLATION;
        }
    }

    false
}

/// Classify a sqlx error into the domain taxonomy.
///
/// Connection loss, pool exhaustion and retryable SQLSTATEs become
/// [`DomainError::StorageUnavailable`]; everything else is internal.
pub fn map_sqlx_error(context: &str, err: sqlx::Error) -> DomainError {
    let transient = match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db_err) => db_err
            .code()
            .map(|code| is_transient_sqlstate(&code))
            .unwrap_or(false),
        _ => false,
    };

    if transient {
        DomainError::storage_unavailable(format!("{}: {}", context, err))
    } else {
        DomainError::internal(format!("{}: {}", context, err))
    }
}
