//! PostgreSQL adapter.
//!
//! # Module Structure
//! - `connection`: Connection string validation and lazy pool creation
//!
//! # Guarantees
//! - Connection strings are redacted in error messages
//! - Every session carries the configured statement timeout
//! - Statements run in the server's autocommit context; no explicit
//!   transactions are opened

mod connection;


use super::{BirdCursor, BirdStore, ConnectionConfig, ConnectionTarget, SELECT_BIRDS};
use crate::{
    Result,
    error::BirdingError,
    models::{Bird, DatabaseType},
};
use async_trait::async_trait;
use sqlx::PgPool;

/// Parameterized insert issued by the Writer.
pub const INSERT_BIRD: &str = "INSERT INTO birds (species, description) VALUES ($1, $2)";

/// PostgreSQL adapter over a lazily-connecting pool
pub struct PostgresAdapter {
    pub pool: PgPool,
    pub config: ConnectionConfig,
    pub target: ConnectionTarget,
}

impl std::fmt::Debug for PostgresAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresAdapter")
            .field("target", &self.target.to_string())
            .field("config", &self.config)
            .field("pool_size", &self.pool.size())
            .field("pool_idle", &self.pool.num_idle())
            .finish()
    }
}

#[async_trait]
impl BirdStore for PostgresAdapter {
    async fn ping(&self) -> Result<()> {
        let answer: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                BirdingError::unreachable(format!("cannot reach PostgreSQL at {}", self.target), e)
            })?;

        if answer != 1 {
            return Err(BirdingError::unreachable(
                format!("health check against {} returned {}", self.target, answer),
                std::io::Error::other("unexpected health check result"),
            ));
        }

        Ok(())
    }

    async fn query(&self) -> Result<BirdCursor<'_>> {
        tracing::debug!("Executing: {}", SELECT_BIRDS);
        let rows = sqlx::query(SELECT_BIRDS).fetch(&self.pool);
        BirdCursor::start(SELECT_BIRDS, rows).await
    }

    async fn insert_bird(&self, bird: &Bird) -> Result<usize> {
        tracing::debug!("Executing: {}", INSERT_BIRD);
        let result = sqlx::query(INSERT_BIRD)
            .bind(bird.species.as_str())
            .bind(bird.description.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| BirdingError::query_failed(format!("could not insert {}", bird), e))?;

        super::affected_rows(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    fn connection_config(&self) -> &ConnectionConfig {
        &self.config
    }
}
