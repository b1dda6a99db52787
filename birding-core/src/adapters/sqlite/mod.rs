//! SQLite adapter.
//!
//! Lets the pipeline run against a local file or an in-memory database,
//! which is how the end-to-end tests exercise it without a server.
//!
//! # SQLite-Specific Behavior
//! - The pool holds exactly one connection that is never retired, so an
//!   in-memory database lives as long as the adapter
//! - Database files are created on first connect if missing
//! - The insert uses `?1`/`?2` placeholders

pub mod connection;

#[cfg(test)]
mod tests;

use super::{BirdCursor, BirdStore, ConnectionConfig, ConnectionTarget, SELECT_BIRDS};
use crate::{
    Result,
    error::BirdingError,
    models::{Bird, DatabaseType},
};
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Parameterized insert issued by the Writer.
pub const INSERT_BIRD: &str = "INSERT INTO birds (species, description) VALUES (?1, ?2)";

/// SQLite adapter over a single-connection pool
pub struct SqliteAdapter {
    /// Connection pool (always one connection)
    pub pool: SqlitePool,
    /// Connection configuration
    pub config: ConnectionConfig,
    /// Parsed location; `host` is always `localhost`
    pub target: ConnectionTarget,
}

impl std::fmt::Debug for SqliteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAdapter")
            .field("config", &self.config)
            .field("database", &self.target.database)
            .field("is_in_memory", &self.is_in_memory())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BirdStore for SqliteAdapter {
    async fn ping(&self) -> Result<()> {
        let answer: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                BirdingError::unreachable(format!("cannot open SQLite database {}", self.target), e)
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
        DatabaseType::SQLite
    }

    fn connection_config(&self) -> &ConnectionConfig {
        &self.config
    }
}
