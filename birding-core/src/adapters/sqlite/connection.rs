//! SQLite connection string handling.
//!
//! # Connection Modes
//! - File-based: `sqlite:///path/to/birds.db`, `sqlite://./birds.db` or a bare
//!   path ending in `.db`, `.sqlite` or `.sqlite3`
//! - In-memory: `sqlite::memory:` or `:memory:`

use super::SqliteAdapter;
use crate::adapters::{ConnectionConfig, ConnectionTarget};
use crate::{Result, error::BirdingError};
use sqlx::SqlitePool;
use url::Url;

impl SqliteAdapter {
    /// Creates a SQLite adapter without opening the database.
    ///
    /// # Errors
    /// Returns `Configuration` if the connection string is not a SQLite
    /// location or the driver rejects its options.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        validate_sqlite_connection_string(config.database_url())?;

        let target = ConnectionTarget::new("localhost")
            .with_database(extract_database_name(config.database_url()));
        let pool = create_sqlite_pool(&config)?;

        tracing::debug!("Opened lazy SQLite pool for {}", target);
        Ok(Self {
            pool,
            config,
            target,
        })
    }

    /// Checks if the connection is to an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        let url = self.config.database_url();
        url.contains(":memory:") || url.contains("mode=memory")
    }
}

/// Validates SQLite connection string format.
///
/// # Errors
/// Returns `Configuration` if the string is neither a `sqlite:` URL, a
/// database file path nor `:memory:`.
pub fn validate_sqlite_connection_string(connection_string: &str) -> Result<()> {
    if connection_string == ":memory:" {
        return Ok(());
    }

    if connection_string.ends_with(".db")
        || connection_string.ends_with(".sqlite")
        || connection_string.ends_with(".sqlite3")
    {
        return Ok(());
    }

    if connection_string.starts_with("sqlite:") {
        if connection_string.contains(":memory:") || connection_string.contains("mode=memory") {
            return Ok(());
        }

        if let Ok(url) = Url::parse(connection_string)
            && url.scheme() == "sqlite"
        {
            return Ok(());
        }

        if connection_string.starts_with("sqlite://") {
            return Ok(());
        }
    }

    Err(BirdingError::configuration(
        "Invalid SQLite connection string format: expected sqlite:// URL, file path, or :memory:",
    ))
}

/// Extracts the database file name, or `:memory:`.
fn extract_database_name(connection_string: &str) -> String {
    if connection_string.contains(":memory:") {
        return ":memory:".to_string();
    }

    let path = connection_string
        .strip_prefix("sqlite://")
        .or_else(|| connection_string.strip_prefix("sqlite:"))
        .unwrap_or(connection_string);
    let path = path.split('?').next().unwrap_or(path);

    match path.rsplit('/').next() {
        Some(filename) if !filename.is_empty() => filename.to_string(),
        _ => "main".to_string(),
    }
}

/// Creates a lazily-connecting pool pinned to a single connection.
fn create_sqlite_pool(config: &ConnectionConfig) -> Result<SqlitePool> {
    use sqlx::sqlite::SqliteConnectOptions;
    use std::str::FromStr;

    let normalized = normalize_connection_string(config.database_url());

    let options = SqliteConnectOptions::from_str(&normalized)
        .map_err(|e| {
            BirdingError::configuration(format!("Invalid SQLite connection string: {}", e))
        })?
        .create_if_missing(true)
        .busy_timeout(config.query_timeout);

    // One connection that is never retired keeps an in-memory database alive.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(0)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_lazy_with(options);

    Ok(pool)
}

/// Normalizes connection string to SQLite URL format.
fn normalize_connection_string(connection_string: &str) -> String {
    if connection_string == ":memory:" {
        return "sqlite::memory:".to_string();
    }

    if connection_string.starts_with("sqlite:") {
        return connection_string.to_string();
    }

    format!("sqlite://{}", connection_string)
}
