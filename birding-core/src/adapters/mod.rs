//! Database adapters and the factory that picks one for a connection string.
//!
//! Every adapter implements [`BirdStore`], which covers the four pipeline
//! stages: the adapter constructor is the Connector, then `ping`, `query`
//! and `insert_bird`.
//!
//! # Module Structure
//! - `config`: Connection configuration handed to the Connector
//! - `decode`: Typed row decoding shared by all adapters
//! - `cursor`: Forward-only cursor returned by `query`
//! - Database-specific modules (postgres, sqlite)

use crate::{
    Result,
    models::{Bird, DatabaseType},
};
use async_trait::async_trait;

pub mod config;
pub mod cursor;
pub mod decode;

pub use config::{ConnectionConfig, ConnectionTarget, DEFAULT_DATABASE_URL};
pub use cursor::BirdCursor;
pub use decode::{BirdRow, decode_bird};

/// Upper bound on the rows returned by the reader.
pub const BIRD_QUERY_LIMIT: usize = 10;

/// Bounded read issued by the Reader. The limit is enforced by the server.
pub const SELECT_BIRDS: &str = "SELECT species, description FROM birds LIMIT 10";

/// Handle to the `birds` table.
///
/// # Object Safety
/// This trait is object-safe; [`open`] returns it as `Box<dyn BirdStore>`.
#[async_trait]
pub trait BirdStore: Send + Sync + std::fmt::Debug {
    /// Verifies the server is reachable with one round trip.
    ///
    /// # Errors
    /// Returns `Connectivity` if the server cannot be reached, rejects the
    /// credentials, or does not answer before the acquire timeout.
    async fn ping(&self) -> Result<()>;

    /// Runs the bounded SELECT and returns a cursor over its rows.
    ///
    /// # Errors
    /// Returns `QueryExecution` if the server rejects the statement.
    async fn query(&self) -> Result<BirdCursor<'_>>;

    /// Inserts one bird and returns the affected row count.
    ///
    /// # Errors
    /// - `QueryExecution` if the statement fails
    /// - `ResultMetadata` if the affected row count is unusable
    async fn insert_bird(&self, bird: &Bird) -> Result<usize>;

    /// Releases every pooled connection. Idempotent.
    async fn close(&self);

    /// Returns the database type this adapter handles.
    fn database_type(&self) -> DatabaseType;

    /// Gets the connection configuration (credentials redacted on display).
    fn connection_config(&self) -> &ConnectionConfig;
}

/// Opens a handle for the configured connection string.
///
/// No network I/O happens here: pools are created lazily and the first
/// connection is made by the first stage that needs one.
///
/// # Errors
/// Returns `Configuration` if:
/// - The configuration values are invalid
/// - The connection string is malformed
/// - No compiled-in driver handles its scheme
pub fn open(config: &ConnectionConfig) -> Result<Box<dyn BirdStore>> {
    config.validate()?;
    let database_type = detect_database_type(config.database_url())?;

    match database_type {
        #[cfg(feature = "postgresql")]
        DatabaseType::PostgreSQL => {
            let adapter = postgres::PostgresAdapter::new(config.clone())?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "postgresql"))]
        DatabaseType::PostgreSQL => Err(crate::error::BirdingError::configuration(
            "PostgreSQL driver not compiled in. Use --features postgresql",
        )),
        #[cfg(feature = "sqlite")]
        DatabaseType::SQLite => {
            let adapter = sqlite::SqliteAdapter::new(config.clone())?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "sqlite"))]
        DatabaseType::SQLite => Err(crate::error::BirdingError::configuration(
            "SQLite driver not compiled in. Use --features sqlite",
        )),
    }
}

/// Converts a driver-reported affected row count into the caller's count type.
///
/// # Errors
/// Returns `ResultMetadata` if the count cannot be represented.
pub(crate) fn affected_rows(reported: u64) -> Result<usize> {
    usize::try_from(reported).map_err(|_| {
        crate::error::BirdingError::missing_metadata(format!(
            "affected row count {} does not fit the platform count type",
            reported
        ))
    })
}

/// Detects database type from connection string.
///
/// # Errors
/// Returns `Configuration` if the connection string format is unrecognized
pub fn detect_database_type(connection_string: &str) -> Result<DatabaseType> {
    if connection_string.starts_with("postgres://")
        || connection_string.starts_with("postgresql://")
    {
        Ok(DatabaseType::PostgreSQL)
    } else if connection_string.starts_with("sqlite:")
        || connection_string == ":memory:"
        || connection_string.ends_with(".db")
        || connection_string.ends_with(".sqlite")
        || connection_string.ends_with(".sqlite3")
    {
        Ok(DatabaseType::SQLite)
    } else {
        Err(crate::error::BirdingError::configuration(
            "Unrecognized database connection string format",
        ))
    }
}

// Database-specific adapter modules
#[cfg(feature = "postgresql")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;
