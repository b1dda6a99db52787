//! PostgreSQL connection string validation and lazy pool creation.
//!
//! # Security Features
//! - Validates connection string format and identifiers before use
//! - Enforces connection limits and timeouts from `ConnectionConfig`
//! - Redacts the connection string in every error message

use super::PostgresAdapter;
use crate::adapters::{ConnectionConfig, ConnectionTarget, config::MAX_TIMEOUT};
use crate::{Result, error::BirdingError};
use sqlx::PgPool;
use std::time::Duration;
use url::Url;

/// PostgreSQL default port
const DEFAULT_PORT: u16 = 5432;

/// PostgreSQL truncates identifiers beyond this length
const MAX_IDENTIFIER_LEN: usize = 63;

impl PostgresAdapter {
    /// Creates a PostgreSQL adapter for the configured connection string.
    ///
    /// This is the Connector: the pool is created lazily and no connection
    /// is opened until the first statement runs.
    ///
    /// # Errors
    /// Returns `Configuration` if:
    /// - Connection string format is invalid
    /// - Database or user name is not a valid PostgreSQL identifier
    /// - Pool configuration is invalid
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        let (target, config) = Self::parse_connection_config(config)?;
        let pool = Self::create_connection_pool(&config)?;

        tracing::debug!("Opened lazy PostgreSQL pool for {}", target);
        Ok(Self {
            pool,
            config,
            target,
        })
    }

    /// Parses the connection string into a target and applies any
    /// `connect_timeout` / `statement_timeout` query parameters to `config`.
    ///
    /// # Arguments
    /// * `config` - Configuration holding the connection string
    ///
    /// # Returns
    /// The validated target and the (possibly adjusted) configuration
    ///
    /// # Errors
    /// Returns error if connection string is malformed or contains unsafe parameters
    pub fn parse_connection_config(
        mut config: ConnectionConfig,
    ) -> Result<(ConnectionTarget, ConnectionConfig)> {
        let url = Self::validate_connection_string(config.database_url())?;

        let mut target = ConnectionTarget::new(url.host_str().unwrap_or("localhost"));

        // Set port with validation
        match url.port() {
            Some(0) => {
                return Err(BirdingError::configuration(
                    "Invalid port number: must be greater than 0",
                ));
            }
            Some(port) => target = target.with_port(port),
            None => target = target.with_port(DEFAULT_PORT),
        }

        let database = url.path().trim_start_matches('/');
        if !database.is_empty() {
            validate_identifier("Database name", database)?;
            target = target.with_database(database);
        }

        let username = url.username();
        if !username.is_empty() {
            validate_identifier("Username", username)?;
            target = target.with_username(username);
        }

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "connect_timeout" => {
                    config.connect_timeout = timeout_parameter(&key, &value, Duration::from_secs)?;
                }
                "statement_timeout" => {
                    config.query_timeout = timeout_parameter(&key, &value, Duration::from_millis)?;
                }
                _ => {} // Left for the driver
            }
        }

        config.validate()?;

        Ok((target, config))
    }

    /// Validates connection string format and returns the parsed URL.
    ///
    /// # Errors
    /// Returns `Configuration` if the string does not parse, uses another
    /// scheme, has no host, or carries a timeout parameter that is not a
    /// whole number between 1 and the five minute limit
    pub fn validate_connection_string(connection_string: &str) -> Result<Url> {
        let url = Url::parse(connection_string).map_err(|e| {
            BirdingError::configuration(format!(
                "Invalid PostgreSQL connection string format: {}",
                e
            ))
        })?;

        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(BirdingError::configuration(
                "Connection string must use postgres:// or postgresql:// scheme",
            ));
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(BirdingError::configuration(
                "Connection string must specify a host",
            ));
        }

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "connect_timeout" => {
                    timeout_parameter(&key, &value, Duration::from_secs)?;
                }
                "statement_timeout" => {
                    timeout_parameter(&key, &value, Duration::from_millis)?;
                }
                _ => {}
            }
        }

        Ok(url)
    }

    /// Creates a lazily-connecting pool with session settings applied to
    /// every new connection.
    ///
    /// # Connection Pool Configuration
    /// - Max connections: `config.max_connections`
    /// - Acquire timeout: `config.connect_timeout`
    /// - Statement timeout: `config.query_timeout`, set per session
    /// - Connections are validated before use
    pub(crate) fn create_connection_pool(config: &ConnectionConfig) -> Result<PgPool> {
        use sqlx::Executor;

        let statement_timeout_ms = config.query_timeout.as_millis();

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections.min(100))
            .min_connections(0)
            .acquire_timeout(config.connect_timeout)
            .test_before_acquire(true)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    conn.execute(
                        format!("SET statement_timeout = {}", statement_timeout_ms).as_str(),
                    )
                    .await?;

                    let app_name = format!("birding-{}", env!("CARGO_PKG_VERSION"));
                    conn.execute(format!("SET application_name = '{}'", app_name).as_str())
                        .await?;

                    Ok(())
                })
            })
            .connect_lazy(config.database_url())
            .map_err(|e| {
                BirdingError::configuration(format!(
                    "Failed to create PostgreSQL connection pool to {}: {}",
                    config.redacted_url(),
                    e
                ))
            })?;

        Ok(pool)
    }
}

/// Parses a `connect_timeout` (seconds) or `statement_timeout` (milliseconds)
/// query parameter. Zero, non-numeric and above-limit values are rejected.
fn timeout_parameter(
    key: &str,
    value: &str,
    unit: fn(u64) -> Duration,
) -> Result<Duration> {
    let timeout = value
        .parse::<u64>()
        .ok()
        .map(unit)
        .filter(|t| !t.is_zero() && *t <= MAX_TIMEOUT)
        .ok_or_else(|| {
            BirdingError::configuration(format!(
                "{}={} must be a positive whole number no longer than {} seconds",
                key,
                value,
                MAX_TIMEOUT.as_secs()
            ))
        })?;

    Ok(timeout)
}

/// Checks a database or role name against PostgreSQL identifier rules:
/// letters, digits, underscores and dollar signs, starting with a letter
/// or underscore, at most 63 characters.
fn validate_identifier(what: &str, value: &str) -> Result<()> {
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(BirdingError::configuration(format!(
            "{} too long: maximum {} characters",
            what, MAX_IDENTIFIER_LEN
        )));
    }

    match value.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => {
            return Err(BirdingError::configuration(format!(
                "{} must start with a letter or underscore",
                what
            )));
        }
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    {
        return Err(BirdingError::configuration(format!(
            "{} contains invalid characters (only letters, digits, underscores, and dollar signs allowed)",
            what
        )));
    }

    Ok(())
}
