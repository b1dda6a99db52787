//! Core library for birding.
//!
//! Opens a database handle, checks the server is reachable, reads up to ten
//! rows from the `birds` table and inserts one more. Each of those steps is
//! a separate stage with its own error; [`pipeline::run`] chains them and
//! stops at the first failure.
//!
//! # Security Guarantees
//! - Connection strings are zeroized on drop and redacted wherever displayed
//! - Statements are parameterized; row values never reach the SQL text
//!
//! # Architecture
//! - Factory ([`adapters::open`]) picks an adapter from the connection string
//! - Adapters implement [`BirdStore`] and share one row decoder
//! - The pipeline driver owns the handle and closes it on every path

pub mod adapters;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;

// Re-export commonly used types
pub use adapters::{BirdCursor, BirdStore, ConnectionConfig, DEFAULT_DATABASE_URL, open};
pub use error::{BirdingError, Result};
pub use logging::init_logging;
pub use models::{Bird, DatabaseType, RunReport};
pub use pipeline::{PipelineError, Plan, ReportFormat, Stage, run};
