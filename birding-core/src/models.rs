//! Record types shared by the reader, writer and report.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Database engines a connection string can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseType {
    PostgreSQL,
    SQLite,
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseType::PostgreSQL => write!(f, "PostgreSQL"),
            DatabaseType::SQLite => write!(f, "SQLite"),
        }
    }
}

/// One row of the `birds` table.
///
/// Built either by decoding a cursor row or literally for an insert; never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bird {
    /// Species name, e.g. `rooster`
    pub species: String,
    /// Free-form description
    pub description: String,
}

impl Bird {
    /// Creates a bird from its two column values.
    pub fn new(species: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            species: species.into(),
            description: description.into(),
        }
    }

    /// The bird inserted when no other values are given.
    pub fn rooster() -> Self {
        Self::new("rooster", "wakes you up in the morning")
    }
}

impl fmt::Display for Bird {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{species: {}, description: {}}}",
            self.species, self.description
        )
    }
}

/// Renders a collection the way the reader reports it: `[{..} {..}]`.
pub fn format_birds(birds: &[Bird]) -> String {
    let listing = birds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    format!("[{}]", listing)
}

/// Outcome of a pipeline run that reached its last requested stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Whether the health check succeeded
    pub reachable: bool,
    /// Birds drained by the reader, in cursor order
    pub birds: Vec<Bird>,
    /// Affected row count reported by the writer, if it ran
    pub inserted: Option<usize>,
}
