//! Forward-only cursor over decoded birds.

use super::decode::{BirdRow, decode_bird};
use crate::{Result, error::BirdingError, models::Bird};
use futures::stream::{self, BoxStream, Stream, StreamExt};

/// Rows of a running SELECT, decoded one at a time as the cursor advances.
///
/// A cursor is consumed exactly once by [`BirdCursor::drain`]. It borrows
/// the handle it was opened on, so the handle cannot be closed while rows
/// are still pending.
pub struct BirdCursor<'c> {
    rows: BoxStream<'c, Result<Bird>>,
}

impl std::fmt::Debug for BirdCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BirdCursor").finish_non_exhaustive()
    }
}

impl<'c> BirdCursor<'c> {
    /// Starts a cursor over a driver row stream.
    ///
    /// The first row is pulled immediately so that a statement the server
    /// rejects (missing table, bad SQL, lost connection) fails here rather
    /// than on the first call to `drain`.
    ///
    /// # Arguments
    /// * `statement` - SQL text, used in error context only
    /// * `rows` - The driver's row stream for that statement
    ///
    /// # Errors
    /// Returns `QueryExecution` if the first item of the stream is an error.
    pub async fn start<R, E, S>(statement: &str, mut rows: S) -> Result<Self>
    where
        R: BirdRow + Send + 'c,
        E: std::error::Error + Send + Sync + 'static,
        S: Stream<Item = std::result::Result<R, E>> + Unpin + Send + 'c,
    {
        let first = match rows.next().await {
            Some(Err(e)) => {
                return Err(BirdingError::query_failed(
                    format!("could not execute '{}'", statement),
                    e,
                ));
            }
            first => first,
        };

        Ok(Self::from_rows(stream::iter(first).chain(rows)))
    }

    /// Wraps a row stream without touching it.
    pub fn from_rows<R, E, S>(rows: S) -> Self
    where
        R: BirdRow + Send + 'c,
        E: std::error::Error + Send + Sync + 'static,
        S: Stream<Item = std::result::Result<R, E>> + Send + 'c,
    {
        let rows = rows
            .enumerate()
            .map(|(index, row)| match row {
                Ok(row) => decode_bird(index, &row),
                Err(e) => Err(BirdingError::query_failed(
                    format!("cursor failed before row {}", index),
                    e,
                )),
            })
            .boxed();

        Self { rows }
    }

    /// Advances the cursor to exhaustion, appending each bird to `into`.
    ///
    /// Returns the number of birds appended. On failure the drain stops at
    /// the offending row; birds appended before it stay in `into`.
    ///
    /// # Errors
    /// - `QueryExecution` if the server fails mid-cursor
    /// - `RowDecode` if a row does not have the two-text-column shape
    pub async fn drain(mut self, into: &mut Vec<Bird>) -> Result<usize> {
        let start = into.len();
        while let Some(bird) = self.rows.next().await {
            into.push(bird?);
        }
        let appended = into.len().saturating_sub(start);
        tracing::debug!("Cursor exhausted after {} rows", appended);
        Ok(appended)
    }
}
