//! Typed decoding of `birds` rows.
//!
//! The reader never touches driver rows directly; it goes through
//! [`BirdRow`], which the driver row types implement below. Tests implement
//! it for synthetic rows so the decoder can be checked without a server.

use crate::{Result, error::BirdingError, models::Bird};

/// Column names of the two-column shape, in SELECT order.
pub const BIRD_COLUMNS: [&str; 2] = ["species", "description"];

/// Boxed driver error returned by [`BirdRow::text_column`].
pub type ColumnError = Box<dyn std::error::Error + Send + Sync>;

/// Positional access to the columns of one result row.
///
/// # Example
/// ```rust,ignore
/// use birding_core::adapters::decode::{BirdRow, decode_bird};
///
/// let bird = decode_bird(0, &pg_row)?;
/// ```
pub trait BirdRow {
    /// Number of columns in the row.
    fn column_count(&self) -> usize;

    /// Reads column `index` as non-NULL text.
    fn text_column(&self, index: usize) -> std::result::Result<String, ColumnError>;
}

#[cfg(feature = "postgresql")]
impl BirdRow for sqlx::postgres::PgRow {
    fn column_count(&self) -> usize {
        sqlx::Row::len(self)
    }

    fn text_column(&self, index: usize) -> std::result::Result<String, ColumnError> {
        non_null_text(sqlx::Row::try_get::<Option<String>, _>(self, index))
    }
}

#[cfg(feature = "sqlite")]
impl BirdRow for sqlx::sqlite::SqliteRow {
    fn column_count(&self) -> usize {
        sqlx::Row::len(self)
    }

    fn text_column(&self, index: usize) -> std::result::Result<String, ColumnError> {
        non_null_text(sqlx::Row::try_get::<Option<String>, _>(self, index))
    }
}

/// Rejects NULL explicitly. Some drivers decode a NULL as an empty string
/// when asked for a plain `String`.
#[cfg(any(feature = "postgresql", feature = "sqlite"))]
fn non_null_text(
    value: std::result::Result<Option<String>, sqlx::Error>,
) -> std::result::Result<String, ColumnError> {
    match value {
        Ok(Some(text)) => Ok(text),
        Ok(None) => Err("unexpected null".into()),
        Err(e) => Err(Box::new(e)),
    }
}

/// Decodes one row into a [`Bird`].
///
/// The shape is checked once per row: exactly two columns, both non-NULL
/// text.
///
/// # Arguments
/// * `row_index` - Zero-based position of the row in its cursor, used in
///   error context
/// * `row` - The row to decode
///
/// # Errors
/// Returns `RowDecode` if the column count is not two or either column
/// cannot be read as text.
pub fn decode_bird<R: BirdRow + ?Sized>(row_index: usize, row: &R) -> Result<Bird> {
    let found = row.column_count();
    if found != BIRD_COLUMNS.len() {
        return Err(BirdingError::row_shape(format!(
            "row {}: expected {} columns ({}), found {}",
            row_index,
            BIRD_COLUMNS.len(),
            BIRD_COLUMNS.join(", "),
            found
        )));
    }

    let species = row
        .text_column(0)
        .map_err(|e| BirdingError::decode_field(row_index, BIRD_COLUMNS[0], e))?;
    let description = row
        .text_column(1)
        .map_err(|e| BirdingError::decode_field(row_index, BIRD_COLUMNS[1], e))?;

    Ok(Bird {
        species,
        description,
    })
}
