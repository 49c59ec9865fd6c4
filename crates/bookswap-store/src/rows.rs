//! Shared row-mapping helpers for TEXT-encoded UUID and timestamp columns.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Parse a UUID TEXT column, converting failures into a `rusqlite` error so
/// the helpers compose with `query_row` / `query_map` closures.
pub(crate) fn uuid_col(idx: usize, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse an RFC-3339 TEXT column into a UTC timestamp.
pub(crate) fn ts_col(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Parse an optional RFC-3339 TEXT column.
pub(crate) fn opt_ts_col(idx: usize, value: Option<&str>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| ts_col(idx, v)).transpose()
}
