//! Row-mapping helpers shared by the repository implementations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::DatabaseError;

/// Parse an RFC 3339 TEXT column.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// Parse an optional RFC 3339 TEXT column.
pub fn parse_datetime_opt(s: Option<&str>) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    s.map(parse_datetime).transpose()
}

/// Parse an exact-decimal TEXT column.
pub fn parse_decimal(s: &str) -> Result<Decimal, DatabaseError> {
    s.parse::<Decimal>()
        .map_err(|e| DatabaseError::ParseError(format!("invalid decimal {s:?}: {e}")))
}

/// Parse an optional exact-decimal TEXT column.
pub fn parse_decimal_opt(s: Option<&str>) -> Result<Option<Decimal>, DatabaseError> {
    s.map(parse_decimal).transpose()
}
