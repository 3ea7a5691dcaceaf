//! SQLite-Backend-Implementierungen fuer alle Repository-Traits

pub mod calls;
pub mod messages;
pub mod pool;
pub mod rooms;

pub use pool::SqliteDb;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::DbError;

/// Zeitstempel-Format in der Datenbank (Millisekunden, UTC)
const ZEITSTEMPEL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(ZEITSTEMPEL_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DbError> {
    NaiveDateTime::parse_from_str(s, ZEITSTEMPEL_FORMAT)
        .map(|n| n.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc)))
        .map_err(|e| DbError::UngueltigeDaten(format!("Zeitstempel '{s}': {e}")))
}

pub(crate) fn parse_id<T: std::str::FromStr>(s: &str, feld: &str) -> Result<T, DbError> {
    s.parse()
        .map_err(|_| DbError::UngueltigeDaten(format!("Ungueltige UUID in '{feld}': {s}")))
}
