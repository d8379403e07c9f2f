//! Timestamp and identifier helpers shared by the repositories

use chrono::{DateTime, SecondsFormat, Utc};
use cuid2::CuidConstructor;
use once_cell::sync::Lazy;

use crate::types::{DatabaseError, DatabaseResult};

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

pub fn new_public_id() -> String {
    CUID.create_id()
}

/// Fixed-width RFC 3339 so that stored timestamps sort lexicographically.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(&Utc::now())
}

pub fn parse_timestamp(value: &str) -> DatabaseResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| DatabaseError::InvalidData(format!("invalid timestamp {value}")))
}
