use chrono::{DateTime, SecondsFormat, Utc};

/// Render a timestamp the way the store persists it: fixed-width RFC 3339 with
/// microseconds, so lexical order in SQLite matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}
