use chrono::{DateTime, NaiveDateTime, Utc};

/// Parses a client-supplied timestamp. RFC 3339 is canonical; naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]` is accepted for older app builds and read
/// as UTC.
pub fn parse_client_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

pub fn to_rfc3339(timestamp: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(timestamp, Utc).to_rfc3339()
}
