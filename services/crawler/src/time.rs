use chrono::{DateTime, NaiveDate, Utc};

/// Parse the timestamp formats the sources emit: RFC 3339, the offset-
/// without-colon variant, or a bare date.
pub fn parse_datetime(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc));
    }

    None
}
