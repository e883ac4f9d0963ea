//! Time utilities: timezone-aware parsing and report date formatting.

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

pub fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}

/// Parse a local time like "2026-02-20 23:59" in an IANA tz like "America/Chicago",
/// returning UTC.
pub fn parse_local_deadline_to_utc(local: &str, tz: &str) -> Result<DateTime<Utc>> {
    let tz = parse_timezone(tz)?;

    let ndt = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M")
        .map_err(|e| anyhow::anyhow!("invalid local datetime '{local}': {e}"))?;

    let local_dt = tz
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time (DST?): {local} {tz}"))?;

    Ok(local_dt.with_timezone(&Utc))
}

/// Accept RFC 3339 first, then the local "YYYY-MM-DD HH:MM" form.
pub fn parse_instant(s: &str, tz: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    parse_local_deadline_to_utc(s, tz)
}

/// Calendar date as printed on reports, e.g. "March 2, 2026".
pub fn format_report_date(dt: DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%B %-d, %Y").to_string()
}

/// Deadline with time of day, e.g. "March 2, 2026 17:00".
pub fn format_deadline(dt: DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%B %-d, %Y %H:%M").to_string()
}
