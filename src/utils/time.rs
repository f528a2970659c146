use chrono::{
    DateTime, Datelike, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, SecondsFormat,
    TimeZone, Utc,
};
use chrono_tz::Tz;

/// Format a timestamp the way the agent webhook expects (`2025-06-18T21:00:00.000Z`)
pub fn to_iso_millis(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Resolve a local wall-clock time, taking the earlier instant on DST overlaps
/// and skipping forward an hour on DST gaps.
pub fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => match tz.from_local_datetime(&(naive + Duration::hours(1))) {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => None,
        },
    }
}

/// Parse a date string produced by the voice agent or a form.
///
/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM[:SS]` in the given timezone,
/// and bare `YYYY-MM-DD` as UTC midnight.
pub fn parse_flexible_datetime(input: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return resolve_local(tz, naive).map(|dt| dt.with_timezone(&Utc));
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Midnight at the start of `date` in `tz`
pub fn start_of_day(tz: &Tz, date: NaiveDate) -> Option<DateTime<Tz>> {
    resolve_local(tz, date.and_hms_opt(0, 0, 0)?)
}

/// Last millisecond of `date` in `tz`
pub fn end_of_day(tz: &Tz, date: NaiveDate) -> Option<DateTime<Tz>> {
    let next = date.succ_opt()?;
    start_of_day(tz, next).map(|dt| dt - Duration::milliseconds(1))
}

/// Sunday that starts the week containing `date`
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

/// First day of the month containing `date`
pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last day of the month containing `date`
pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    start_of_month(date)
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

/// Same instant one calendar month later, clamped to the month's last day
pub fn add_one_month(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.checked_add_months(Months::new(1))
        .unwrap_or(dt + Duration::days(30))
}
