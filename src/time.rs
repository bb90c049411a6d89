use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current UTC instant as an RFC 3339 string, the wire format for `createdAt`
/// and `updatedAt` stamps.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Today as the ISO calendar-day string used in record `date` fields.
pub fn today_string() -> String {
    today().format("%Y-%m-%d").to_string()
}

pub fn ms_to_iso(ms: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub fn secs_to_iso(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub fn ms_to_day(ms: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
}

pub fn secs_to_day(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
}
