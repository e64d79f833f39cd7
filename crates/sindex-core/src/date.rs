//! Lenient parsing of the date formats found in bibliographic dumps.
//!
//! All dates are converted to UTC. Values without an offset are taken
//! to be UTC already; plain dates denote midnight.

use chrono::{
    DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Utc,
};

use crate::error::{CoreError, CoreResult};

const NAIVE_FORMATS: [&str; 2] =
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses a date or timestamp into a UTC timestamp.
///
/// Accepted forms are RFC 3339 (`2021-06-01T12:00:00Z`,
/// `2021-06-01T12:00:00+02:00`), the same with a space instead of the
/// `T`, naive timestamps and plain dates (`2021-06-01`).
pub fn parse_date(s: &str) -> CoreResult<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return Err(CoreError::Date(s.into()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z")
    {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }

    Err(CoreError::Date(s.into()))
}

/// Returns the UTC midnight of the day the given instant falls on.
#[inline]
pub fn midnight(instant: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&instant.date_naive().and_time(NaiveTime::MIN))
}

/// Returns UTC midnight of the given calendar day, if it exists.
pub fn ymd(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

#[inline]
pub fn year_of(instant: &DateTime<Utc>) -> i32 {
    instant.year()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    type TestResult = anyhow::Result<()>;

    #[test]
    fn parse_rfc3339() -> TestResult {
        let expected = Utc.with_ymd_and_hms(2021, 6, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_date("2021-06-01T10:00:00Z")?, expected);
        assert_eq!(parse_date("2021-06-01T12:00:00+02:00")?, expected);
        assert_eq!(parse_date(" 2021-06-01T10:00:00+00:00 ")?, expected);
        Ok(())
    }

    #[test]
    fn parse_naive() -> TestResult {
        assert_eq!(
            parse_date("2021-06-01T10:00:00")?,
            Utc.with_ymd_and_hms(2021, 6, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(
            parse_date("2021-06-01 10:00:00.250")?.timestamp_millis(),
            Utc.with_ymd_and_hms(2021, 6, 1, 10, 0, 0)
                .unwrap()
                .timestamp_millis()
                + 250
        );
        assert_eq!(
            parse_date("2021-06-01")?,
            Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap()
        );
        Ok(())
    }

    #[test]
    fn parse_invalid() {
        assert!(parse_date("").is_err());
        assert!(parse_date("   ").is_err());
        assert!(parse_date("yesterday").is_err());
        assert!(parse_date("2021-13-01").is_err());
        assert!(parse_date("2021-02-30").is_err());
    }

    #[test]
    fn midnight_truncates() {
        let instant = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        assert_eq!(midnight(instant), ymd(2024, 2, 29).unwrap());
        assert_eq!(year_of(&instant), 2024);
    }
}
