//! Lenient date parsing and conversions between business wall-clock time and UTC.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};

/// Parses RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM[:SS]` and bare
/// `YYYY-MM-DD` strings. Naive values are read as UTC. Blank input is `None`.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    let normalized = raw.replacen(' ', "T", 1);
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// `YYYY-MM-DD` for date inputs; empty when the value does not parse.
pub fn format_date_for_input(raw: &str) -> String {
    parse_date(raw)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// UTC instant of a wall-clock time in the business offset.
pub fn local_to_utc(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(time);
    Utc.from_utc_datetime(&(local - Duration::seconds(offset.local_minus_utc() as i64)))
}

/// Calendar date of `instant` in the business offset.
pub fn local_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// UTC bounds `[start, end)` of a business-local calendar day.
pub fn day_bounds(date: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_to_utc(date, NaiveTime::MIN, offset);
    (start, start + Duration::days(1))
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day0(0).unwrap_or(date)
}

/// First day of the month `months_back` months before the one containing `date`.
pub fn shift_month(date: NaiveDate, months_back: u32) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 - months_back as i32;
    let (year, month0) = (total.div_euclid(12), total.rem_euclid(12) as u32);
    NaiveDate::from_ymd_opt(year, month0 + 1, 1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_common_shapes() {
        let rfc = parse_date("2024-03-05T14:30:00-03:00").unwrap();
        assert_eq!(rfc.hour(), 17);

        let sql = parse_date("2024-03-05 14:30:00").unwrap();
        assert_eq!((sql.hour(), sql.minute()), (14, 30));

        let short = parse_date("2024-03-05T09:15").unwrap();
        assert_eq!(short.minute(), 15);

        let date_only = parse_date("2024-03-05").unwrap();
        assert_eq!(date_only.hour(), 0);
    }

    #[test]
    fn invalid_input_is_none() {
        assert!(parse_date("").is_none());
        assert!(parse_date("   ").is_none());
        assert!(parse_date("05/03/2024").is_none());
        assert_eq!(format_date_for_input("garbage"), "");
        assert_eq!(format_date_for_input("2024-03-05 22:00:00"), "2024-03-05");
    }

    #[test]
    fn business_offset_conversion() {
        let brt = FixedOffset::west_opt(3 * 3600).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();

        let utc = local_to_utc(date, nine, brt);
        assert_eq!(utc.hour(), 12);
        assert_eq!(local_date(utc, brt), date);

        let late = Utc.with_ymd_and_hms(2024, 7, 2, 1, 0, 0).unwrap();
        assert_eq!(local_date(late, brt), date);

        let (start, end) = day_bounds(date, brt);
        assert_eq!(start.hour(), 3);
        assert_eq!(end - start, Duration::days(1));
    }

    #[test]
    fn month_arithmetic() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 20).unwrap();
        assert_eq!(month_start(date), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(shift_month(date, 0), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(shift_month(date, 2), NaiveDate::from_ymd_opt(2023, 12, 1).unwrap());
        assert_eq!(shift_month(date, 14), NaiveDate::from_ymd_opt(2022, 12, 1).unwrap());
    }
}
