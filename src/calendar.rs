use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime,
    Offset, TimeZone, Utc,
};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::CalendarConfig;
use crate::errors::{LedgerError, Result};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// a calendar date with no time-of-day
///
/// Arithmetic goes through [`DateOnly::instant`], which pins the date to
/// 12:00 UTC so that offset changes can never move it across midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateOnly(NaiveDate);

impl DateOnly {
    pub fn new(date: NaiveDate) -> Self {
        DateOnly(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(DateOnly)
    }

    pub fn naive(&self) -> NaiveDate {
        self.0
    }

    /// noon UTC on this calendar date
    pub fn instant(&self) -> DateTime<Utc> {
        let midnight = self.0.and_time(NaiveTime::default());
        Utc.from_utc_datetime(&(midnight + Duration::hours(12)))
    }

    /// add calendar months, clamping to the end of shorter months
    pub fn add_months(&self, months: u32) -> Option<Self> {
        self.0.checked_add_months(Months::new(months)).map(DateOnly)
    }

    pub fn add_days(&self, days: i64) -> Option<Self> {
        self.0.checked_add_signed(Duration::days(days)).map(DateOnly)
    }

    /// `D-M-YYYY`, the statement format
    pub fn display(&self) -> String {
        format!("{}-{}-{}", self.0.day(), self.0.month(), self.0.year())
    }

    /// `YYYY-MM-DD`
    pub fn iso(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for DateOnly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl From<NaiveDate> for DateOnly {
    fn from(date: NaiveDate) -> Self {
        DateOnly(date)
    }
}

/// whole days from `start` to `end`, never negative
pub fn days_between(start: DateOnly, end: DateOnly) -> u32 {
    let millis = (end.instant() - start.instant()).num_milliseconds();
    let days = millis.div_euclid(MILLIS_PER_DAY);
    days.clamp(0, u32::MAX as i64) as u32
}

/// any date representation accepted at the boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateInput {
    Date(NaiveDate),
    Instant(DateTime<Utc>),
    Text(String),
}

impl From<&str> for DateInput {
    fn from(s: &str) -> Self {
        DateInput::Text(s.to_string())
    }
}

impl From<String> for DateInput {
    fn from(s: String) -> Self {
        DateInput::Text(s)
    }
}

impl From<NaiveDate> for DateInput {
    fn from(d: NaiveDate) -> Self {
        DateInput::Date(d)
    }
}

impl From<DateOnly> for DateInput {
    fn from(d: DateOnly) -> Self {
        DateInput::Date(d.naive())
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(d: DateTime<Utc>) -> Self {
        DateInput::Instant(d)
    }
}

/// resolves dates in the business's local calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    offset: FixedOffset,
}

impl BusinessCalendar {
    pub fn new(utc_offset_minutes: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
            LedgerError::InvalidConfiguration {
                message: format!("utc offset out of range: {} minutes", utc_offset_minutes),
            }
        })?;
        Ok(Self { offset })
    }

    pub fn from_config(config: &CalendarConfig) -> Result<Self> {
        Self::new(config.utc_offset_minutes)
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// today's date in the business calendar
    pub fn today(&self, time: &SafeTimeProvider) -> DateOnly {
        self.resolve_instant(time.now())
    }

    /// the business-local calendar date of an instant
    pub fn resolve_instant(&self, instant: DateTime<Utc>) -> DateOnly {
        DateOnly(instant.with_timezone(&self.offset).date_naive())
    }

    /// normalize any accepted representation; unrecognized input is `None`
    pub fn parse(&self, input: &DateInput) -> Option<DateOnly> {
        match input {
            DateInput::Date(d) => Some(DateOnly(*d)),
            DateInput::Instant(i) => Some(self.resolve_instant(*i)),
            DateInput::Text(s) => self.parse_str(s),
        }
    }

    pub fn parse_opt(&self, input: Option<&DateInput>) -> Option<DateOnly> {
        input.and_then(|i| self.parse(i))
    }

    pub fn parse_str(&self, raw: &str) -> Option<DateOnly> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        if let Some(date) = parse_date_only(s) {
            return Some(date);
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(self.resolve_instant(dt.with_timezone(&Utc)));
        }

        // no offset given: already business-local
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
            if let Ok(local) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(DateOnly(local.date()));
            }
        }

        // trailing noise after a plain date
        s.get(..10).and_then(parse_date_only)
    }
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

fn parse_date_only(s: &str) -> Option<DateOnly> {
    const FORMATS: [&str; 3] = ["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d"];

    if s.len() != 10 {
        return None;
    }
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(DateOnly)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hourglass_rs::TimeSource;

    fn karachi() -> BusinessCalendar {
        BusinessCalendar::new(300).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> DateOnly {
        DateOnly::from_ymd(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_accepted_formats() {
        let cal = karachi();

        assert_eq!(cal.parse_str("2025-09-24"), Some(date(2025, 9, 24)));
        assert_eq!(cal.parse_str("24/09/2025"), Some(date(2025, 9, 24)));
        assert_eq!(cal.parse_str("24-09-2025"), Some(date(2025, 9, 24)));
        assert_eq!(cal.parse_str("  2025-09-24  "), Some(date(2025, 9, 24)));
    }

    #[test]
    fn test_iso_datetime_resolves_in_business_offset() {
        let cal = karachi();

        // 20:00 UTC is already the next day at +05:00
        assert_eq!(cal.parse_str("2025-09-24T20:00:00.000Z"), Some(date(2025, 9, 25)));
        assert_eq!(cal.parse_str("2025-09-24T00:00:00Z"), Some(date(2025, 9, 24)));
        assert_eq!(cal.parse_str("2025-09-24T23:30:00+05:00"), Some(date(2025, 9, 24)));
        // naive datetime is read as business-local
        assert_eq!(cal.parse_str("2025-09-24T23:30:00"), Some(date(2025, 9, 24)));
    }

    #[test]
    fn test_unrecognized_input_is_none() {
        let cal = karachi();

        assert_eq!(cal.parse_str(""), None);
        assert_eq!(cal.parse_str("   "), None);
        assert_eq!(cal.parse_str("next tuesday"), None);
        assert_eq!(cal.parse_str("31/02/2025"), None);
        assert_eq!(cal.parse_str("2025-13-01"), None);
    }

    #[test]
    fn test_native_inputs() {
        let cal = karachi();
        let instant = Utc.with_ymd_and_hms(2025, 3, 31, 22, 0, 0).unwrap();

        assert_eq!(cal.parse(&DateInput::from(instant)), Some(date(2025, 4, 1)));
        assert_eq!(cal.parse(&DateInput::from(date(2025, 4, 1))), Some(date(2025, 4, 1)));
    }

    #[test]
    fn test_instant_is_noon_utc() {
        let d = date(2024, 2, 29);
        assert_eq!(d.instant(), Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_days_between_clamps_negative() {
        let due = date(2025, 1, 1);

        assert_eq!(days_between(due, date(2025, 1, 31)), 30);
        assert_eq!(days_between(due, date(2025, 3, 2)), 60);
        assert_eq!(days_between(due, due), 0);
        assert_eq!(days_between(due, date(2024, 12, 1)), 0);
    }

    #[test]
    fn test_today_uses_business_offset() {
        let cal = karachi();
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2025, 6, 30, 19, 30, 0).unwrap(),
        ));

        assert_eq!(cal.today(&time), date(2025, 7, 1));
        assert_eq!(BusinessCalendar::utc().today(&time), date(2025, 6, 30));
    }

    #[test]
    fn test_add_months_clamps_to_month_end() {
        assert_eq!(date(2025, 1, 31).add_months(1), Some(date(2025, 2, 28)));
        assert_eq!(date(2024, 1, 31).add_months(1), Some(date(2024, 2, 29)));
        assert_eq!(date(2025, 1, 15).add_months(12), Some(date(2026, 1, 15)));
    }

    #[test]
    fn test_display_formats() {
        let d = date(2025, 9, 4);
        assert_eq!(d.display(), "4-9-2025");
        assert_eq!(d.iso(), "2025-09-04");
    }

    #[test]
    fn test_offset_out_of_range() {
        assert!(BusinessCalendar::new(24 * 60).is_err());
    }
}
