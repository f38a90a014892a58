//! Report windows.
//!
//! A local day starts at UTC midnight minus the configured offset, so with
//! the default offset of 4 hours "today" is `[20:00Z yesterday, 20:00Z today)`.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::fmt;

use crate::types::OrderFilter;

/// Separator between the two dates in web-app data.
pub const RANGE_SEPARATOR: &str = "::";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("Malformed date range '{0}', expected YYYY-MM-DD::YYYY-MM-DD")]
    Malformed(String),

    #[error("Range starts after it ends: {from} > {to}")]
    Inverted { from: NaiveDate, to: NaiveDate },

    #[error("Date out of range: {0}")]
    OutOfRange(NaiveDate),
}

/// Which days a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Today,
    Yesterday,
    /// Inclusive on both ends.
    Range { from: NaiveDate, to: NaiveDate },
}

impl ReportPeriod {
    /// Parse `YYYY-MM-DD::YYYY-MM-DD` sent by the date-picker web app.
    pub fn parse_range(data: &str) -> Result<Self, PeriodError> {
        let malformed = || PeriodError::Malformed(data.to_string());
        let (from, to) = data.trim().split_once(RANGE_SEPARATOR).ok_or_else(malformed)?;
        let from = NaiveDate::parse_from_str(from.trim(), DATE_FORMAT).map_err(|_| malformed())?;
        let to = NaiveDate::parse_from_str(to.trim(), DATE_FORMAT).map_err(|_| malformed())?;
        if from > to {
            return Err(PeriodError::Inverted { from, to });
        }
        Ok(Self::Range { from, to })
    }

    /// The order filter for this period as seen at `now`.
    pub fn to_filter(&self, now: DateTime<Utc>, offset_hours: i32) -> Result<OrderFilter, PeriodError> {
        let offset = Duration::hours(i64::from(offset_hours));
        let today = (now + offset).date_naive();

        let (first, last) = match *self {
            ReportPeriod::Today => (today, today),
            ReportPeriod::Yesterday => {
                let yesterday = today.pred_opt().ok_or(PeriodError::OutOfRange(today))?;
                (yesterday, yesterday)
            }
            ReportPeriod::Range { from, to } => {
                if from > to {
                    return Err(PeriodError::Inverted { from, to });
                }
                (from, to)
            }
        };

        let since = day_start(first, offset)?;
        let to = day_start(last, offset)? + Duration::days(1);
        Ok(OrderFilter::new(since, to))
    }
}

fn day_start(date: NaiveDate, offset: Duration) -> Result<DateTime<Utc>, PeriodError> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or(PeriodError::OutOfRange(date))?
        .and_utc();
    Ok(midnight - offset)
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportPeriod::Today => write!(f, "today"),
            ReportPeriod::Yesterday => write!(f, "yesterday"),
            ReportPeriod::Range { from, to } => write!(f, "{from}..={to}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_today_window() {
        let f = ReportPeriod::Today.to_filter(at(2024, 6, 2, 12), 4).unwrap();
        assert_eq!(f.since, at(2024, 6, 1, 20));
        assert_eq!(f.to, at(2024, 6, 2, 20));
        assert!(f.status.is_none());
    }

    #[test]
    fn test_today_after_local_midnight() {
        // 21:00Z is already the next local day at +4.
        let f = ReportPeriod::Today.to_filter(at(2024, 6, 2, 21), 4).unwrap();
        assert_eq!(f.since, at(2024, 6, 2, 20));
        assert_eq!(f.to, at(2024, 6, 3, 20));
    }

    #[test]
    fn test_yesterday_window() {
        let f = ReportPeriod::Yesterday.to_filter(at(2024, 6, 2, 12), 4).unwrap();
        assert_eq!(f.since, at(2024, 5, 31, 20));
        assert_eq!(f.to, at(2024, 6, 1, 20));
    }

    #[test]
    fn test_zero_offset() {
        let f = ReportPeriod::Today.to_filter(at(2024, 6, 2, 0), 0).unwrap();
        assert_eq!(f.since, at(2024, 6, 2, 0));
        assert_eq!(f.to, at(2024, 6, 3, 0));
    }

    #[test]
    fn test_range_is_inclusive() {
        let period = ReportPeriod::parse_range("2024-05-01::2024-05-03").unwrap();
        assert_eq!(period, ReportPeriod::Range { from: date(2024, 5, 1), to: date(2024, 5, 3) });
        let f = period.to_filter(at(2024, 6, 2, 12), 4).unwrap();
        assert_eq!(f.since, at(2024, 4, 30, 20));
        assert_eq!(f.to, at(2024, 5, 3, 20));
    }

    #[test]
    fn test_single_day_range() {
        let f = ReportPeriod::parse_range("2024-05-01::2024-05-01")
            .unwrap()
            .to_filter(at(2024, 6, 2, 12), 4)
            .unwrap();
        assert_eq!(f.to - f.since, Duration::days(1));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(ReportPeriod::parse_range("2024-05-01"), Err(PeriodError::Malformed(_))));
        assert!(matches!(
            ReportPeriod::parse_range("2024-05-01::tomorrow"),
            Err(PeriodError::Malformed(_))
        ));
        assert_eq!(
            ReportPeriod::parse_range("2024-05-03::2024-05-01"),
            Err(PeriodError::Inverted { from: date(2024, 5, 3), to: date(2024, 5, 1) })
        );
    }
}
