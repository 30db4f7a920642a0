use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::tier::{ResetPeriod, ResourceType};

/// Boundaries of the active window for some reset period. `start` is
/// inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// One (subject, resource) usage counter within a window. There is exactly
/// one active window per pair; an expired one is superseded lazily on the
/// next store access, never by a background sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageWindow {
    pub subject_id: String,
    pub resource: ResourceType,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub count: u32,
}

/// Computes fixed clock-window boundaries.
///
/// All arithmetic is done in UTC, as a fixed system parameter. Windows are
/// aligned to the clock (top of hour, UTC midnight, first of month), not
/// sliding lookbacks.
pub struct WindowClock;

impl WindowClock {
    pub fn current_window(period: ResetPeriod, now: DateTime<Utc>) -> WindowBounds {
        match period {
            ResetPeriod::Hourly => {
                let ts = now.timestamp();
                let start_ts = ts - ts.rem_euclid(3600);
                let start = DateTime::from_timestamp(start_ts, 0).unwrap_or(now);
                WindowBounds {
                    start,
                    end: start + Duration::hours(1),
                }
            }
            ResetPeriod::Daily => {
                let ts = now.timestamp();
                let start_ts = ts - ts.rem_euclid(86_400);
                let start = DateTime::from_timestamp(start_ts, 0).unwrap_or(now);
                WindowBounds {
                    start,
                    end: start + Duration::hours(24),
                }
            }
            ResetPeriod::Monthly => {
                let start = month_start(now.year(), now.month(), now);
                let (next_year, next_month) = if now.month() == 12 {
                    (now.year() + 1, 1)
                } else {
                    (now.year(), now.month() + 1)
                };
                let end = month_start(next_year, next_month, now);
                WindowBounds { start, end }
            }
        }
    }
}

fn month_start(year: i32, month: u32, fallback: DateTime<Utc>) -> DateTime<Utc> {
    // The first of a real month always exists; the fallback is unreachable
    // for the year/month pairs we pass in.
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_hourly_window() {
        let now = at(2025, 3, 14, 15, 42, 7);
        let w = WindowClock::current_window(ResetPeriod::Hourly, now);
        assert_eq!(w.start, at(2025, 3, 14, 15, 0, 0));
        assert_eq!(w.end, at(2025, 3, 14, 16, 0, 0));
    }

    #[test]
    fn test_daily_window() {
        let now = at(2025, 3, 14, 23, 59, 59);
        let w = WindowClock::current_window(ResetPeriod::Daily, now);
        assert_eq!(w.start, at(2025, 3, 14, 0, 0, 0));
        assert_eq!(w.end, at(2025, 3, 15, 0, 0, 0));
    }

    #[test]
    fn test_monthly_window_variable_lengths() {
        // February, non-leap year
        let w = WindowClock::current_window(ResetPeriod::Monthly, at(2025, 2, 10, 12, 0, 0));
        assert_eq!(w.start, at(2025, 2, 1, 0, 0, 0));
        assert_eq!(w.end, at(2025, 3, 1, 0, 0, 0));

        // February, leap year
        let w = WindowClock::current_window(ResetPeriod::Monthly, at(2024, 2, 29, 23, 0, 0));
        assert_eq!(w.start, at(2024, 2, 1, 0, 0, 0));
        assert_eq!(w.end, at(2024, 3, 1, 0, 0, 0));

        // 31-day month
        let w = WindowClock::current_window(ResetPeriod::Monthly, at(2025, 5, 31, 1, 2, 3));
        assert_eq!(w.end, at(2025, 6, 1, 0, 0, 0));
    }

    #[test]
    fn test_monthly_window_december_rollover() {
        let w = WindowClock::current_window(ResetPeriod::Monthly, at(2025, 12, 25, 8, 0, 0));
        assert_eq!(w.start, at(2025, 12, 1, 0, 0, 0));
        assert_eq!(w.end, at(2026, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_window_start_is_stable_within_period() {
        let a = WindowClock::current_window(ResetPeriod::Hourly, at(2025, 6, 1, 9, 0, 0));
        let b = WindowClock::current_window(ResetPeriod::Hourly, at(2025, 6, 1, 9, 59, 59));
        assert_eq!(a, b);
    }

    #[test]
    fn test_boundary_instant_belongs_to_new_window() {
        // `end` is exclusive: at exactly the boundary a fresh window starts.
        let w = WindowClock::current_window(ResetPeriod::Daily, at(2025, 3, 15, 0, 0, 0));
        assert_eq!(w.start, at(2025, 3, 15, 0, 0, 0));
    }
}
