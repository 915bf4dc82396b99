use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, TimeZone, Timelike, Utc, Weekday,
};
use serde::Serialize;

/// Whether trading is allowed right now, and a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketStatus {
    pub is_open: bool,
    pub reason: String,
}

impl MarketStatus {
    pub fn open() -> Self {
        Self {
            is_open: true,
            reason: "Market Open".to_string(),
        }
    }

    pub fn closed(reason: impl Into<String>) -> Self {
        Self {
            is_open: false,
            reason: reason.into(),
        }
    }
}

pub trait MarketHoursGate: Send + Sync {
    fn check(&self, now: DateTime<Utc>) -> MarketStatus;
}

/// Gate that never closes.
pub struct AlwaysOpen;

impl MarketHoursGate for AlwaysOpen {
    fn check(&self, _now: DateTime<Utc>) -> MarketStatus {
        MarketStatus::open()
    }
}

/// Regular US equity session: Mon-Fri 09:30-16:00 New York time.
///
/// Exchange holidays are not modelled.
pub struct UsEquityHours;

const OPEN_MINUTE: u32 = 9 * 60 + 30;
const CLOSE_MINUTE: u32 = 16 * 60;

impl MarketHoursGate for UsEquityHours {
    fn check(&self, now: DateTime<Utc>) -> MarketStatus {
        let local = now.with_timezone(&new_york_offset(now));
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return MarketStatus::closed("Market Closed (Weekend)");
        }
        let minute = local.hour() * 60 + local.minute();
        if minute < OPEN_MINUTE {
            MarketStatus::closed("Pre-Market (Before 9:30 AM ET)")
        } else if minute >= CLOSE_MINUTE {
            MarketStatus::closed("After-Hours (After 4:00 PM ET)")
        } else {
            MarketStatus::open()
        }
    }
}

fn nth_sunday(year: i32, month: u32, n: u32) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default();
    let to_sunday = (7 - first.weekday().num_days_from_sunday()) % 7;
    first + Duration::days(i64::from(to_sunday + 7 * (n - 1)))
}

/// UTC offset of New York at `now`.
///
/// Daylight time runs from 02:00 local on the second Sunday of March to
/// 02:00 local on the first Sunday of November.
pub fn new_york_offset(now: DateTime<Utc>) -> FixedOffset {
    let year = now.year();
    let dst_start = nth_sunday(year, 3, 2)
        .and_hms_opt(7, 0, 0)
        .unwrap_or_default()
        .and_utc();
    let dst_end = nth_sunday(year, 11, 1)
        .and_hms_opt(6, 0, 0)
        .unwrap_or_default()
        .and_utc();

    let hours_west = if now >= dst_start && now < dst_end { 4 } else { 5 };
    FixedOffset::west_opt(hours_west * 3600).unwrap_or(Utc.fix())
}
