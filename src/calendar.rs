//! Local wall-clock helpers for the site's time zone.

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

pub const DAY_SECONDS: i64 = 24 * 60 * 60;
pub const WEEK_SECONDS: i64 = 7 * DAY_SECONDS;

/// Local calendar date of a Unix timestamp.
pub fn local_date(tz: Tz, ts: i64) -> Option<NaiveDate> {
    Some(Utc.timestamp_opt(ts, 0).single()?.with_timezone(&tz).date_naive())
}

/// Local wall-clock time of a Unix timestamp.
pub fn local_time(tz: Tz, ts: i64) -> Option<NaiveTime> {
    Some(Utc.timestamp_opt(ts, 0).single()?.with_timezone(&tz).time())
}

/// First instant of `date` in `tz`.
///
/// Zones that skip midnight on a DST change start the day at the first
/// wall-clock hour that exists.
pub fn day_start(tz: Tz, date: NaiveDate) -> Option<i64> {
    (0..4).find_map(|hour| {
        let wall = date.and_time(NaiveTime::from_hms_opt(hour, 0, 0)?);
        tz.from_local_datetime(&wall)
            .earliest()
            .map(|dt| dt.timestamp())
    })
}

/// Last whole second of `date` in `tz`.
pub fn day_end(tz: Tz, date: NaiveDate) -> Option<i64> {
    Some(day_start(tz, date.succ_opt()?)? - 1)
}
