//! User-local time arithmetic for delivery windows.
//!
//! The engine keeps every timestamp in UTC. Users express quiet hours,
//! digest times, and their daily cap against their own wall clock, carried
//! as a fixed offset in minutes on their preferences. The helpers here do
//! the conversions and answer the three questions the scheduler asks:
//! which local day is it, is this instant inside quiet hours, and where is
//! the most recent digest boundary.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};

use crate::types::Timestamp;

/// Shift a UTC instant into the user's wall clock.
pub fn to_local(now: Timestamp, utc_offset_minutes: i32) -> NaiveDateTime {
    (now + Duration::minutes(utc_offset_minutes as i64)).naive_utc()
}

/// Interpret a user-local wall-clock instant as UTC.
pub fn from_local(local: NaiveDateTime, utc_offset_minutes: i32) -> Timestamp {
    DateTime::from_naive_utc_and_offset(local - Duration::minutes(utc_offset_minutes as i64), Utc)
}

/// The user-local calendar day containing `now`. This is the key the
/// daily notification counter resets on.
pub fn local_day(now: Timestamp, utc_offset_minutes: i32) -> NaiveDate {
    to_local(now, utc_offset_minutes).date()
}

/// Half-open `[start, end)` membership test for a daily window, wrapping
/// past midnight when `start > end` (22:00..08:00 spans two calendar
/// days). `start == end` denotes an empty window and is never inside.
pub fn in_quiet_window(t: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start <= end {
        t >= start && t < end
    } else {
        t >= start || t < end
    }
}

/// First instant at or after `now` that is outside the quiet window.
/// Returns `now` unchanged when it is already outside; otherwise the next
/// occurrence of `end` on the user's clock, today or tomorrow.
pub fn quiet_release_at(
    now: Timestamp,
    utc_offset_minutes: i32,
    start: NaiveTime,
    end: NaiveTime,
) -> Timestamp {
    let local = to_local(now, utc_offset_minutes);
    if !in_quiet_window(local.time(), start, end) {
        return now;
    }
    let end_today = local.date().and_time(end);
    let release = if end_today > local {
        end_today
    } else {
        end_today + Duration::days(1)
    };
    from_local(release, utc_offset_minutes)
}

/// The most recent daily digest boundary at or before `now`: today's
/// `at` on the user's clock, or yesterday's if today's has not been
/// reached yet.
pub fn latest_daily_boundary(now: Timestamp, utc_offset_minutes: i32, at: NaiveTime) -> Timestamp {
    let local = to_local(now, utc_offset_minutes);
    let today_at = local.date().and_time(at);
    let boundary = if today_at <= local {
        today_at
    } else {
        today_at - Duration::days(1)
    };
    from_local(boundary, utc_offset_minutes)
}

/// The most recent weekly digest boundary at or before `now`: `at` on the
/// most recent occurrence of `weekday` on the user's clock.
pub fn latest_weekly_boundary(
    now: Timestamp,
    utc_offset_minutes: i32,
    at: NaiveTime,
    weekday: Weekday,
) -> Timestamp {
    let local = to_local(now, utc_offset_minutes);
    let days_back = (local.date().weekday().num_days_from_monday() + 7
        - weekday.num_days_from_monday())
        % 7;
    let mut candidate = (local.date() - Duration::days(days_back as i64)).and_time(at);
    if candidate > local {
        candidate = candidate - Duration::days(7);
    }
    from_local(candidate, utc_offset_minutes)
}
