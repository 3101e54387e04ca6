//! Per-user notification delivery preferences.
//!
//! One preference record per user governs every rule the user owns: which
//! channels are live, whether delivery is immediate or digested, quiet
//! hours, and the daily cap. Users without a stored record get
//! [`NotificationPreferences::default_for`].

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Weekday};

use crate::channels::ChannelKind;
use crate::error::CoreError;
use crate::types::DbId;

/// Default daily notification cap for users who never touched the setting.
pub const DEFAULT_MAX_PER_DAY: i32 = 10;

/// Largest accepted UTC offset, in minutes (UTC+14:00, Line Islands).
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// How matched deals reach the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// Every surviving match dispatches on its own as soon as allowed.
    Immediate,
    /// Matches collect into one digest per day at `digest_time`.
    Daily,
    /// Matches collect into one digest per week on `digest_weekday`.
    Weekly,
}

impl Frequency {
    /// Stable lowercase name used in storage and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Immediate => "immediate",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }

    /// True for the digest cadences (daily, weekly).
    pub fn is_digest(&self) -> bool {
        !matches!(self, Frequency::Immediate)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "immediate" => Ok(Frequency::Immediate),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            other => Err(CoreError::Validation(format!(
                "Unknown frequency: '{other}'. Valid frequencies: immediate, daily, weekly"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Weekday storage mapping
// ---------------------------------------------------------------------------

/// Map a weekday to its stored SMALLINT (0 = Monday .. 6 = Sunday).
pub fn weekday_to_index(day: Weekday) -> i16 {
    day.num_days_from_monday() as i16
}

/// Inverse of [`weekday_to_index`].
pub fn weekday_from_index(idx: i16) -> Result<Weekday, CoreError> {
    match idx {
        0 => Ok(Weekday::Mon),
        1 => Ok(Weekday::Tue),
        2 => Ok(Weekday::Wed),
        3 => Ok(Weekday::Thu),
        4 => Ok(Weekday::Fri),
        5 => Ok(Weekday::Sat),
        6 => Ok(Weekday::Sun),
        other => Err(CoreError::Validation(format!(
            "Weekday index must be 0..=6 (Monday..Sunday), got {other}"
        ))),
    }
}

/// Parse a lowercase weekday name as used by the preferences API.
pub fn weekday_from_name(name: &str) -> Result<Weekday, CoreError> {
    match name {
        "monday" => Ok(Weekday::Mon),
        "tuesday" => Ok(Weekday::Tue),
        "wednesday" => Ok(Weekday::Wed),
        "thursday" => Ok(Weekday::Thu),
        "friday" => Ok(Weekday::Fri),
        "saturday" => Ok(Weekday::Sat),
        "sunday" => Ok(Weekday::Sun),
        other => Err(CoreError::Validation(format!(
            "Unknown weekday: '{other}'. Use lowercase English names (monday..sunday)"
        ))),
    }
}

/// Lowercase English name for a weekday, the inverse of
/// [`weekday_from_name`].
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// Delivery policy and channel settings for one user.
#[derive(Debug, Clone)]
pub struct NotificationPreferences {
    pub user_id: DbId,
    /// Master channel switch: a channel absent here never receives
    /// anything, even when a rule names it.
    pub channels: Vec<ChannelKind>,
    pub frequency: Frequency,
    /// Local time of day for digest flushes; required unless immediate.
    pub digest_time: Option<NaiveTime>,
    /// Day for weekly digests.
    pub digest_weekday: Weekday,
    pub quiet_hours_enabled: bool,
    pub quiet_start: Option<NaiveTime>,
    pub quiet_end: Option<NaiveTime>,
    /// Daily notification cap; suppressed matches above it are dropped.
    pub max_per_day: i32,
    /// The user's wall clock as a fixed offset from UTC, in minutes.
    /// Governs quiet hours, digest times, and the daily-cap day boundary.
    pub utc_offset_minutes: i32,
    pub email: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub phone_number: Option<String>,
    pub phone_verified: bool,
    pub push_token: Option<String>,
}

impl NotificationPreferences {
    /// Defaults applied to users who never stored preferences: immediate
    /// email delivery, no quiet hours, ten notifications per day, UTC.
    pub fn default_for(user_id: DbId) -> Self {
        Self {
            user_id,
            channels: vec![ChannelKind::Email],
            frequency: Frequency::Immediate,
            digest_time: None,
            digest_weekday: Weekday::Mon,
            quiet_hours_enabled: false,
            quiet_start: None,
            quiet_end: None,
            max_per_day: DEFAULT_MAX_PER_DAY,
            utc_offset_minutes: 0,
            email: None,
            discord_webhook_url: None,
            phone_number: None,
            phone_verified: false,
            push_token: None,
        }
    }

    /// Validate the combined record. Called before any preference write.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.frequency.is_digest() && self.digest_time.is_none() {
            return Err(CoreError::Validation(format!(
                "digest_time is required when frequency is '{}'",
                self.frequency
            )));
        }
        if self.quiet_hours_enabled {
            match (self.quiet_start, self.quiet_end) {
                (Some(start), Some(end)) => {
                    if start == end {
                        return Err(CoreError::Validation(
                            "Quiet hours start and end must differ (the window is half-open)"
                                .into(),
                        ));
                    }
                }
                _ => {
                    return Err(CoreError::Validation(
                        "Quiet hours require both quiet_start and quiet_end".into(),
                    ));
                }
            }
        }
        if self.max_per_day < 1 {
            return Err(CoreError::Validation(format!(
                "max_per_day must be at least 1, got {}",
                self.max_per_day
            )));
        }
        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(CoreError::Validation(format!(
                "utc_offset_minutes must be within +/-{MAX_UTC_OFFSET_MINUTES}, got {}",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }

    /// Whether the user has this channel switched on at all.
    pub fn channel_enabled(&self, kind: ChannelKind) -> bool {
        self.channels.contains(&kind)
    }

    /// The quiet window, when quiet hours are enabled and fully configured.
    pub fn quiet_window(&self) -> Option<(NaiveTime, NaiveTime)> {
        if !self.quiet_hours_enabled {
            return None;
        }
        match (self.quiet_start, self.quiet_end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs() -> NotificationPreferences {
        NotificationPreferences::default_for(1)
    }

    // -- frequency parsing ----------------------------------------------------

    #[test]
    fn frequency_round_trips() {
        for f in [Frequency::Immediate, Frequency::Daily, Frequency::Weekly] {
            assert_eq!(f.as_str().parse::<Frequency>().unwrap(), f);
        }
    }

    #[test]
    fn unknown_frequency_rejected() {
        assert!("hourly".parse::<Frequency>().is_err());
    }

    // -- weekday mapping ------------------------------------------------------

    #[test]
    fn weekday_index_round_trips() {
        for idx in 0..=6 {
            let day = weekday_from_index(idx).unwrap();
            assert_eq!(weekday_to_index(day), idx);
        }
    }

    #[test]
    fn weekday_index_out_of_range_rejected() {
        assert!(weekday_from_index(7).is_err());
        assert!(weekday_from_index(-1).is_err());
    }

    #[test]
    fn weekday_name_round_trips() {
        for name in [
            "monday",
            "tuesday",
            "wednesday",
            "thursday",
            "friday",
            "saturday",
            "sunday",
        ] {
            assert_eq!(weekday_name(weekday_from_name(name).unwrap()), name);
        }
    }

    // -- validate -------------------------------------------------------------

    #[test]
    fn defaults_validate() {
        assert!(prefs().validate().is_ok());
    }

    #[test]
    fn digest_frequency_requires_digest_time() {
        let mut p = prefs();
        p.frequency = Frequency::Daily;
        assert!(p.validate().is_err());

        p.digest_time = NaiveTime::from_hms_opt(9, 0, 0);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn quiet_hours_require_both_bounds() {
        let mut p = prefs();
        p.quiet_hours_enabled = true;
        p.quiet_start = NaiveTime::from_hms_opt(22, 0, 0);
        assert!(p.validate().is_err());

        p.quiet_end = NaiveTime::from_hms_opt(8, 0, 0);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn empty_quiet_window_rejected() {
        let mut p = prefs();
        p.quiet_hours_enabled = true;
        p.quiet_start = NaiveTime::from_hms_opt(22, 0, 0);
        p.quiet_end = NaiveTime::from_hms_opt(22, 0, 0);
        assert!(p.validate().is_err());
    }

    #[test]
    fn zero_daily_cap_rejected() {
        let mut p = prefs();
        p.max_per_day = 0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn absurd_utc_offset_rejected() {
        let mut p = prefs();
        p.utc_offset_minutes = 15 * 60;
        assert!(p.validate().is_err());
        p.utc_offset_minutes = -14 * 60;
        assert!(p.validate().is_ok());
    }

    // -- helpers --------------------------------------------------------------

    #[test]
    fn channel_enabled_checks_membership() {
        let p = prefs();
        assert!(p.channel_enabled(ChannelKind::Email));
        assert!(!p.channel_enabled(ChannelKind::Sms));
    }

    #[test]
    fn quiet_window_only_when_enabled() {
        let mut p = prefs();
        p.quiet_start = NaiveTime::from_hms_opt(22, 0, 0);
        p.quiet_end = NaiveTime::from_hms_opt(8, 0, 0);
        assert!(p.quiet_window().is_none());

        p.quiet_hours_enabled = true;
        assert!(p.quiet_window().is_some());
    }
}
