//! Notification delivery channel identifiers.
//!
//! The lowercase name is the stable representation: it is what the
//! `notification_attempts.channel` and `alert_rules.channels` columns
//! store and what the channel-test API path accepts.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A delivery channel the dispatcher can fan out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// SMTP email.
    Email,
    /// Discord webhook post.
    Discord,
    /// SMS text message.
    Sms,
    /// Mobile push notification.
    Push,
}

impl ChannelKind {
    /// All channels, in dispatch order.
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::Email,
        ChannelKind::Discord,
        ChannelKind::Sms,
        ChannelKind::Push,
    ];

    /// Stable lowercase name used in storage and API paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Discord => "discord",
            ChannelKind::Sms => "sms",
            ChannelKind::Push => "push",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(ChannelKind::Email),
            "discord" => Ok(ChannelKind::Discord),
            "sms" => Ok(ChannelKind::Sms),
            "push" => Ok(ChannelKind::Push),
            other => Err(CoreError::Validation(format!(
                "Unknown channel: '{other}'. Valid channels: email, discord, sms, push"
            ))),
        }
    }
}

/// Parse a list of channel names, rejecting the whole list on the first
/// unknown entry. Duplicates are collapsed, preserving first occurrence
/// order.
pub fn parse_channels(names: &[String]) -> Result<Vec<ChannelKind>, CoreError> {
    let mut out: Vec<ChannelKind> = Vec::with_capacity(names.len());
    for name in names {
        let kind = name.trim().parse::<ChannelKind>()?;
        if !out.contains(&kind) {
            out.push(kind);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- parsing --------------------------------------------------------------

    #[test]
    fn every_channel_round_trips() {
        for kind in ChannelKind::ALL {
            assert_eq!(kind.as_str().parse::<ChannelKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_channel_rejected() {
        let err = "pigeon".parse::<ChannelKind>().unwrap_err();
        assert!(err.to_string().contains("pigeon"));
        assert!(err.to_string().contains("email, discord, sms, push"));
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(ChannelKind::Discord.to_string(), "discord");
    }

    // -- parse_channels -------------------------------------------------------

    #[test]
    fn parse_channels_collapses_duplicates() {
        let names = vec!["email".into(), "sms".into(), "email".into()];
        let parsed = parse_channels(&names).unwrap();
        assert_eq!(parsed, vec![ChannelKind::Email, ChannelKind::Sms]);
    }

    #[test]
    fn parse_channels_trims_whitespace() {
        let names = vec![" push ".into()];
        assert_eq!(parse_channels(&names).unwrap(), vec![ChannelKind::Push]);
    }

    #[test]
    fn parse_channels_rejects_unknown_entry() {
        let names = vec!["email".into(), "telegram".into()];
        assert!(parse_channels(&names).is_err());
    }
}
