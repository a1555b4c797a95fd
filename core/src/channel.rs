//! Realtime channel names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Logical realtime topic. Each channel maps to its own hub endpoint and at
/// most one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// User notifications
    Notification,
    /// Event lifecycle updates (published, cancelled, ...)
    Event,
    /// Ticket sales and check-ins
    Ticket,
    /// Feedback and ratings
    Feedback,
    /// Account and session changes
    Identity,
    /// News posts
    News,
    /// Comment threads
    Comment,
}

impl Channel {
    /// Number of channels.
    pub const COUNT: usize = 7;

    /// Every channel, in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Notification,
        Self::Event,
        Self::Ticket,
        Self::Feedback,
        Self::Identity,
        Self::News,
        Self::Comment,
    ];

    /// Wire name of the channel.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Notification => "notification",
            Self::Event => "event",
            Self::Ticket => "ticket",
            Self::Feedback => "feedback",
            Self::Identity => "identity",
            Self::News => "news",
            Self::Comment => "comment",
        }
    }

    /// Hub endpoint for this channel under `base_url` (`{base}/{name}Hub`).
    ///
    /// ```
    /// use boxoffice_core::channel::Channel;
    ///
    /// assert_eq!(
    ///     Channel::Notification.hub_url("https://api.example.com/hubs/"),
    ///     "https://api.example.com/hubs/notificationHub"
    /// );
    /// ```
    #[must_use]
    pub fn hub_url(self, base_url: &str) -> String {
        format!("{}/{}Hub", base_url.trim_end_matches('/'), self.as_str())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a name outside the closed channel set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown channel: {0}")]
pub struct UnknownChannel(pub String);

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|channel| channel.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownChannel(s.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_every_channel() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("News".parse::<Channel>().unwrap(), Channel::News);
        assert_eq!(" TICKET ".parse::<Channel>().unwrap(), Channel::Ticket);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "chat".parse::<Channel>().unwrap_err();
        assert_eq!(err, UnknownChannel("chat".to_string()));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&Channel::Identity).unwrap(), "\"identity\"");
        let parsed: Channel = serde_json::from_str("\"comment\"").unwrap();
        assert_eq!(parsed, Channel::Comment);
    }

    #[test]
    fn test_hub_url() {
        assert_eq!(
            Channel::Event.hub_url("http://localhost:5000/hubs"),
            "http://localhost:5000/hubs/eventHub"
        );
    }
}
