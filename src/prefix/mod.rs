//! IRC message source (hostmask) type.

use std::fmt;

/// The origin of a message: `nick!user@host`.
///
/// All three parts are always present. Parts missing from the wire are empty
/// strings and are never filled in from another part. A line without any
/// prefix yields an all-empty hostmask.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hostmask {
    /// Nickname, or the server name for server-originated lines.
    pub nick: String,
    /// Username (ident).
    pub user: String,
    /// Hostname.
    pub host: String,
}

impl Hostmask {
    /// Create a hostmask from its three parts.
    pub fn new(nick: impl Into<String>, user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            user: user.into(),
            host: host.into(),
        }
    }

    /// Parse a raw prefix (without the leading `:`).
    ///
    /// ```
    /// use slirc_client::Hostmask;
    ///
    /// assert_eq!(Hostmask::parse("a!b@c"), Hostmask::new("a", "b", "c"));
    /// assert_eq!(Hostmask::parse("a@c"), Hostmask::new("a", "", "c"));
    /// assert_eq!(Hostmask::parse("irc.example.com"), Hostmask::new("irc.example.com", "", ""));
    /// ```
    pub fn parse(raw: &str) -> Self {
        let (rest, host) = raw.split_once('@').unwrap_or((raw, ""));
        let (nick, user) = rest.split_once('!').unwrap_or((rest, ""));
        Self::new(nick, user, host)
    }

    /// Returns true when all three parts are empty.
    pub fn is_empty(&self) -> bool {
        self.nick.is_empty() && self.user.is_empty() && self.host.is_empty()
    }
}

impl fmt::Display for Hostmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nick)?;
        if !self.user.is_empty() {
            write!(f, "!{}", self.user)?;
        }
        if !self.host.is_empty() {
            write!(f, "@{}", self.host)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let hm = Hostmask::parse("nick!user@host.example");
        assert_eq!(hm.nick, "nick");
        assert_eq!(hm.user, "user");
        assert_eq!(hm.host, "host.example");
    }

    #[test]
    fn test_parse_pads_with_empty() {
        assert_eq!(Hostmask::parse("nick"), Hostmask::new("nick", "", ""));
        assert_eq!(Hostmask::parse("nick!user"), Hostmask::new("nick", "user", ""));
    }

    #[test]
    fn test_display_round_trip() {
        for raw in ["a!b@c", "a", "a@c", "a!b"] {
            assert_eq!(Hostmask::parse(raw).to_string(), raw);
        }
    }
}
