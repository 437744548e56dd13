//! IRCv3 capability names and CAP payload parsing.
//!
//! This module provides the capability vocabulary the client understands and
//! helpers for splitting the token lists carried by `CAP LS`, `CAP NEW`,
//! `CAP ACK` and `CAP DEL`.
//!
//! # Reference
//! - IRCv3 Capability Negotiation: <https://ircv3.net/specs/extensions/capability-negotiation>
//! - Individual capability specifications: <https://ircv3.net/irc/>

use std::collections::{BTreeMap, BTreeSet};

/// Prefix of the pseudo-event dispatched when a capability is acknowledged.
pub const CAP_EVENT_PREFIX: &str = "IRCv3 ";

/// Capabilities requested by every connection unless configured otherwise.
pub const DEFAULT_CAPS: &[&str] = &[
    "account-notify",
    "account-tag",
    "away-notify",
    "cap-notify",
    "chghost",
    "draft/message-tags-0.2",
    "extended-join",
    "invite-notify",
    "message-tags",
    "oragono.io/maxline-2",
    "server-time",
    "sts",
];

/// Capabilities the client treats specially.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Client message tags support
    MessageTags,
    /// Pre-ratification name of `message-tags`
    DraftMessageTags,
    /// SASL authentication
    Sasl,
    /// Strict Transport Security
    Sts,
    /// Server-advertised maximum line length
    MaxLine,
    /// Notify of account login/logout
    AccountNotify,
    /// Add account tag to messages
    AccountTag,
    /// Notify of away status changes
    AwayNotify,
    /// Notify of capability changes
    CapNotify,
    /// Notify of hostname changes
    ChgHost,
    /// Extended JOIN with account and realname
    ExtendedJoin,
    /// Notify of channel invites
    InviteNotify,
    /// Server-time message tags
    ServerTime,
    /// Unknown/custom capability
    Custom(String),
}

impl Capability {
    /// Name of the pseudo-event dispatched when this capability is acknowledged.
    ///
    /// ```
    /// use slirc_client::caps::Capability;
    ///
    /// assert_eq!(Capability::Sasl.event_name(), "IRCV3 SASL");
    /// ```
    pub fn event_name(&self) -> String {
        cap_event_name(self.as_ref())
    }

    /// Whether this capability enables sending message tags.
    pub fn enables_tags(&self) -> bool {
        matches!(self, Self::MessageTags | Self::DraftMessageTags)
    }
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        match self {
            Self::MessageTags => "message-tags",
            Self::DraftMessageTags => "draft/message-tags-0.2",
            Self::Sasl => "sasl",
            Self::Sts => "sts",
            Self::MaxLine => "oragono.io/maxline-2",
            Self::AccountNotify => "account-notify",
            Self::AccountTag => "account-tag",
            Self::AwayNotify => "away-notify",
            Self::CapNotify => "cap-notify",
            Self::ChgHost => "chghost",
            Self::ExtendedJoin => "extended-join",
            Self::InviteNotify => "invite-notify",
            Self::ServerTime => "server-time",
            Self::Custom(s) => s,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        match s {
            "message-tags" => Self::MessageTags,
            "draft/message-tags-0.2" => Self::DraftMessageTags,
            "sasl" => Self::Sasl,
            "sts" => Self::Sts,
            "oragono.io/maxline-2" => Self::MaxLine,
            "account-notify" => Self::AccountNotify,
            "account-tag" => Self::AccountTag,
            "away-notify" => Self::AwayNotify,
            "cap-notify" => Self::CapNotify,
            "chghost" => Self::ChgHost,
            "extended-join" => Self::ExtendedJoin,
            "invite-notify" => Self::InviteNotify,
            "server-time" => Self::ServerTime,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// Build the pseudo-event name for a capability.
pub fn cap_event_name(cap: &str) -> String {
    format!("{}{}", CAP_EVENT_PREFIX, cap).to_ascii_uppercase()
}

/// The default capability set as owned names.
pub fn default_caps() -> BTreeSet<String> {
    DEFAULT_CAPS.iter().map(|c| (*c).to_owned()).collect()
}

/// Split a `CAP LS`/`CAP NEW` token into its lowercased name and the raw
/// parts as they appeared: `[name]` or `[name, value]`.
///
/// ```
/// use slirc_client::caps::split_cap_token;
///
/// let (name, raw) = split_cap_token("SASL=PLAIN,EXTERNAL");
/// assert_eq!(name, "sasl");
/// assert_eq!(raw, vec!["SASL", "PLAIN,EXTERNAL"]);
/// ```
pub fn split_cap_token(token: &str) -> (String, Vec<String>) {
    let raw: Vec<String> = token.splitn(2, '=').map(str::to_owned).collect();
    let name = raw.first().map(|n| n.to_ascii_lowercase()).unwrap_or_default();
    (name, raw)
}

/// A single entry of a `CAP ACK` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapChange {
    /// Capability is now enabled.
    Enable(String),
    /// Capability is now disabled (`-name`).
    Disable(String),
}

/// Parse the capability list of a `CAP ACK`.
///
/// Legacy `~` and `=` modifiers are stripped; `-` marks a removal.
pub fn parse_ack(list: &str) -> Vec<CapChange> {
    list.split_whitespace()
        .filter_map(|cap| {
            let (removal, name) = match cap.strip_prefix('-') {
                Some(name) => (true, name),
                None => (false, cap),
            };
            let name = name.trim_start_matches(['~', '=']).to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            Some(if removal {
                CapChange::Disable(name)
            } else {
                CapChange::Enable(name)
            })
        })
        .collect()
}

/// Parse a comma-separated `key=value` capability value, as used by `sts`.
///
/// ```
/// use slirc_client::caps::parse_cap_values;
///
/// let values = parse_cap_values("port=6697,duration=300,preload");
/// assert_eq!(values["port"], "6697");
/// assert_eq!(values["preload"], "");
/// ```
pub fn parse_cap_values(value: &str) -> BTreeMap<String, String> {
    value
        .split(',')
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((k, v)) => (k.to_owned(), v.to_owned()),
            None => (entry.to_owned(), String::new()),
        })
        .collect()
}

/// Upgrade port advertised by an `sts` value, from the pseudo-event args
/// `[name, value]`.
pub fn sts_port(args: &[String]) -> Option<u16> {
    let value = args.get(1)?;
    parse_cap_values(value).get("port")?.parse().ok()
}

/// Line length advertised by `oragono.io/maxline-2`, never below `floor`.
pub fn max_line_len(args: &[String], floor: usize) -> Option<usize> {
    let len: usize = args.get(1)?.parse().ok()?;
    Some(len.max(floor))
}
