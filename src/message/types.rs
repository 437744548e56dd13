//! The owned IRC message type.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::nom_parser::ParsedMessage;
use super::serialize;
use super::tags::{decode_tags, Tags};
use crate::error::MessageParseError;
use crate::prefix::Hostmask;

/// A single IRC message.
///
/// Inbound lines are parsed into this type by [`FromStr`]; outbound
/// messages are built with the constructors below and serialized by the
/// engine. The command is always uppercase. The hostmask has all three parts
/// populated (empty strings when absent) and is ignored when sending.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// IRCv3 message tags. A valueless tag maps to `""`.
    pub tags: Tags,
    /// Message origin.
    pub hostmask: Hostmask,
    /// Uppercased command name or three-digit numeric.
    pub command: String,
    /// Arguments, with the trailing parameter already unwrapped.
    pub args: Vec<String>,
}

impl Message {
    /// Create a message from a command and its arguments.
    ///
    /// ```
    /// use slirc_client::Message;
    ///
    /// let msg = Message::new("join", ["#rust"]);
    /// assert_eq!(msg.command, "JOIN");
    /// assert_eq!(msg.args, vec!["#rust"]);
    /// ```
    pub fn new<S: Into<String>>(command: &str, args: impl IntoIterator<Item = S>) -> Self {
        Self {
            tags: Tags::new(),
            hostmask: Hostmask::default(),
            command: command.to_ascii_uppercase(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a `PRIVMSG`.
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new("PRIVMSG", [target.into(), text.into()])
    }

    /// Create a `NOTICE`.
    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new("NOTICE", [target.into(), text.into()])
    }

    /// Add or replace a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Merge a tag map into this message.
    #[must_use]
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Set the message origin.
    #[must_use]
    pub fn with_hostmask(mut self, hostmask: Hostmask) -> Self {
        self.hostmask = hostmask;
        self
    }

    /// Get an argument by index.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Get the last argument, usually the trailing text.
    pub fn last_arg(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }

    /// Get a tag value.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Parse the IRCv3 `time` tag.
    ///
    /// ```
    /// use slirc_client::Message;
    ///
    /// let msg: Message = "@time=2023-01-01T12:00:00.000Z PING x".parse().unwrap();
    /// assert_eq!(msg.server_time().unwrap().timestamp(), 1672574400);
    /// ```
    pub fn server_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.tag("time")?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Format this message for the wire, CRLF included.
    ///
    /// Tags are written only when `tags_enabled` is set. The body (command
    /// and arguments) is truncated on a character boundary so that body plus
    /// CRLF fits in `max_line_len` bytes; tags do not count toward that limit.
    pub fn to_wire(&self, tags_enabled: bool, max_line_len: usize) -> String {
        serialize::to_wire(self, tags_enabled, max_line_len)
    }
}

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = ParsedMessage::parse(s)?;
        Ok(Self {
            tags: parsed.tags.map(decode_tags).unwrap_or_default(),
            hostmask: parsed.prefix.map(Hostmask::parse).unwrap_or_default(),
            command: parsed.command.to_ascii_uppercase(),
            args: parsed.params.into_iter().map(str::to_owned).collect(),
        })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        serialize::write_display(f, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_hostmask() {
        let msg: Message = ":a!b@c CMD".parse().unwrap();
        assert_eq!(msg.hostmask, Hostmask::new("a", "b", "c"));
        assert_eq!(msg.command, "CMD");
        assert!(msg.args.is_empty());
    }

    #[test]
    fn test_parse_nick_only_hostmask() {
        let msg: Message = ":a CMD".parse().unwrap();
        assert_eq!(msg.hostmask, Hostmask::new("a", "", ""));
    }

    #[test]
    fn test_parse_no_prefix_is_all_empty() {
        let msg: Message = "CMD".parse().unwrap();
        assert!(msg.hostmask.is_empty());
        assert!(msg.tags.is_empty());
    }

    #[test]
    fn test_parse_uppercases_command() {
        let msg: Message = "privmsg #a :hi".parse().unwrap();
        assert_eq!(msg.command, "PRIVMSG");
    }

    #[test]
    fn test_parse_decodes_tags() {
        let msg: Message = "@a=1;b;c=x\\sy :n!u@h PRIVMSG #c :hello".parse().unwrap();
        assert_eq!(msg.tag("a"), Some("1"));
        assert_eq!(msg.tag("b"), Some(""));
        assert_eq!(msg.tag("c"), Some("x y"));
        assert_eq!(msg.tag("missing"), None);
    }

    #[test]
    fn test_trailing_rule() {
        let msg: Message = "CMD a b :c d e".parse().unwrap();
        assert_eq!(msg.args, vec!["a", "b", "c d e"]);
        assert_eq!(msg.last_arg(), Some("c d e"));
        assert_eq!(msg.arg(0), Some("a"));
        assert_eq!(msg.arg(3), None);
    }

    #[test]
    fn test_display_round_trip() {
        let msg = Message::privmsg("#chan", "hello world")
            .with_tag("msgid", "abc")
            .with_hostmask(Hostmask::new("nick", "user", "host"));
        let reparsed: Message = msg.to_string().parse().unwrap();
        assert_eq!(reparsed, msg);
    }

    #[test]
    fn test_server_time_invalid() {
        let msg = Message::new("PING", ["x"]).with_tag("time", "yesterday");
        assert!(msg.server_time().is_none());
        assert!(Message::new("PING", ["x"]).server_time().is_none());
    }
}
