//! Property-based tests for IRC message parsing and formatting.
//!
//! Uses proptest to generate random IRC components and verify that:
//! 1. Parsing never panics on arbitrary input
//! 2. Formatted messages can be re-parsed (roundtrip)
//! 3. Outbound lines always respect the length limit and framing
//!
//! Run with: `cargo test --test proptest_roundtrip`

use bytes::BytesMut;
use proptest::prelude::*;
use slirc_client::util::truncate_utf8_safe;
use slirc_client::{Hostmask, LineCodec, Message, Tags};
use tokio_util::codec::Decoder;

// =============================================================================
// STRATEGIES - Generators for valid IRC components
// =============================================================================

/// Valid IRC nickname: starts with letter or special char, followed by
/// letters, digits, or special chars.
fn nickname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z\\[\\]\\\\^_`{|}][a-zA-Z0-9\\-\\[\\]\\\\^_`{|}]{0,15}")
        .expect("valid regex")
}

/// Valid IRC username (ident): no spaces or @ or !
fn username_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("~?[a-zA-Z][a-zA-Z0-9]{0,9}").expect("valid regex")
}

/// Valid hostname: simplified version
fn hostname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]+(\\.[a-z0-9]+)*").expect("valid regex")
}

fn hostmask_strategy() -> impl Strategy<Value = Hostmask> {
    prop_oneof![
        Just(Hostmask::default()),
        prop::string::string_regex("[a-z]+\\.[a-z]+\\.[a-z]+")
            .expect("valid regex")
            .prop_map(|server| Hostmask::new(server, "", "")),
        (nickname_strategy(), username_strategy(), hostname_strategy())
            .prop_map(|(nick, user, host)| Hostmask::new(nick, user, host)),
    ]
}

/// Middle parameter: non-empty, no spaces, no leading colon
fn middle_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[#&+a-zA-Z0-9*,.\\-][^ \r\n\0]{0,20}").expect("valid regex")
}

/// Message text that doesn't contain CR/LF/NUL
fn message_text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[^\r\n\0]{0,400}").expect("valid regex")
}

fn command_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[A-Z]{3,12}").expect("valid regex"),
        prop::string::string_regex("[0-9]{3}").expect("valid regex"),
    ]
}

/// Tag key: alphanumeric with optional client prefix and vendor
fn tag_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("\\+?([a-z]+\\.[a-z]+/)?[a-zA-Z][a-zA-Z0-9\\-]{0,20}")
        .expect("valid regex")
}

/// Tag value: anything printable, escaping included
fn tag_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~]{0,40}").expect("valid regex")
}

fn tags_strategy() -> impl Strategy<Value = Tags> {
    prop::collection::btree_map(tag_key_strategy(), tag_value_strategy(), 0..5)
}

/// Generate a complete valid Message
fn message_strategy() -> impl Strategy<Value = Message> {
    (
        tags_strategy(),
        hostmask_strategy(),
        command_strategy(),
        prop::collection::vec(middle_strategy(), 0..6),
        prop::option::of(message_text_strategy()),
    )
        .prop_map(|(tags, hostmask, command, mut args, trailing)| {
            args.extend(trailing);
            Message {
                tags,
                hostmask,
                command,
                args,
            }
        })
}

// =============================================================================
// ROUNDTRIP PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Formatting a valid message and parsing it again yields the same message
    #[test]
    fn test_display_roundtrip(msg in message_strategy()) {
        let formatted = msg.to_string();
        let reparsed: Message = formatted.parse().expect("formatted message parses");
        prop_assert_eq!(reparsed, msg);
    }

    /// The wire form without tags parses back to the same body
    #[test]
    fn test_wire_roundtrip(msg in message_strategy()) {
        let wire = msg.to_wire(false, 64 * 1024);
        let reparsed: Message = wire.trim_end_matches("\r\n").parse().expect("wire parses");
        prop_assert_eq!(&reparsed.command, &msg.command);
        prop_assert_eq!(&reparsed.args, &msg.args);
        prop_assert!(reparsed.tags.is_empty());
        prop_assert!(reparsed.hostmask.is_empty());
    }

    /// Tag values survive escaping
    #[test]
    fn test_tag_value_roundtrip(key in tag_key_strategy(), value in tag_value_strategy()) {
        let line = Message::new("TAGMSG", ["#c"]).with_tag(key.clone(), value.clone()).to_wire(true, 512);
        let reparsed: Message = line.trim_end_matches("\r\n").parse().expect("tagged line parses");
        prop_assert_eq!(reparsed.tag(&key), Some(value.as_str()));
    }
}

// =============================================================================
// ROBUSTNESS PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Parsing arbitrary text never panics
    #[test]
    fn test_parse_never_panics(input in "\\PC{0,300}") {
        let _ = input.parse::<Message>();
    }

    /// Outbound bodies never exceed the limit or carry line breaks
    #[test]
    fn test_wire_respects_limit(
        text in "\\PC{0,700}",
        breaks in prop::collection::vec(0usize..700, 0..4),
        limit in 16usize..1024,
    ) {
        let mut text = text;
        for at in breaks {
            let at = (0..=at.min(text.len())).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0);
            text.insert_str(at, "\r\n");
        }
        let wire = Message::privmsg("#channel", text).to_wire(false, limit);
        prop_assert!(wire.len() <= limit);
        prop_assert!(wire.ends_with("\r\n"));
        prop_assert!(!wire[..wire.len() - 2].contains(['\r', '\n']));
    }

    /// Truncation always lands on a char boundary within the budget
    #[test]
    fn test_truncate_utf8_safe(s in "\\PC{0,100}", max in 0usize..200) {
        let cut = truncate_utf8_safe(&s, max);
        prop_assert!(cut.len() <= max);
        prop_assert!(s.starts_with(cut));
        if s.len() <= max {
            prop_assert_eq!(cut, s.as_str());
        }
    }

    /// Framing does not depend on how the stream is chunked
    #[test]
    fn test_line_codec_chunking(
        lines in prop::collection::vec("[^\r\n]{1,40}", 1..8),
        terminator in prop::sample::select(vec!["\r\n", "\n", "\r", "\n\r"]),
        split in 0usize..400,
    ) {
        let stream: String = lines.iter().map(|l| format!("{}{}", l, terminator)).collect();
        let bytes = stream.as_bytes();
        let split = split.min(bytes.len());

        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for chunk in [&bytes[..split], &bytes[split..]] {
            buf.extend_from_slice(chunk);
            while let Some(line) = codec.decode(&mut buf).expect("decode") {
                decoded.push(line);
            }
        }
        prop_assert_eq!(decoded, lines);
    }
}
