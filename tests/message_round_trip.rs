//! Integration tests for message parsing and serialization
//!
//! These tests verify that messages can be parsed from strings and then
//! serialized back to equivalent strings, ensuring round-trip compatibility.

use slirc_client::{Hostmask, Message};

fn round_trip(original: &str) -> Message {
    let message: Message = original.parse().expect("Failed to parse message");
    let serialized = message.to_string();
    let reparsed: Message = serialized.parse().expect("Failed to reparse message");
    assert_eq!(message, reparsed, "{original:?} -> {serialized:?}");
    message
}

#[test]
fn test_message_round_trip_simple() {
    let message = round_trip("PING :irc.example.com");
    assert_eq!(message.command, "PING");
    assert_eq!(message.args, ["irc.example.com"]);
    assert!(message.hostmask.is_empty());
}

#[test]
fn test_message_round_trip_with_prefix() {
    let message = round_trip(":nick!user@host PRIVMSG #channel :Hello, world!");
    assert_eq!(message.hostmask, Hostmask::new("nick", "user", "host"));
    assert_eq!(message.to_string(), ":nick!user@host PRIVMSG #channel :Hello, world!");
}

#[test]
fn test_message_round_trip_with_tags() {
    let message = round_trip(
        "@time=2023-01-01T00:00:00.000Z;msgid=abc123 :nick!user@host PRIVMSG #channel :Tagged message",
    );
    assert_eq!(message.tag("msgid"), Some("abc123"));
    assert_eq!(message.server_time().unwrap().timestamp(), 1672531200);
}

#[test]
fn test_message_round_trip_numeric_response() {
    let message = round_trip(":server 001 nickname :Welcome to the IRC Network");
    assert_eq!(message.command, "001");
    assert_eq!(message.hostmask, Hostmask::new("server", "", ""));
}

#[test]
fn test_message_round_trip_complex_tags() {
    let message = round_trip(
        "@batch=abc123;msgid=def456;time=2023-01-01T12:00:00Z;+custom=value :nick BATCH +abc123 chathistory #channel",
    );
    assert_eq!(message.tags.len(), 4);
    assert_eq!(message.tag("+custom"), Some("value"));
    assert_eq!(message.args, ["+abc123", "chathistory", "#channel"]);
}

#[test]
fn test_message_round_trip_escaped_tag_values() {
    let message = round_trip("@+example=a\\sb\\:c\\\\d :n PRIVMSG #c :x");
    assert_eq!(message.tag("+example"), Some("a b;c\\d"));
    assert!(message.to_string().starts_with("@+example=a\\sb\\:c\\\\d "));
}

#[test]
fn test_message_round_trip_valueless_tag() {
    let message = round_trip("@+typing;account= :n TAGMSG #c");
    assert_eq!(message.tag("+typing"), Some(""));
    assert_eq!(message.tag("account"), Some(""));
    assert_eq!(message.to_string(), "@+typing;account :n TAGMSG #c");
}

#[test]
fn test_message_round_trip_empty_trailing() {
    let message = round_trip(":nick!u@h TOPIC #channel :");
    assert_eq!(message.args, ["#channel", ""]);
}

#[test]
fn test_message_round_trip_trailing_colon() {
    let message = round_trip(":nick!u@h PRIVMSG #channel ::-)");
    assert_eq!(message.last_arg(), Some(":-)"));
}

#[test]
fn test_built_messages_format_for_the_wire() {
    let cases = [
        (Message::new("nick", ["bot"]), "NICK bot\r\n"),
        (Message::privmsg("#a", "hello there"), "PRIVMSG #a :hello there\r\n"),
        (Message::notice("bob", "hi"), "NOTICE bob hi\r\n"),
        (Message::new("CAP", ["REQ", "a b"]), "CAP REQ :a b\r\n"),
        (Message::new("QUIT", Vec::<String>::new()), "QUIT\r\n"),
    ];
    for (message, expected) in cases {
        assert_eq!(message.to_wire(false, 512), expected);
    }
}

#[test]
fn test_wire_ignores_hostmask() {
    let message = Message::privmsg("#a", "hi").with_hostmask(Hostmask::new("me", "u", "h"));
    assert_eq!(message.to_wire(false, 512), "PRIVMSG #a hi\r\n");
    assert_eq!(message.to_string(), ":me!u@h PRIVMSG #a hi");
}

#[test]
fn test_wire_tags_only_when_enabled() {
    let message = Message::privmsg("#a", "hi")
        .with_tag("+draft/reply", "123")
        .with_tag("label", "x y");
    assert_eq!(message.to_wire(false, 512), "PRIVMSG #a hi\r\n");
    assert_eq!(
        message.to_wire(true, 512),
        "@+draft/reply=123;label=x\\sy PRIVMSG #a hi\r\n"
    );
}

#[test]
fn test_wire_sanitizes_middle_arguments() {
    let message = Message::new("USER", ["", "0", "*", "Real Name"]);
    assert_eq!(message.to_wire(false, 512), "USER \u{a0} 0 * :Real Name\r\n");

    let message = Message::new("KICK", ["#a", ":odd nick", "bye"]);
    assert_eq!(
        message.to_wire(false, 512),
        "KICK #a \u{703}odd\u{a0}nick bye\r\n"
    );
}

#[test]
fn test_wire_strips_line_breaks() {
    let message = Message::privmsg("#a", "one\r\ntwo\nthree");
    assert_eq!(message.to_wire(false, 512), "PRIVMSG #a :one  two three\r\n");
}

#[test]
fn test_wire_truncates_on_char_boundary() {
    let text = "é".repeat(300);
    let wire = Message::privmsg("#a", text).to_wire(false, 512);
    assert!(wire.len() <= 512);
    assert!(wire.ends_with("\r\n"));
    // "PRIVMSG #a " is 11 bytes; 499 bytes of two-byte chars round down.
    assert_eq!(wire.len(), 11 + 498 + 2);
}

#[test]
fn test_wire_tags_exempt_from_limit() {
    let message = Message::privmsg("#a", "x".repeat(600)).with_tag("msgid", "m".repeat(100));
    let wire = message.to_wire(true, 512);
    let body = wire.split_once(' ').unwrap().1;
    assert_eq!(body.len(), 512);
}

#[test]
fn test_parse_normalizes_command_case() {
    let message: Message = ":n!u@h privmsg #a :hi".parse().unwrap();
    assert_eq!(message.command, "PRIVMSG");
}

#[test]
fn test_parse_tolerates_extra_spaces() {
    let message: Message = ":n!u@h   PRIVMSG   #a    b   :c  d".parse().unwrap();
    assert_eq!(message.args, ["#a", "b", "c  d"]);
}

#[test]
fn test_parse_rejects_malformed_lines() {
    for line in ["", "   ", "@only-tags", ":prefix-only", "!!! bad", ":p @x"] {
        assert!(line.parse::<Message>().is_err(), "{line:?}");
    }
}
