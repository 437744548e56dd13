//! IRCv3 message tag encoding and decoding.
//!
//! Tags travel as `@key=value;key2;key3=value3 ` in front of a line. Values
//! use the escaping rules from the message-tags specification. A tag with no
//! value decodes to an empty string, and an empty string encodes back to a
//! bare key, so the two forms are interchangeable.

use std::collections::BTreeMap;
use std::fmt::{Result as FmtResult, Write};

use crate::util::MAX_CLIENT_TAG_DATA;

/// Decoded message tags.
pub type Tags = BTreeMap<String, String>;

/// Escape a tag value for serialization.
///
/// Escapes special characters according to the IRCv3 message-tags spec.
pub fn escape_tag_value(f: &mut dyn Write, value: &str) -> FmtResult {
    for c in value.chars() {
        match c {
            ';' => f.write_str("\\:")?,
            ' ' => f.write_str("\\s")?,
            '\\' => f.write_str("\\\\")?,
            '\r' => f.write_str("\\r")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Unescape a tag value from wire format.
///
/// Reverses the escaping applied by [`escape_tag_value`]. Unknown escapes
/// yield the escaped character and a trailing lone backslash is dropped.
pub fn unescape_tag_value(value: &str) -> String {
    if !value.contains('\\') {
        return value.to_owned();
    }

    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let r = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(c) => c,
                None => break,
            }
        } else {
            c
        };
        unescaped.push(r);
    }
    unescaped
}

/// Decode the raw tag block (without the leading `@`) into a map.
///
/// ```
/// use slirc_client::message::tags::decode_tags;
///
/// let tags = decode_tags("time=12:00;+draft/typing;msg=a\\sb");
/// assert_eq!(tags["time"], "12:00");
/// assert_eq!(tags["+draft/typing"], "");
/// assert_eq!(tags["msg"], "a b");
/// ```
pub fn decode_tags(raw: &str) -> Tags {
    let mut tags = Tags::new();
    for entry in raw.split(';') {
        let (key, value) = match entry.split_once('=') {
            Some((key, value)) => (key, unescape_tag_value(value)),
            None => (entry, String::new()),
        };
        if key.is_empty() {
            continue;
        }
        tags.insert(key.to_owned(), value);
    }
    tags
}

/// Encode a tag map into its wire form, including the leading `@` and the
/// trailing space.
///
/// Entries are appended in key order until the next one would push the block
/// past [`MAX_CLIENT_TAG_DATA`] bytes; the remainder is dropped. An `=` in a
/// key is replaced with `-`. Returns an empty string when no entry fits.
///
/// ```
/// use slirc_client::message::tags::{encode_tags, Tags};
///
/// let mut tags = Tags::new();
/// tags.insert("+example".into(), "hello world".into());
/// tags.insert("flag".into(), String::new());
/// assert_eq!(encode_tags(&tags), "@+example=hello\\sworld;flag ");
/// ```
pub fn encode_tags(tags: &Tags) -> String {
    let mut out = String::from("@");
    for (key, value) in tags {
        let mut entry = String::new();
        // Writing into a String cannot fail.
        let _ = escape_tag_value(&mut entry, key);
        let mut entry = entry.replace('=', "-");
        if !value.is_empty() {
            entry.push('=');
            let _ = escape_tag_value(&mut entry, value);
        }
        entry.push(';');

        if out.len() + entry.len() > MAX_CLIENT_TAG_DATA {
            break;
        }
        out.push_str(&entry);
    }

    if out.len() < 3 {
        return String::new();
    }
    out.pop();
    out.push(' ');
    out
}
