//! Outbound formatting for [`Message`].

use std::borrow::Cow;
use std::fmt::{self, Write};

use super::tags::encode_tags;
use super::Message;
use crate::util::truncate_utf8_safe;

/// Stand-in for a space or an empty string in a middle argument.
const NBSP: char = '\u{00A0}';

/// Stand-in for a leading `:` in a middle argument.
const MIDDLE_COLON: char = '\u{0703}';

/// Check if a string needs colon-prefixing as a trailing IRC argument.
#[inline]
fn needs_colon_prefix(s: &str) -> bool {
    s.is_empty() || s.contains(' ') || s.starts_with(':')
}

/// Make a non-final argument safe to send as a single token.
fn sanitize_middle(arg: &str) -> Cow<'_, str> {
    if arg.is_empty() {
        return Cow::Owned(NBSP.to_string());
    }
    if !arg.contains(' ') && !arg.starts_with(':') {
        return Cow::Borrowed(arg);
    }

    let mut out = String::with_capacity(arg.len() + 2);
    let rest = match arg.strip_prefix(':') {
        Some(rest) => {
            out.push(MIDDLE_COLON);
            rest
        }
        None => arg,
    };
    out.extend(rest.chars().map(|c| if c == ' ' { NBSP } else { c }));
    Cow::Owned(out)
}

fn write_body<W: Write>(w: &mut W, msg: &Message) -> fmt::Result {
    w.write_str(&msg.command)?;

    if let Some((last, middle)) = msg.args.split_last() {
        for arg in middle {
            w.write_char(' ')?;
            w.write_str(&sanitize_middle(arg))?;
        }
        w.write_char(' ')?;
        if needs_colon_prefix(last) {
            w.write_char(':')?;
        }
        w.write_str(last)?;
    }
    Ok(())
}

fn strip_line_breaks(body: &mut String) {
    if body.contains(['\r', '\n']) {
        *body = body.replace(['\r', '\n'], " ");
    }
}

pub(super) fn to_wire(msg: &Message, tags_enabled: bool, max_line_len: usize) -> String {
    let mut body = String::with_capacity(64);
    // Writing into a String cannot fail.
    let _ = write_body(&mut body, msg);
    strip_line_breaks(&mut body);

    let body = truncate_utf8_safe(&body, max_line_len.saturating_sub(2));

    let mut line = if tags_enabled && !msg.tags.is_empty() {
        encode_tags(&msg.tags)
    } else {
        String::new()
    };
    line.reserve(body.len() + 2);
    line.push_str(body);
    line.push_str("\r\n");
    line
}

pub(super) fn write_display(f: &mut fmt::Formatter<'_>, msg: &Message) -> fmt::Result {
    if !msg.tags.is_empty() {
        f.write_str(&encode_tags(&msg.tags))?;
    }
    if !msg.hostmask.is_empty() {
        write!(f, ":{} ", msg.hostmask)?;
    }

    let mut body = String::new();
    write_body(&mut body, msg)?;
    strip_line_breaks(&mut body);
    f.write_str(&body)
}
