//! Line-based codec for tokio.
//!
//! Splits an inbound byte stream into text lines. CR and LF both terminate
//! a line, so CRLF, LFCR, and either byte alone are all accepted; the empty
//! lines produced by two-byte terminators are skipped.

use std::borrow::Cow;
use std::io;

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::warn;

/// Longest inbound line accepted before it is discarded.
pub const MAX_INBOUND_LINE_LEN: usize = 64 * 1024;

#[inline]
fn is_terminator(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}

/// Decoder producing one `String` per non-empty line, terminator removed.
///
/// Invalid UTF-8 is replaced with U+FFFD rather than failing the stream.
/// A line longer than the limit is dropped up to its next terminator and
/// decoding resumes after it.
#[derive(Debug)]
pub struct LineCodec {
    /// Index of next byte to check for a terminator
    next_index: usize,
    /// Maximum line length
    max_len: usize,
    /// Dropping the rest of an overlong line
    discarding: bool,
}

impl LineCodec {
    /// Create a codec with the default length limit.
    pub fn new() -> Self {
        Self::with_max_len(MAX_INBOUND_LINE_LEN)
    }

    /// Create a codec with a custom length limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        loop {
            let offset = match src[self.next_index..].iter().position(|b| is_terminator(*b)) {
                Some(offset) => offset,
                None => {
                    if self.discarding {
                        src.clear();
                        self.next_index = 0;
                    } else if src.len() > self.max_len {
                        warn!(len = src.len(), limit = self.max_len, "discarding overlong line");
                        src.clear();
                        self.next_index = 0;
                        self.discarding = true;
                    } else {
                        // No complete line yet - remember where we stopped
                        self.next_index = src.len();
                    }
                    return Ok(None);
                }
            };

            let end = self.next_index + offset;
            let line = src.split_to(end + 1);
            self.next_index = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }

            let line = &line[..end];
            if line.is_empty() {
                continue;
            }
            if line.len() > self.max_len {
                warn!(len = line.len(), limit = self.max_len, "discarding overlong line");
                continue;
            }

            let text = match String::from_utf8_lossy(line) {
                Cow::Borrowed(s) => s.to_owned(),
                Cow::Owned(s) => {
                    warn!(line = %s, "replaced invalid UTF-8 in inbound line");
                    s
                }
            };
            return Ok(Some(text));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None => {
                // An unterminated tail at EOF is never delivered.
                src.clear();
                self.next_index = 0;
                self.discarding = false;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(codec: &mut LineCodec, buf: &mut BytesMut) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = codec.decode(buf).unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_decode_complete_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING :test\r\n");

        let result = codec.decode(&mut buf).unwrap();
        assert_eq!(result, Some("PING :test".to_string()));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_all_terminators() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("A\r\nB\nC\rD\n\rE\n");
        assert_eq!(drain(&mut codec, &mut buf), vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_decode_partial_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING :");

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"abc\r\nPRIV");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("PING :abc".to_string()));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"PRIV");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"PRIVMSG #a :caf\xff\r\n"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some("PRIVMSG #a :caf\u{FFFD}".to_string())
        );
    }

    #[test]
    fn test_overlong_line_is_discarded() {
        let mut codec = LineCodec::with_max_len(10);
        let mut buf = BytesMut::from("this is way too long");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());

        buf.extend_from_slice(b" still going\nPING x\n");
        assert_eq!(drain(&mut codec, &mut buf), vec!["PING x"]);
    }

    #[test]
    fn test_overlong_terminated_line_is_skipped() {
        let mut codec = LineCodec::with_max_len(10);
        let mut buf = BytesMut::from("this is way too long\nPING x\n");
        assert_eq!(drain(&mut codec, &mut buf), vec!["PING x"]);
    }

    #[test]
    fn test_eof_drops_partial() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING a\nPART");
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some("PING a".to_string()));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }
}
