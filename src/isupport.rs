//! `RPL_ISUPPORT` (005) token parsing.

use std::collections::BTreeMap;
use std::fmt;

/// Fallback nickname length when the server does not advertise `NICKLEN`.
pub const DEFAULT_NICKLEN: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IsupportValue {
    Int(i64),
    /// Raw string value; `""` for a bare token.
    Str(String),
}

impl IsupportValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Int(_) => None,
            Self::Str(s) => Some(s),
        }
    }
}

impl fmt::Display for IsupportValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Str(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IsupportEntry<'a> {
    pub key: &'a str,
    pub value: Option<&'a str>,
}

/// A single change carried by an 005 line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IsupportUpdate {
    Set(String, IsupportValue),
    /// `-KEY`
    Remove(String),
}

pub fn parse_params<'a, S: AsRef<str>>(params: &'a [S]) -> Vec<IsupportEntry<'a>> {
    let mut entries = Vec::with_capacity(params.len());
    for p in params {
        let p = p.as_ref();
        if p.is_empty() {
            continue;
        }
        let (key, value) = match p.split_once('=') {
            Some((k, v)) => (k, Some(v)),
            None => (p, None),
        };
        entries.push(IsupportEntry { key, value });
    }
    entries
}

/// Turn the arguments of an 005 reply into updates.
///
/// The first argument (our nickname) is skipped, and so is the last when it
/// is the human-readable "are supported by this server" text rather than a
/// token. Integer values become [`IsupportValue::Int`]; a `*LEN` token whose
/// value is not an integer is dropped.
pub fn from_response_args<S: AsRef<str>>(args: &[S]) -> Vec<IsupportUpdate> {
    if args.is_empty() {
        return Vec::new();
    }

    let mut tokens = &args[1..];
    if let Some(last) = tokens.last() {
        if !is_token(last.as_ref()) {
            tokens = &tokens[..tokens.len() - 1];
        }
    }

    parse_params(tokens)
        .into_iter()
        .filter_map(|entry| {
            if let Some(key) = entry.key.strip_prefix('-') {
                return Some(IsupportUpdate::Remove(key.to_owned()));
            }
            let value = unescape_value(entry.value.unwrap_or(""));
            match value.parse::<i64>() {
                Ok(n) => Some(IsupportUpdate::Set(entry.key.to_owned(), IsupportValue::Int(n))),
                Err(_) if entry.key.ends_with("LEN") => None,
                Err(_) => Some(IsupportUpdate::Set(
                    entry.key.to_owned(),
                    IsupportValue::Str(value),
                )),
            }
        })
        .collect()
}

/// Parameter names are uppercase; the closing text never is.
fn is_token(arg: &str) -> bool {
    if arg.contains(' ') {
        return false;
    }
    let name = arg.strip_prefix('-').unwrap_or(arg);
    let name = name.split_once('=').map_or(name, |(key, _)| key);
    name.bytes().any(|b| b.is_ascii_uppercase())
}

/// Decode `\xHH` escapes in a token value.
pub fn unescape_value(value: &str) -> String {
    if !value.contains("\\x") {
        return value.to_owned();
    }

    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'x') {
            let decoded = value
                .get(i + 2..i + 4)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(b) = decoded {
                out.push(b);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Accumulated server support tokens for one registration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Isupport {
    entries: BTreeMap<String, IsupportValue>,
}

impl Isupport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, updates: impl IntoIterator<Item = IsupportUpdate>) {
        for update in updates {
            match update {
                IsupportUpdate::Set(key, value) => {
                    self.entries.insert(key, value);
                }
                IsupportUpdate::Remove(key) => {
                    self.entries.remove(&key);
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&IsupportValue> {
        self.entries.get(key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(IsupportValue::as_int)
    }

    /// Advertised `NICKLEN`, or [`DEFAULT_NICKLEN`].
    pub fn nicklen(&self) -> usize {
        self.get_int("NICKLEN")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_NICKLEN)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IsupportValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_response_args() {
        let updates = from_response_args(&args(&[
            "bot",
            "NICKLEN=9",
            "CHANTYPES=#&",
            "EXCEPTS",
            "are supported by this server",
        ]));
        assert_eq!(
            updates,
            vec![
                IsupportUpdate::Set("NICKLEN".into(), IsupportValue::Int(9)),
                IsupportUpdate::Set("CHANTYPES".into(), IsupportValue::Str("#&".into())),
                IsupportUpdate::Set("EXCEPTS".into(), IsupportValue::Str(String::new())),
            ]
        );
    }

    #[test]
    fn test_one_word_closing_text_is_skipped() {
        let updates = from_response_args(&args(&["bot", "MODES=4", "supported"]));
        assert_eq!(
            updates,
            vec![IsupportUpdate::Set("MODES".into(), IsupportValue::Int(4))]
        );

        let updates = from_response_args(&args(&["bot", "-EXCEPTS", "draft/CHATHISTORY=50"]));
        assert_eq!(
            updates,
            vec![
                IsupportUpdate::Remove("EXCEPTS".into()),
                IsupportUpdate::Set("draft/CHATHISTORY".into(), IsupportValue::Int(50)),
            ]
        );
    }

    #[test]
    fn test_non_integer_len_is_dropped() {
        let updates = from_response_args(&args(&["bot", "TOPICLEN=abc", "KICKLEN", "MODES=4"]));
        assert_eq!(
            updates,
            vec![IsupportUpdate::Set("MODES".into(), IsupportValue::Int(4))]
        );
    }

    #[test]
    fn test_negation_removes() {
        let mut isupport = Isupport::new();
        isupport.apply(from_response_args(&args(&["bot", "EXCEPTS=e", "NICKLEN=12"])));
        assert_eq!(isupport.len(), 2);
        assert_eq!(isupport.nicklen(), 12);

        isupport.apply(from_response_args(&args(&["bot", "-EXCEPTS", "-NICKLEN"])));
        assert!(isupport.get("EXCEPTS").is_none());
        assert_eq!(isupport.nicklen(), DEFAULT_NICKLEN);
    }

    #[test]
    fn test_unescape_value() {
        assert_eq!(unescape_value("Example\\x20Net"), "Example Net");
        assert_eq!(unescape_value("a\\x3Db"), "a=b");
        assert_eq!(unescape_value("bad\\xZZ"), "bad\\xZZ");
        assert_eq!(unescape_value("trail\\x"), "trail\\x");
        assert_eq!(unescape_value("plain"), "plain");
    }

    #[test]
    fn test_escaped_value_parses() {
        let updates = from_response_args(&args(&["bot", "NETWORK=Example\\x20Net"]));
        assert_eq!(
            updates,
            vec![IsupportUpdate::Set(
                "NETWORK".into(),
                IsupportValue::Str("Example Net".into())
            )]
        );
    }

    #[test]
    fn test_empty_args() {
        assert!(from_response_args::<String>(&[]).is_empty());
        assert!(from_response_args(&args(&["bot"])).is_empty());
    }
}
