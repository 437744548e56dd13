//! SASL authentication helpers for IRC.
//!
//! The client authenticates with the PLAIN mechanism only. This module holds
//! the mechanism vocabulary advertised in `sasl=<list>`, the PLAIN payload
//! encoder, and the `AUTHENTICATE` chunking rule.
//!
//! # Reference
//! - IRCv3 SASL: <https://ircv3.net/specs/extensions/sasl-3.2>
//! - RFC 4616 (PLAIN): <https://tools.ietf.org/html/rfc4616>
//!
//! # Example
//!
//! ```
//! use slirc_client::sasl::{SaslMechanism, encode_plain};
//!
//! let encoded = encode_plain("myuser", "mypassword");
//! assert!(!encoded.is_empty());
//!
//! let mech = SaslMechanism::parse("plain");
//! assert_eq!(mech, SaslMechanism::Plain);
//! ```

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::ConfigError;

/// Maximum length of a single SASL message chunk (400 bytes).
///
/// SASL responses that exceed this length must be split into multiple
/// AUTHENTICATE commands.
pub const SASL_CHUNK_SIZE: usize = 400;

/// SASL authentication mechanisms a server may advertise.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SaslMechanism {
    /// PLAIN mechanism (RFC 4616) - simple username/password.
    Plain,
    /// EXTERNAL mechanism - uses TLS client certificate.
    External,
    /// SCRAM-SHA-256 mechanism (RFC 7677).
    ScramSha256,
    /// Unknown or unsupported mechanism.
    Unknown(String),
}

impl SaslMechanism {
    /// Parse a mechanism name string.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "PLAIN" => Self::Plain,
            "EXTERNAL" => Self::External,
            "SCRAM-SHA-256" => Self::ScramSha256,
            _ => Self::Unknown(name.to_owned()),
        }
    }

    /// Returns the canonical name of this mechanism.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain => "PLAIN",
            Self::External => "EXTERNAL",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::Unknown(s) => s,
        }
    }
}

impl fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Services account credentials, written `"<username> <password>"`.
///
/// Used for SASL PLAIN and, when SASL is unavailable, for the NickServ
/// `identify` fallback after registration.
///
/// ```
/// use slirc_client::sasl::Identity;
///
/// let id: Identity = "bot hunter2 with spaces".parse().unwrap();
/// assert_eq!(id.username, "bot");
/// assert_eq!(id.password, "hunter2 with spaces");
/// assert!("nopassword".parse::<Identity>().is_err());
/// ```
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Identity {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl Identity {
    /// Create an identity from its parts.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Base64 PLAIN payload for these credentials.
    pub fn plain_payload(&self) -> String {
        encode_plain(&self.username, &self.password)
    }
}

impl FromStr for Identity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(' ') {
            Some((user, pass)) if !user.is_empty() && !pass.is_empty() => {
                Ok(Self::new(user, pass))
            }
            _ => Err(ConfigError::MalformedIdentity),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.username, self.password)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parse a comma-separated mechanism list, as found in `sasl=<list>`.
pub fn parse_mechanisms(list: &str) -> Vec<SaslMechanism> {
    list.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(SaslMechanism::parse)
        .collect()
}

/// Whether PLAIN may be attempted given the advertised mechanism list.
///
/// A server that does not advertise a list is assumed to accept PLAIN.
pub fn plain_offered(list: Option<&str>) -> bool {
    match list {
        None => true,
        Some(list) => parse_mechanisms(list).contains(&SaslMechanism::Plain),
    }
}

/// Encode credentials for the PLAIN mechanism.
///
/// The PLAIN mechanism encodes: `authzid NUL authcid NUL password`, with an
/// empty `authzid`.
///
/// ```
/// use slirc_client::sasl::encode_plain;
///
/// assert_eq!(encode_plain("user", "pass"), "AHVzZXIAcGFzcw==");
/// ```
pub fn encode_plain(username: &str, password: &str) -> String {
    let payload = format!("\0{}\0{}", username, password);
    BASE64.encode(payload.as_bytes())
}

/// Split an encoded response into `AUTHENTICATE` arguments.
///
/// Each chunk is at most [`SASL_CHUNK_SIZE`] bytes. When the last chunk is
/// exactly that size, or the response is empty, a final `+` follows.
pub fn chunk_response(encoded: &str) -> Vec<String> {
    let mut chunks: Vec<String> = encoded
        .as_bytes()
        .chunks(SASL_CHUNK_SIZE)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect();

    if encoded.len() % SASL_CHUNK_SIZE == 0 {
        chunks.push("+".to_owned());
    }
    chunks
}
