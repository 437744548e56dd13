//! Error types for the IRC client engine.
//!
//! This module defines the error taxonomy used across the crate: line
//! parsing failures, handler registration mistakes, configuration problems,
//! and the top-level [`ClientError`] returned by connection operations.

use thiserror::Error;

/// Convenience type alias for Results using [`ClientError`].
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Top-level client errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// I/O error while connecting, reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS setup or handshake failure.
    #[error("tls error: {0}")]
    Tls(String),

    /// A forced send was attempted without an open transport.
    #[error("not connected")]
    NotConnected,

    /// The configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A handler registration was rejected.
    #[error("invalid handler registration: {0}")]
    Registry(#[from] RegistryError),
}

/// Errors encountered when parsing a single IRC line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Line was empty or contained only whitespace.
    #[error("empty message")]
    EmptyMessage,

    /// Command was missing or contained non-alphanumeric characters.
    #[error("invalid command")]
    InvalidCommand,

    /// Parsing failed with position information.
    #[error("parsing failed at position {position}: {context}")]
    ParseContext {
        /// Byte position where parsing failed.
        position: usize,
        /// Description of what was being parsed.
        context: String,
    },
}

/// Errors raised when registering a handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    /// The registration names no events and does not want the command name,
    /// so nothing could ever reach it.
    #[error("handler has no events and is not a wildcard handler")]
    NoEvents,
}

/// Errors raised while validating a [`Config`](crate::Config).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// Host name was empty.
    #[error("host must not be empty")]
    EmptyHost,

    /// Nickname was empty or contained spaces.
    #[error("invalid nickname: {0:?}")]
    InvalidNick(String),

    /// Services identity was not of the form `<username> <password>`.
    #[error("identity must be \"<username> <password>\"")]
    MalformedIdentity,

    /// Ping interval or timeout was zero.
    #[error("ping interval and timeout must be non-zero")]
    ZeroPingInterval,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MessageParseError::ParseContext {
            position: 10,
            context: "parsing command".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "parsing failed at position 10: parsing command"
        );

        let err = ClientError::from(ConfigError::EmptyHost);
        assert_eq!(
            format!("{}", err),
            "invalid configuration: host must not be empty"
        );
    }

    #[test]
    fn test_error_source_chaining() {
        let err = ClientError::from(RegistryError::NoEvents);
        let source = std::error::Error::source(&err);
        assert!(source.is_some());
        assert_eq!(
            source.unwrap().to_string(),
            RegistryError::NoEvents.to_string()
        );
    }

    #[test]
    fn test_error_conversion() {
        let io_err =
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let client_err: ClientError = io_err.into();

        match client_err {
            ClientError::Io(_) => {}
            _ => panic!("Expected Io variant"),
        }
    }
}
