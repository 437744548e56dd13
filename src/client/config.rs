//! Connection configuration.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::caps::{default_caps, Capability};
use crate::error::ConfigError;
use crate::sasl::Identity;

/// Port on which TLS is assumed when [`Config::tls`] is unset.
pub const DEFAULT_TLS_PORT: u16 = 6697;

/// Settings for one IRC connection.
///
/// ```
/// use std::time::Duration;
/// use slirc_client::Config;
///
/// let config = Config::new("irc.example.com", 6697, "bot")
///     .with_channels(["#rust", "#irc"])
///     .with_ping_interval(Duration::from_secs(30));
/// assert!(config.use_tls());
/// assert_eq!(config.ident(), "bot");
/// config.validate().unwrap();
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Desired nickname.
    pub nick: String,
    /// Channels joined after registration.
    pub channels: Vec<String>,
    /// Defaults to the nickname.
    pub ident: Option<String>,
    /// Defaults to the nickname.
    pub realname: Option<String>,
    /// Services account, used for SASL PLAIN or the NickServ fallback.
    pub identity: Option<Identity>,
    /// `None` enables TLS only on port 6697.
    pub tls: Option<bool>,
    pub verify_tls: bool,
    /// Reconnect after the connection is lost.
    pub persist: bool,
    /// Idle time before a keepalive `PING` is sent.
    pub ping_interval: Duration,
    /// Time allowed for a reply to the keepalive `PING`; defaults to
    /// `ping_interval`.
    pub ping_timeout: Option<Duration>,
    /// Capabilities requested in addition to the defaults.
    pub caps: BTreeSet<String>,
    /// User modes set on ourselves after registration.
    pub connect_modes: Option<String>,
    pub quit_message: String,
    /// Connect as soon as the client is created.
    pub auto_connect: bool,
    pub reconnect_delay: Duration,
    /// Consult the process-wide handler registry.
    pub global_handlers: bool,
    /// Disconnect on Ctrl-C.
    pub quit_on_signal: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 6667,
            nick: String::new(),
            channels: Vec::new(),
            ident: None,
            realname: None,
            identity: None,
            tls: None,
            verify_tls: true,
            persist: true,
            ping_interval: Duration::from_secs(60),
            ping_timeout: None,
            caps: BTreeSet::new(),
            connect_modes: None,
            quit_message: "I grew sick and died.".to_owned(),
            auto_connect: false,
            reconnect_delay: Duration::from_secs(5),
            global_handlers: true,
            quit_on_signal: false,
        }
    }
}

impl Config {
    pub fn new(host: impl Into<String>, port: u16, nick: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            nick: nick.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_ident(mut self, ident: impl Into<String>) -> Self {
        self.ident = Some(ident.into());
        self
    }

    #[must_use]
    pub fn with_realname(mut self, realname: impl Into<String>) -> Self {
        self.realname = Some(realname.into());
        self
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    #[must_use]
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = Some(tls);
        self
    }

    #[must_use]
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    #[must_use]
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    #[must_use]
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = Some(timeout);
        self
    }

    /// Request an extra capability.
    #[must_use]
    pub fn with_cap(mut self, cap: impl AsRef<str>) -> Self {
        self.caps.insert(cap.as_ref().to_ascii_lowercase());
        self
    }

    #[must_use]
    pub fn with_connect_modes(mut self, modes: impl Into<String>) -> Self {
        self.connect_modes = Some(modes.into());
        self
    }

    #[must_use]
    pub fn with_quit_message(mut self, message: impl Into<String>) -> Self {
        self.quit_message = message.into();
        self
    }

    #[must_use]
    pub fn with_auto_connect(mut self, yes: bool) -> Self {
        self.auto_connect = yes;
        self
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn with_global_handlers(mut self, yes: bool) -> Self {
        self.global_handlers = yes;
        self
    }

    #[must_use]
    pub fn with_quit_on_signal(mut self, yes: bool) -> Self {
        self.quit_on_signal = yes;
        self
    }

    /// Check the settings that would make every connection attempt fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.nick.is_empty()
            || self.nick.starts_with(':')
            || self.nick.contains([' ', '\r', '\n', '\0'])
        {
            return Err(ConfigError::InvalidNick(self.nick.clone()));
        }
        if self.ping_interval.is_zero() || self.ping_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroPingInterval);
        }
        Ok(())
    }

    /// Whether the connection uses TLS.
    pub fn use_tls(&self) -> bool {
        self.tls.unwrap_or(self.port == DEFAULT_TLS_PORT)
    }

    pub fn ident(&self) -> &str {
        self.ident.as_deref().unwrap_or(&self.nick)
    }

    pub fn realname(&self) -> &str {
        self.realname.as_deref().unwrap_or(&self.nick)
    }

    /// Time allowed for the keepalive reply.
    pub fn keepalive_timeout(&self) -> Duration {
        self.ping_timeout.unwrap_or(self.ping_interval)
    }

    /// Every capability this connection will request when offered.
    pub fn desired_caps(&self) -> BTreeSet<String> {
        let mut caps = default_caps();
        caps.extend(self.caps.iter().map(|c| c.to_ascii_lowercase()));
        if self.identity.is_some() {
            caps.insert(Capability::Sasl.to_string());
        }
        caps
    }
}
