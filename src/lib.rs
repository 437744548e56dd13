//! # slirc-client
//!
//! An IRC client connection engine with IRCv3 support.
//!
//! ## Features
//!
//! - IRC line parsing and formatting with IRCv3 message tags
//! - Stream framing that tolerates CR, LF, CRLF and LFCR terminators
//! - IRCv3 capability negotiation, including `sts` and
//!   `oragono.io/maxline-2`
//! - SASL PLAIN authentication with a NickServ fallback
//! - Keepalive pings, automatic reconnection and a pre-registration send
//!   queue
//! - Handler registration per connection or process-wide, with panics and
//!   errors isolated per handler

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ### Parsing and building messages
//!
//! ```rust
//! use slirc_client::Message;
//!
//! let raw = "@time=2023-01-01T12:00:00Z :nick!user@host PRIVMSG #channel :Hello!";
//! let message: Message = raw.parse().expect("Valid IRC message");
//! assert_eq!(message.hostmask.nick, "nick");
//! assert_eq!(message.args, ["#channel", "Hello!"]);
//!
//! let reply = Message::privmsg("#channel", "Hi there").with_tag("+draft/reply", "abc");
//! assert_eq!(reply.to_wire(false, 512), "PRIVMSG #channel :Hi there\r\n");
//! ```
//!
//! ### Running a bot
//!
//! ```no_run
//! use slirc_client::{Config, Irc};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new("irc.libera.chat", 6697, "slirc-bot")
//!         .with_channels(["#slirc"])
//!         .with_quit_on_signal(true);
//!     let irc = Irc::new(config)?;
//!     irc.on("JOIN", |irc, event| async move {
//!         if event.hostmask.nick == irc.current_nick() {
//!             irc.msg(&event.args[0], "hello!").await;
//!         }
//!         Ok(())
//!     })?;
//!     irc.connect().await?;
//!     tokio::signal::ctrl_c().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Acknowledgments
//!
//! This project was inspired by the architectural patterns established by
//! [Aaron Weiss (aatxe)](https://github.com/aatxe) in the
//! [irc](https://github.com/aatxe/irc) crate.

pub mod caps;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod isupport;
pub mod line;
pub mod message;
pub mod prefix;
pub mod sasl;
pub mod state;
pub mod transport;
pub mod util;

pub use self::caps::Capability;
pub use self::client::{Config, ConnectionStatus, Irc};
pub use self::dispatch::{BoundedExecutor, Event, HandlerExecutor, SpawnExecutor};
pub use self::error::{ClientError, ConfigError, MessageParseError, RegistryError};
pub use self::handler::{
    global_handlers, handler, DispatchMode, HandlerFn, HandlerRegistry, Registration,
};
pub use self::isupport::{Isupport, IsupportValue};
pub use self::line::LineCodec;
pub use self::message::{Message, Tags};
pub use self::prefix::Hostmask;
pub use self::sasl::{Identity, SaslMechanism};
pub use self::state::{CapNegotiator, NegotiationState};
pub use self::transport::{BoxedStream, Connector, IrcStream, TcpConnector};
