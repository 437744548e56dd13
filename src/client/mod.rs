//! The connection handle.
//!
//! [`Irc`] owns one IRC connection: its transport, registration, capability
//! negotiation, keepalive, reconnection, and the routing of inbound lines to
//! handlers. It is a cheap [`Clone`] handle; every clone refers to the same
//! connection, and handlers receive one as their first argument.
//!
//! # Example
//!
//! ```no_run
//! use slirc_client::{Config, Irc};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let irc = Irc::new(Config::new("irc.libera.chat", 6697, "slirc-bot").with_channels(["#slirc"]))?;
//! irc.on("PRIVMSG", |irc, event| async move {
//!     if event.args.last().map(String::as_str) == Some("!ping") {
//!         irc.msg(&event.args[0], "pong").await;
//!     }
//!     Ok(())
//! })?;
//! irc.connect().await?;
//! # Ok(())
//! # }
//! ```

mod builtin;
mod config;
mod engine;

pub use self::config::{Config, DEFAULT_TLS_PORT};

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::WriteHalf;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::dispatch::{Event, HandlerExecutor, SpawnExecutor};
use crate::error::{ClientError, RegistryError, Result};
use crate::handler::{global_handlers, handler, HandlerRegistry, Registration};
use crate::isupport::Isupport;
use crate::message::{Message, Tags};
use crate::state::{CapNegotiator, NegotiationState};
use crate::transport::{BoxedStream, Connector, TcpConnector};
use crate::util::DEFAULT_LINE_LEN;

/// Where the connection is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionStatus {
    /// No transport.
    #[default]
    Idle,
    /// Transport open, registration in progress.
    Connecting,
    /// `001` received.
    Registered,
}

/// Mutable per-connection state. Never held across an `.await`.
struct State {
    status: ConnectionStatus,
    persist: bool,
    negotiator: CapNegotiator,
    isupport: Isupport,
    current_nick: String,
    /// `Some` until registration completes.
    send_queue: Option<Vec<Message>>,
    max_line_len: usize,
    /// A keepalive `PING` is outstanding.
    pinged: bool,
    /// Bumped by every connection attempt.
    generation: u64,
    session: Option<CancellationToken>,
    /// Cancelled by `disconnect()` to stop pending reconnects.
    retry: CancellationToken,
}

struct Inner {
    config: Mutex<Config>,
    state: Mutex<State>,
    writer: tokio::sync::Mutex<Option<WriteHalf<BoxedStream>>>,
    handlers: HandlerRegistry,
    connector: Arc<dyn Connector>,
    executor: Arc<dyn HandlerExecutor>,
}

/// A handle to one IRC connection.
#[derive(Clone)]
pub struct Irc {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Irc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Irc")
            .field("status", &state.status)
            .field("nick", &state.current_nick)
            .finish_non_exhaustive()
    }
}

impl Irc {
    /// Create a client that connects over TCP (and TLS when configured).
    ///
    /// With [`Config::auto_connect`] set, a connection attempt is started on
    /// the current tokio runtime.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_connector(config, TcpConnector)
    }

    /// Create a client that obtains its streams from `connector`.
    pub fn with_connector(config: Config, connector: impl Connector) -> Result<Self> {
        Self::from_parts(config, Arc::new(connector), Arc::new(SpawnExecutor))
    }

    /// Create a client with an explicit connector and handler executor.
    pub fn from_parts(
        config: Config,
        connector: Arc<dyn Connector>,
        executor: Arc<dyn HandlerExecutor>,
    ) -> Result<Self> {
        config.validate()?;
        let state = State {
            status: ConnectionStatus::Idle,
            persist: config.persist,
            negotiator: CapNegotiator::new(config.desired_caps()),
            isupport: Isupport::new(),
            current_nick: config.nick.clone(),
            send_queue: Some(Vec::new()),
            max_line_len: DEFAULT_LINE_LEN,
            pinged: false,
            generation: 0,
            session: None,
            retry: CancellationToken::new(),
        };
        let auto_connect = config.auto_connect;
        let irc = Self {
            inner: Arc::new(Inner {
                config: Mutex::new(config),
                state: Mutex::new(state),
                writer: tokio::sync::Mutex::new(None),
                handlers: HandlerRegistry::new(),
                connector,
                executor,
            }),
        };

        if auto_connect {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let irc = irc.clone();
                    runtime.spawn(async move { irc.connect_in_background().await });
                }
                Err(_) => warn!("auto_connect needs a tokio runtime; call connect() instead"),
            }
        }
        Ok(irc)
    }

    /// A snapshot of the current configuration.
    pub fn config(&self) -> Config {
        self.inner.config.lock().clone()
    }

    /// Register a handler on this connection.
    pub fn register(&self, registration: Registration) -> Result<(), RegistryError> {
        self.inner.handlers.register(registration)
    }

    /// Register a spawned handler for one event.
    pub fn on<F, Fut>(&self, event: &str, f: F) -> Result<(), RegistryError>
    where
        F: Fn(Irc, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(Registration::new(handler(f)).event(event))
    }

    /// The handlers registered on this connection only.
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.inner.handlers
    }

    /// Send a message. Before registration it is queued; afterwards write
    /// errors are logged and dropped.
    pub async fn send(&self, msg: Message) {
        if let Err(e) = self.send_message(msg, false).await {
            warn!(error = %e, "failed to send message");
        }
    }

    /// Send a message immediately, even before registration.
    pub async fn send_forced(&self, msg: Message) -> Result<()> {
        self.send_message(msg, true).await
    }

    /// Send a raw protocol line.
    pub async fn quote(&self, line: &str) {
        self.quote_with_tags(line, Tags::new()).await;
    }

    /// Send a raw protocol line with extra message tags.
    pub async fn quote_with_tags(&self, line: &str, tags: Tags) {
        match line.parse::<Message>() {
            Ok(msg) => self.send(msg.with_tags(tags)).await,
            Err(e) => warn!(error = %e, line, "refusing to send malformed line"),
        }
    }

    /// Send a `PRIVMSG`.
    pub async fn msg(&self, target: &str, text: &str) {
        self.msg_with_tags(target, text, Tags::new()).await;
    }

    /// Send a `PRIVMSG` carrying message tags, e.g. `+draft/reply`.
    pub async fn msg_with_tags(&self, target: &str, text: &str, tags: Tags) {
        self.send(Message::privmsg(target, text).with_tags(tags)).await;
    }

    /// Send a `NOTICE`.
    pub async fn notice(&self, target: &str, text: &str) {
        self.notice_with_tags(target, text, Tags::new()).await;
    }

    pub async fn notice_with_tags(&self, target: &str, text: &str, tags: Tags) {
        self.send(Message::notice(target, text).with_tags(tags)).await;
    }

    /// Send a CTCP request, or a reply (as a `NOTICE`) when `reply` is set.
    pub async fn ctcp(&self, target: &str, text: &str, reply: bool) {
        self.ctcp_with_tags(target, text, reply, Tags::new()).await;
    }

    pub async fn ctcp_with_tags(&self, target: &str, text: &str, reply: bool, tags: Tags) {
        let body = format!("\x01{}\x01", text.replace('\x01', ""));
        if reply {
            self.notice_with_tags(target, &body, tags).await;
        } else {
            self.msg_with_tags(target, &body, tags).await;
        }
    }

    /// Send a CTCP `ACTION`.
    pub async fn me(&self, target: &str, text: &str) {
        self.me_with_tags(target, text, Tags::new()).await;
    }

    pub async fn me_with_tags(&self, target: &str, text: &str, tags: Tags) {
        self.ctcp_with_tags(target, &format!("ACTION {}", text), false, tags)
            .await;
    }

    /// The nickname currently in use.
    pub fn current_nick(&self) -> String {
        self.inner.state.lock().current_nick.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.lock().status
    }

    pub fn is_registered(&self) -> bool {
        self.status() == ConnectionStatus::Registered
    }

    /// Capabilities acknowledged on the current connection.
    pub fn active_caps(&self) -> BTreeSet<String> {
        self.inner.state.lock().negotiator.active_caps().clone()
    }

    /// Server parameters from `RPL_ISUPPORT`.
    pub fn isupport(&self) -> Isupport {
        self.inner.state.lock().isupport.clone()
    }

    pub fn negotiation_state(&self) -> NegotiationState {
        self.inner.state.lock().negotiator.state()
    }

    /// Current outbound line limit.
    pub fn max_line_len(&self) -> usize {
        self.inner.state.lock().max_line_len
    }

    /// Whether the connection will be re-established after a loss.
    pub fn persist(&self) -> bool {
        self.inner.state.lock().persist
    }

    pub fn set_persist(&self, persist: bool) {
        self.inner.state.lock().persist = persist;
    }

    async fn send_message(&self, msg: Message, force: bool) -> Result<()> {
        let (tags_enabled, max_line_len) = {
            let mut state = self.inner.state.lock();
            if !force {
                if let Some(queue) = state.send_queue.as_mut() {
                    trace!(command = %msg.command, "queued until registration");
                    queue.push(msg);
                    return Ok(());
                }
            }
            (state.negotiator.tags_enabled(), state.max_line_len)
        };
        let line = msg.to_wire(tags_enabled, max_line_len);
        self.write_lines(&[line]).await
    }

    async fn write_lines(&self, lines: &[String]) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        let mut writer = self.inner.writer.lock().await;
        let Some(stream) = writer.as_mut() else {
            return Err(ClientError::NotConnected);
        };
        for line in lines {
            trace!(">>> {}", line.trim_end());
            stream.write_all(line.as_bytes()).await?;
        }
        stream.flush().await?;
        Ok(())
    }

    /// Built-in, then process-wide, then connection handlers for `command`.
    fn lookup(&self, command: &str) -> Vec<Registration> {
        let mut registrations = builtin::handlers().lookup(command);
        if self.inner.config.lock().global_handlers {
            registrations.extend(global_handlers().lookup(command));
        }
        registrations.extend(self.inner.handlers.lookup(command));
        registrations
    }

    /// Whether any consulted registry has a handler under exactly `command`.
    fn handles(&self, command: &str) -> bool {
        builtin::handlers().handles(command)
            || (self.inner.config.lock().global_handlers && global_handlers().handles(command))
            || self.inner.handlers.handles(command)
    }

    async fn dispatch(&self, msg: &Message) {
        let registrations = self.lookup(&msg.command);
        if registrations.is_empty() {
            trace!(command = %msg.command, "no handlers");
            return;
        }
        crate::dispatch::dispatch(self, self.inner.executor.as_ref(), registrations, msg).await;
    }
}
