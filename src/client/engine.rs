//! Connection lifecycle: connect, receive loop, keepalive, loss and
//! reconnection, and the bookkeeping the built-in handlers delegate to.

use std::collections::VecDeque;

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use tokio::io::{AsyncWriteExt, ReadHalf};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{ConnectionStatus, Irc};
use crate::caps::cap_event_name;
use crate::error::{ClientError, Result};
use crate::isupport::IsupportUpdate;
use crate::line::LineCodec;
use crate::message::Message;
use crate::prefix::Hostmask;
use crate::state::CapAction;
use crate::transport::BoxedStream;
use crate::util::{truncate_chars, DEFAULT_LINE_LEN};

/// Token carried by keepalive pings.
pub(crate) const KEEPALIVE_TOKEN: &str = "slirc-keepalive";

impl Irc {
    /// Open the transport and start registration.
    ///
    /// Does nothing unless the connection is idle. Transport and TLS errors
    /// are returned; with `persist` set, a retry loop is also started in the
    /// background until a connection succeeds or [`Irc::disconnect`] is
    /// called. Everything after the handshake is driven by the receive loop.
    pub async fn connect(&self) -> Result<()> {
        let result = self.open().await;
        if let Err(e) = &result {
            if self.persist() {
                warn!(error = %e, "connect failed; retrying");
                let irc = self.clone();
                tokio::spawn(async move { irc.reconnect().await });
            }
        }
        result
    }

    async fn open(&self) -> Result<()> {
        let (host, port, tls, verify) = {
            let mut state = self.inner.state.lock();
            if state.status != ConnectionStatus::Idle {
                debug!("already connected");
                return Ok(());
            }
            state.status = ConnectionStatus::Connecting;
            state.generation += 1;
            let config = self.inner.config.lock();
            (config.host.clone(), config.port, config.use_tls(), config.verify_tls)
        };

        info!(%host, port, tls, "connecting");
        let stream = match self.inner.connector.connect(&host, port, tls, verify).await {
            Ok(stream) => stream,
            Err(e) => {
                self.inner.state.lock().status = ConnectionStatus::Idle;
                return Err(e);
            }
        };
        let (reader, writer) = tokio::io::split(stream);

        let token = CancellationToken::new();
        let (generation, actions, ident, realname, nick, quit_on_signal) = {
            let mut state = self.inner.state.lock();
            if state.status != ConnectionStatus::Connecting {
                debug!("disconnected while connecting");
                return Ok(());
            }
            let config = self.inner.config.lock();
            state.current_nick = config.nick.clone();
            state.isupport.clear();
            state.max_line_len = DEFAULT_LINE_LEN;
            state.pinged = false;
            state.send_queue.get_or_insert_with(Vec::new);
            state.session = Some(token.clone());
            let actions = state.negotiator.start();
            (
                state.generation,
                actions,
                config.ident().to_owned(),
                config.realname().to_owned(),
                config.nick.clone(),
                config.quit_on_signal,
            )
        };
        *self.inner.writer.lock().await = Some(writer);

        let registration = async {
            self.apply_actions(actions).await?;
            self.send_forced(Message::new("USER", [ident.as_str(), "0", "*", realname.as_str()]))
                .await?;
            self.send_forced(Message::new("NICK", [nick])).await
        };
        if let Err(e) = registration.await {
            let _ = self.shutdown(None, true, Some(generation)).await;
            return Err(e);
        }

        tokio::spawn(self.clone().receive_loop(reader, token.clone(), generation));
        if quit_on_signal {
            self.spawn_signal_watcher(token);
        }
        Ok(())
    }

    /// Close the connection with the configured quit message and stop
    /// reconnecting.
    pub async fn disconnect(&self) {
        self.stop(None).await;
    }

    /// Close the connection with `message` as the quit reason.
    pub async fn disconnect_with(&self, message: &str) {
        self.stop(Some(message)).await;
    }

    /// Clear `persist` and cancel pending reconnects, even when idle.
    async fn stop(&self, message: Option<&str>) {
        let retry = {
            let mut state = self.inner.state.lock();
            state.persist = false;
            std::mem::replace(&mut state.retry, CancellationToken::new())
        };
        retry.cancel();
        let _ = self.shutdown(message, false, None).await;
    }

    /// Tear down the current session.
    ///
    /// `persist` survives only when `auto_reconnect` is set. With
    /// `generation` given, only that session is torn down. Returns whether
    /// anything was torn down.
    async fn shutdown(
        &self,
        message: Option<&str>,
        auto_reconnect: bool,
        generation: Option<u64>,
    ) -> bool {
        let (token, quit) = {
            let mut state = self.inner.state.lock();
            if state.status == ConnectionStatus::Idle
                || generation.is_some_and(|g| g != state.generation)
            {
                return false;
            }
            let config = self.inner.config.lock();
            state.persist = auto_reconnect && state.persist;
            state.status = ConnectionStatus::Idle;
            state.negotiator.reset();
            state.pinged = false;
            state.send_queue.get_or_insert_with(Vec::new);
            state.current_nick = config.nick.clone();
            let quit = message.unwrap_or(&config.quit_message).to_owned();
            (state.session.take(), quit)
        };
        info!(reason = %quit, "disconnecting");
        if let Some(token) = token {
            token.cancel();
        }

        let mut writer = self.inner.writer.lock().await;
        if let Some(mut stream) = writer.take() {
            let line = Message::new("QUIT", [quit]).to_wire(false, DEFAULT_LINE_LEN);
            trace!(">>> {}", line.trim_end());
            if let Err(e) = stream.write_all(line.as_bytes()).await {
                debug!(error = %e, "QUIT not delivered");
            }
            let _ = stream.shutdown().await;
        }
        true
    }

    fn receive_loop(
        self,
        reader: ReadHalf<BoxedStream>,
        token: CancellationToken,
        generation: u64,
    ) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let (interval, timeout) = {
                let config = self.inner.config.lock();
                (config.ping_interval, config.keepalive_timeout())
            };
            let mut lines = FramedRead::new(reader, LineCodec::new());

            loop {
                let wait = if self.inner.state.lock().pinged {
                    timeout
                } else {
                    interval
                };
                let next = tokio::select! {
                    _ = token.cancelled() => return,
                    next = tokio::time::timeout(wait, lines.next()) => next,
                };

                match next {
                    Err(_) => {
                        let already_pinged =
                            std::mem::replace(&mut self.inner.state.lock().pinged, true);
                        if already_pinged {
                            warn!("ping timeout");
                            break;
                        }
                        debug!("connection idle; sending keepalive ping");
                        if let Err(e) = self.send_forced(Message::new("PING", [KEEPALIVE_TOKEN])).await {
                            warn!(error = %e, "keepalive ping failed");
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("connection closed by server");
                        break;
                    }
                    Ok(Some(Err(e))) => {
                        warn!(error = %e, "read error");
                        break;
                    }
                    Ok(Some(Ok(line))) => {
                        trace!("<<< {}", line);
                        self.inner.state.lock().pinged = false;
                        match line.parse::<Message>() {
                            Ok(msg) => self.dispatch(&msg).await,
                            Err(e) => warn!(error = %e, %line, "discarding unparseable line"),
                        }
                    }
                }
            }

            if token.is_cancelled() {
                return;
            }
            self.connection_lost(generation).await;
        })
    }

    async fn connection_lost(&self, generation: u64) {
        warn!("lost connection");
        if self.shutdown(None, true, Some(generation)).await && self.persist() {
            self.reconnect().await;
        }
    }

    /// Retry every `reconnect_delay` until a connection opens, `persist` is
    /// cleared, or [`Irc::disconnect`] is called.
    async fn reconnect(&self) {
        let retry = self.inner.state.lock().retry.clone();
        loop {
            let delay = self.inner.config.lock().reconnect_delay;
            tokio::select! {
                _ = retry.cancelled() => {
                    debug!("reconnect cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            if !self.persist() {
                debug!("reconnect cancelled");
                return;
            }
            info!("reconnecting");
            match self.open().await {
                Ok(()) => return,
                Err(e) => warn!(error = %e, "reconnect failed"),
            }
        }
    }

    /// `connect()` from a background task, where the error has no caller.
    pub(super) async fn connect_in_background(&self) {
        if let Err(e) = self.connect().await {
            warn!(error = %e, "connect failed");
        }
    }

    fn spawn_signal_watcher(&self, token: CancellationToken) {
        let irc = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => {
                        info!("interrupted");
                        irc.disconnect().await;
                    }
                    Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
                },
            }
        });
    }

    /// Carry out negotiator actions in order, including the follow-ups of
    /// claims nobody handles.
    pub(super) async fn apply_actions(&self, actions: Vec<CapAction>) -> Result<()> {
        let mut queue: VecDeque<CapAction> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                CapAction::Send(msg) => self.send_forced(msg).await?,
                CapAction::Claim { cap, args } => {
                    let event = cap_event_name(&cap);
                    if self.handles(&event) {
                        debug!(%cap, "dispatching capability handler");
                        let msg = Message {
                            command: event,
                            hostmask: Hostmask::new("CAP", "CAP", "CAP"),
                            args,
                            ..Message::default()
                        };
                        self.dispatch(&msg).await;
                    } else {
                        let follow_up = self.inner.state.lock().negotiator.finish(&cap);
                        queue.extend(follow_up);
                    }
                }
                CapAction::End => {
                    if self.status() != ConnectionStatus::Registered {
                        debug!("capability negotiation finished");
                        self.send_forced(Message::new("CAP", ["END"])).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Mark a claimed capability as handled.
    ///
    /// Handlers for `IRCv3 <cap>` events call this once they are done; the
    /// last one to finish sends `CAP END`.
    pub async fn finish_negotiation(&self, cap: &str) -> Result<()> {
        debug!(%cap, "capability handled");
        let actions = self.inner.state.lock().negotiator.finish(cap);
        self.apply_actions(actions).await
    }

    pub(super) async fn complete_registration(&self) -> Result<()> {
        let (connect_modes, identity, channels) = {
            let config = self.inner.config.lock();
            (
                config.connect_modes.clone(),
                config.identity.clone(),
                config.channels.clone(),
            )
        };

        let mut writer = self.inner.writer.lock().await;
        let (nick, lines) = {
            let mut state = self.inner.state.lock();
            state.status = ConnectionStatus::Registered;
            state.negotiator.registered();
            state.isupport.clear();

            let mut out = Vec::new();
            if let Some(modes) = &connect_modes {
                out.push(Message::new("MODE", [state.current_nick.as_str(), modes.as_str()]));
            }
            if let Some(identity) = identity.filter(|_| !state.negotiator.sasl_authenticated()) {
                debug!("logging in via NickServ");
                out.push(Message::privmsg("NickServ", format!("identify {}", identity)));
            }
            if !channels.is_empty() {
                out.push(Message::new("JOIN", [channels.join(",")]));
            }
            out.extend(state.send_queue.take().unwrap_or_default());

            let tags_enabled = state.negotiator.tags_enabled();
            let lines: Vec<String> = out
                .iter()
                .map(|m| m.to_wire(tags_enabled, state.max_line_len))
                .collect();
            (state.current_nick.clone(), lines)
        };
        info!(%nick, "registered");

        let Some(stream) = writer.as_mut() else {
            return Err(ClientError::NotConnected);
        };
        for line in &lines {
            trace!(">>> {}", line.trim_end());
            stream.write_all(line.as_bytes()).await?;
        }
        stream.flush().await?;
        Ok(())
    }

    pub(super) async fn handle_cap(&self, args: &[String]) -> Result<()> {
        let actions = self.inner.state.lock().negotiator.handle_cap(args);
        self.apply_actions(actions).await
    }

    pub(super) async fn handle_sasl_offer(&self, args: &[String]) -> Result<()> {
        let identity = self.inner.config.lock().identity.clone();
        let actions = self
            .inner
            .state
            .lock()
            .negotiator
            .sasl_start(identity.as_ref(), args);
        self.apply_actions(actions).await
    }

    pub(super) async fn handle_authenticate(&self, param: &str) -> Result<()> {
        let identity = self.inner.config.lock().identity.clone();
        let actions = self
            .inner
            .state
            .lock()
            .negotiator
            .sasl_challenge(identity.as_ref(), param);
        self.apply_actions(actions).await
    }

    pub(super) async fn handle_sasl_result(&self, numeric: &str) -> Result<()> {
        let actions = self.inner.state.lock().negotiator.sasl_result(numeric);
        self.apply_actions(actions).await
    }

    /// Apply an 005 line.
    pub(super) fn apply_isupport(&self, args: &[String]) {
        let updates = crate::isupport::from_response_args(args);
        let nicklen_changed = updates
            .iter()
            .any(|u| matches!(u, IsupportUpdate::Set(key, _) if key == "NICKLEN"));

        let mut state = self.inner.state.lock();
        state.isupport.apply(updates);
        if nicklen_changed {
            let nicklen = state.isupport.nicklen();
            let truncated = truncate_chars(&state.current_nick, nicklen).to_owned();
            state.current_nick = truncated;
        }
    }

    /// Try the next nickname after a 432/433 during registration.
    ///
    /// Returns `None` when no alternative is attempted.
    pub(super) fn next_nick(&self) -> Option<String> {
        let mut state = self.inner.state.lock();
        if state.status == ConnectionStatus::Registered {
            return None;
        }
        let nick = &state.current_nick;
        if nick.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        if nick.chars().count() >= state.isupport.nicklen() {
            return None;
        }
        let next = format!("{}_", nick);
        state.current_nick = next.clone();
        Some(next)
    }

    /// Follow a `NICK` change if it is ours.
    pub(super) fn nick_changed(&self, from: &str, to: &str) {
        let mut state = self.inner.state.lock();
        if state.current_nick.eq_ignore_ascii_case(from) {
            debug!(from, to, "nickname changed");
            state.current_nick = to.to_owned();
        }
    }

    pub(super) fn pong_received(&self, args: &[String]) {
        if args.last().map(String::as_str) == Some(KEEPALIVE_TOKEN) {
            trace!("keepalive pong");
            self.inner.state.lock().pinged = false;
        }
    }

    pub(super) fn set_max_line_len(&self, len: usize) {
        debug!(len, "server raised the line limit");
        self.inner.state.lock().max_line_len = len;
    }

    /// Upgrade to TLS on `port` as instructed by an `sts` policy.
    ///
    /// Returns `false` when the connection is already secure.
    pub(super) async fn upgrade_to_tls(&self, port: u16) -> bool {
        if self.inner.config.lock().use_tls() {
            return false;
        }
        let (persist, retry) = {
            let state = self.inner.state.lock();
            (state.persist, state.retry.clone())
        };
        let _ = self.shutdown(None, false, None).await;
        info!(port, "STS policy received; reconnecting with TLS");
        {
            let mut config = self.inner.config.lock();
            config.port = port;
            config.tls = Some(true);
        }

        let irc = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = retry.cancelled() => {
                    debug!("TLS upgrade cancelled");
                    return;
                }
                _ = tokio::time::sleep(STS_RECONNECT_DELAY) => {}
            }
            irc.set_persist(persist);
            irc.connect_in_background().await;
        });
        true
    }
}

const STS_RECONNECT_DELAY: std::time::Duration = std::time::Duration::from_secs(1);
