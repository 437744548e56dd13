//! Handlers every connection runs before any user handler.

use std::sync::OnceLock;

use tracing::{debug, warn};

use super::Irc;
use crate::caps::{max_line_len, sts_port, Capability};
use crate::dispatch::Event;
use crate::handler::{handler, DispatchMode, HandlerFn, HandlerRegistry, Registration};
use crate::message::Message;
use crate::util::DEFAULT_LINE_LEN;

/// Reply to CTCP `VERSION` requests.
pub(crate) const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

/// The built-in registry, shared by all connections.
pub(super) fn handlers() -> &'static HandlerRegistry {
    static BUILTIN: OnceLock<HandlerRegistry> = OnceLock::new();
    BUILTIN.get_or_init(|| {
        let registry = HandlerRegistry::new();
        for registration in registrations() {
            if let Err(e) = registry.register(registration) {
                warn!(error = %e, "built-in handler rejected");
            }
        }
        registry
    })
}

fn inline(callback: HandlerFn) -> Registration {
    Registration::new(callback).mode(DispatchMode::Inline)
}

fn registrations() -> Vec<Registration> {
    vec![
        inline(handler(on_welcome)).event("001"),
        inline(handler(on_ping)).event("PING"),
        inline(handler(on_pong)).event("PONG"),
        inline(handler(on_nick_unavailable)).events(["432", "433"]),
        inline(handler(on_nick)).event("NICK"),
        inline(handler(on_cap)).event("CAP"),
        inline(handler(on_authenticate)).event("AUTHENTICATE"),
        inline(handler(on_sasl_result))
            .events(["902", "903", "904", "905"])
            .wants_command(true),
        inline(handler(on_isupport)).event("005"),
        inline(handler(on_sasl)).event(Capability::Sasl.event_name()),
        inline(handler(on_sts)).event(Capability::Sts.event_name()),
        inline(handler(on_maxline)).event(Capability::MaxLine.event_name()),
        Registration::new(handler(on_ctcp_version)).event("PRIVMSG"),
    ]
}

async fn on_welcome(irc: Irc, _event: Event) -> anyhow::Result<()> {
    irc.complete_registration().await?;
    Ok(())
}

async fn on_ping(irc: Irc, event: Event) -> anyhow::Result<()> {
    irc.send_forced(Message::new("PONG", event.args)).await?;
    Ok(())
}

async fn on_pong(irc: Irc, event: Event) -> anyhow::Result<()> {
    irc.pong_received(&event.args);
    Ok(())
}

async fn on_nick_unavailable(irc: Irc, _event: Event) -> anyhow::Result<()> {
    if let Some(nick) = irc.next_nick() {
        warn!(%nick, "nickname unavailable; trying an alternative");
        irc.send_forced(Message::new("NICK", [nick])).await?;
    }
    Ok(())
}

async fn on_nick(irc: Irc, event: Event) -> anyhow::Result<()> {
    if let Some(to) = event.args.last() {
        irc.nick_changed(&event.hostmask.nick, to);
    }
    Ok(())
}

async fn on_cap(irc: Irc, event: Event) -> anyhow::Result<()> {
    irc.handle_cap(&event.args).await?;
    Ok(())
}

async fn on_authenticate(irc: Irc, event: Event) -> anyhow::Result<()> {
    if let Some(param) = event.args.first() {
        irc.handle_authenticate(param).await?;
    }
    Ok(())
}

async fn on_sasl_result(irc: Irc, event: Event) -> anyhow::Result<()> {
    if let Some(numeric) = event.command.as_deref() {
        debug!(numeric, "SASL result");
        irc.handle_sasl_result(numeric).await?;
    }
    Ok(())
}

async fn on_isupport(irc: Irc, event: Event) -> anyhow::Result<()> {
    irc.apply_isupport(&event.args);
    Ok(())
}

async fn on_sasl(irc: Irc, event: Event) -> anyhow::Result<()> {
    irc.handle_sasl_offer(&event.args).await?;
    Ok(())
}

async fn on_sts(irc: Irc, event: Event) -> anyhow::Result<()> {
    let upgraded = match sts_port(&event.args) {
        Some(port) => irc.upgrade_to_tls(port).await,
        None => false,
    };
    if !upgraded {
        irc.finish_negotiation(Capability::Sts.as_ref()).await?;
    }
    Ok(())
}

async fn on_maxline(irc: Irc, event: Event) -> anyhow::Result<()> {
    if let Some(len) = max_line_len(&event.args, DEFAULT_LINE_LEN) {
        if len > DEFAULT_LINE_LEN {
            irc.set_max_line_len(len);
        }
    }
    irc.finish_negotiation(Capability::MaxLine.as_ref()).await?;
    Ok(())
}

async fn on_ctcp_version(irc: Irc, event: Event) -> anyhow::Result<()> {
    let Some(text) = event.args.last() else {
        return Ok(());
    };
    if text.len() > 1 && text.starts_with("\x01VERSION") && text.ends_with('\x01') {
        irc.ctcp(&event.hostmask.nick, &format!("VERSION {}", VERSION), true)
            .await;
    }
    Ok(())
}
