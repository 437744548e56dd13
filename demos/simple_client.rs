//! Simple IRC bot example
//!
//! This example demonstrates how to build a small bot with slirc-client.
//! It connects to a server, joins a channel, answers a few commands, and
//! quits cleanly on Ctrl-C.
//!
//! ```text
//! RUST_LOG=slirc_client=debug cargo run --example simple_client -- irc.libera.chat '#slirc-test'
//! ```
//!
//! Set `SLIRC_ACCOUNT` and `SLIRC_PASSWORD` to log in with SASL.

use std::time::Duration;

use slirc_client::{Config, DispatchMode, Identity, Irc, Registration};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "irc.libera.chat".to_string());
    let channel = args.next().unwrap_or_else(|| "#slirc-test".to_string());

    let mut config = Config::new(&host, slirc_client::client::DEFAULT_TLS_PORT, "slirc_example")
        .with_realname("slirc-client example bot")
        .with_channels([channel.as_str()])
        .with_ping_interval(Duration::from_secs(90))
        .with_quit_message("Example finished")
        .with_quit_on_signal(true);
    if let (Ok(account), Ok(password)) = (
        std::env::var("SLIRC_ACCOUNT"),
        std::env::var("SLIRC_PASSWORD"),
    ) {
        config = config.with_identity(Identity::new(account, password));
    }

    let irc = Irc::new(config)?;

    irc.on("001", |irc, _event| async move {
        info!(nick = %irc.current_nick(), caps = ?irc.active_caps(), "registered");
        Ok(())
    })?;

    irc.on("JOIN", |irc, event| async move {
        if event.hostmask.nick == irc.current_nick() {
            if let Some(channel) = event.args.first() {
                irc.me(channel, "is here to help. Try !ping or !time").await;
            }
        }
        Ok(())
    })?;

    irc.on("PRIVMSG", |irc, event| async move {
        let (Some(target), Some(text)) = (event.args.first(), event.args.last()) else {
            return Ok(());
        };
        // Reply in the channel, or privately to the sender.
        let reply_to = if target.starts_with('#') {
            target.as_str()
        } else {
            event.hostmask.nick.as_str()
        };
        match text.as_str() {
            "!ping" => irc.msg(reply_to, "pong").await,
            "!time" => {
                let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                irc.notice(reply_to, &format!("{}: it is {}", event.hostmask.nick, now))
                    .await
            }
            "!quit" if reply_to == event.hostmask.nick => irc.disconnect_with("Asked to leave").await,
            _ => {}
        }
        Ok(())
    })?;

    // Log every line at debug level, with the command name.
    irc.register(
        Registration::new(slirc_client::handler(|_irc, event| async move {
            tracing::debug!(command = ?event.command, source = %event.hostmask, args = ?event.args, "event");
            Ok(())
        }))
        .wants_command(true)
        .mode(DispatchMode::Inline),
    )?;

    irc.connect().await?;
    tokio::signal::ctrl_c().await?;
    // The bot quits on its own signal watcher; give it a moment to send QUIT.
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}
