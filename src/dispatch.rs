//! Handler invocation.
//!
//! Each matched [`Registration`] gets its own [`Event`] and runs either on a
//! [`HandlerExecutor`] (the default) or inline on the receive loop. Errors
//! and panics are caught at the invocation boundary and logged, so a failing
//! handler never affects the engine or its siblings.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tracing::{error, trace};

use crate::client::Irc;
use crate::handler::{DispatchMode, HandlerFuture, Registration};
use crate::message::{Message, Tags};
use crate::prefix::Hostmask;

/// What a handler receives.
///
/// `command` and `tags` are filled only when the registration asked for
/// them. `args` is a private copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub command: Option<String>,
    pub hostmask: Hostmask,
    pub tags: Option<Tags>,
    pub args: Vec<String>,
}

impl Event {
    pub(crate) fn for_registration(registration: &Registration, msg: &Message) -> Self {
        Self {
            command: registration
                .command_wanted()
                .then(|| msg.command.clone()),
            hostmask: msg.hostmask.clone(),
            tags: registration.tags_wanted().then(|| msg.tags.clone()),
            args: msg.args.clone(),
        }
    }
}

/// Runs spawned handler invocations.
pub trait HandlerExecutor: Send + Sync + 'static {
    /// Start `task`; must not block the caller.
    fn execute(&self, task: BoxFuture<'static, ()>);
}

/// One tokio task per invocation.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpawnExecutor;

impl HandlerExecutor for SpawnExecutor {
    fn execute(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }
}

/// At most `limit` invocations running at once; the rest wait for a slot.
#[derive(Clone, Debug)]
pub struct BoundedExecutor {
    permits: Arc<Semaphore>,
}

impl BoundedExecutor {
    pub fn new(limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    /// Slots not currently in use.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl HandlerExecutor for BoundedExecutor {
    fn execute(&self, task: BoxFuture<'static, ()>) {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            // The semaphore is never closed.
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            task.await;
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

/// Await a handler future, logging its error or panic.
pub(crate) async fn run_isolated(event: String, fut: HandlerFuture) {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(%event, error = ?e, "handler failed"),
        Err(panic) => error!(%event, panic = panic_message(&*panic), "handler panicked"),
    }
}

/// Invoke every registration for `msg`. Inline handlers finish before this
/// returns; spawned ones are handed to `executor`.
pub(crate) async fn dispatch(
    irc: &Irc,
    executor: &dyn HandlerExecutor,
    registrations: Vec<Registration>,
    msg: &Message,
) {
    for registration in registrations {
        let event = Event::for_registration(&registration, msg);
        let fut = (registration.callback())(irc.clone(), event);
        let name = msg.command.clone();
        match registration.dispatch_mode() {
            DispatchMode::Spawn => {
                trace!(event = %name, "spawning handler");
                executor.execute(Box::pin(run_isolated(name, fut)));
            }
            DispatchMode::Inline => run_isolated(name, fut).await,
        }
    }
}
