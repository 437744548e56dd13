//! Event handler registration.
//!
//! A [`HandlerRegistry`] maps command names (and the wildcard) to ordered
//! lists of [`Registration`]s. The engine consults three registries for each
//! inbound event: its own built-in handlers, the process-wide registry
//! returned by [`global_handlers`], and the connection's own registry.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use tracing::debug;

use crate::client::Irc;
use crate::dispatch::Event;
use crate::error::RegistryError;

/// Future returned by a handler.
pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// A shareable handler callback.
pub type HandlerFn = Arc<dyn Fn(Irc, Event) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as a [`HandlerFn`].
///
/// ```
/// use slirc_client::handler::{handler, HandlerFn};
///
/// let h: HandlerFn = handler(|irc, event| async move {
///     if let Some(channel) = event.args.first() {
///         irc.msg(channel, "hello").await;
///     }
///     Ok(())
/// });
/// # drop(h);
/// ```
pub fn handler<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(Irc, Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |irc, event| Box::pin(f(irc, event)))
}

/// How the engine runs a handler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// Run as an independent task; the receive loop does not wait.
    #[default]
    Spawn,
    /// Run to completion on the receive loop before the next line is read.
    Inline,
}

/// A handler callback plus the flags controlling how it is invoked.
#[derive(Clone)]
pub struct Registration {
    events: Vec<String>,
    wants_command: bool,
    wants_tags: bool,
    mode: DispatchMode,
    callback: HandlerFn,
}

impl Registration {
    /// Start a registration for `callback` with no events.
    pub fn new(callback: HandlerFn) -> Self {
        Self {
            events: Vec::new(),
            wants_command: false,
            wants_tags: false,
            mode: DispatchMode::Spawn,
            callback,
        }
    }

    /// Add an event name. Names are case-insensitive.
    #[must_use]
    pub fn event(mut self, event: impl AsRef<str>) -> Self {
        self.events.push(event.as_ref().to_ascii_uppercase());
        self
    }

    /// Add several event names.
    #[must_use]
    pub fn events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.events
            .extend(events.into_iter().map(|e| e.as_ref().to_ascii_uppercase()));
        self
    }

    /// Pass the matched command name in [`Event::command`]. With no events
    /// this makes the handler a wildcard.
    #[must_use]
    pub fn wants_command(mut self, yes: bool) -> Self {
        self.wants_command = yes;
        self
    }

    /// Pass message tags in [`Event::tags`].
    #[must_use]
    pub fn ircv3(mut self, yes: bool) -> Self {
        self.wants_tags = yes;
        self
    }

    /// Set the dispatch mode.
    #[must_use]
    pub fn mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn event_names(&self) -> &[String] {
        &self.events
    }

    pub fn is_wildcard(&self) -> bool {
        self.events.is_empty() && self.wants_command
    }

    pub fn command_wanted(&self) -> bool {
        self.wants_command
    }

    pub fn tags_wanted(&self) -> bool {
        self.wants_tags
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn callback(&self) -> &HandlerFn {
        &self.callback
    }

    fn same_callback(&self, other: &HandlerFn) -> bool {
        // Compare data pointers only; vtable addresses are not unique.
        std::ptr::eq(
            Arc::as_ptr(&self.callback) as *const (),
            Arc::as_ptr(other) as *const (),
        )
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("events", &self.events)
            .field("wants_command", &self.wants_command)
            .field("wants_tags", &self.wants_tags)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Registry of event handlers, safe to update while events are dispatched.
#[derive(Default)]
pub struct HandlerRegistry {
    /// `None` holds wildcard handlers.
    handlers: RwLock<HashMap<Option<String>, Vec<Registration>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under each of its events, or as a wildcard.
    ///
    /// Registering the same callback under the same key again is a no-op.
    pub fn register(&self, registration: Registration) -> Result<(), RegistryError> {
        let keys: Vec<Option<String>> = if registration.events.is_empty() {
            if !registration.wants_command {
                return Err(RegistryError::NoEvents);
            }
            vec![None]
        } else {
            registration.events.iter().cloned().map(Some).collect()
        };

        let mut handlers = self.handlers.write();
        for key in keys {
            let list = handlers.entry(key).or_default();
            if list.iter().any(|r| r.same_callback(&registration.callback)) {
                continue;
            }
            list.push(registration.clone());
        }
        debug!(events = ?registration.events, "registered handler");
        Ok(())
    }

    /// Handlers for `command`: exact matches first, then wildcards.
    pub fn lookup(&self, command: &str) -> Vec<Registration> {
        let key = Some(command.to_ascii_uppercase());
        let handlers = self.handlers.read();
        let exact = handlers.get(&key).into_iter().flatten();
        let wildcard = handlers.get(&None).into_iter().flatten();
        exact.chain(wildcard).cloned().collect()
    }

    /// Whether any handler is registered under exactly `command`. Wildcards
    /// do not count.
    pub fn handles(&self, command: &str) -> bool {
        let key = Some(command.to_ascii_uppercase());
        self.handlers.read().get(&key).is_some_and(|list| !list.is_empty())
    }

    /// Remove every registration.
    pub fn clear(&self) {
        self.handlers.write().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().values().all(Vec::is_empty)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        f.debug_map()
            .entries(handlers.iter().map(|(k, v)| (k, v.len())))
            .finish()
    }
}

/// The process-wide registry consulted by every connection that has not
/// opted out with [`Config::global_handlers`](crate::Config::global_handlers).
///
/// Populate it during application startup; call [`HandlerRegistry::clear`]
/// on teardown.
pub fn global_handlers() -> &'static HandlerRegistry {
    static GLOBAL: OnceLock<HandlerRegistry> = OnceLock::new();
    GLOBAL.get_or_init(HandlerRegistry::new)
}
