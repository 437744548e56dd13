//! Sans-IO capability negotiation state machine.
//!
//! This module tracks the IRCv3 `CAP` exchange for one connection. It does
//! not perform any I/O. Instead, it consumes the arguments of `CAP`,
//! `AUTHENTICATE` and SASL numerics, and produces [`CapAction`]s that the
//! connection engine carries out.
//!
//! # Design Philosophy
//!
//! - **Sans-IO**: No network calls, timers, or locking. Pure state transitions.
//! - **Testable**: Easy to unit test without mocking network.
//!
//! # Example
//!
//! ```
//! use slirc_client::state::{CapAction, CapNegotiator, NegotiationState};
//!
//! let mut neg = CapNegotiator::new(["server-time".to_string()].into_iter().collect());
//! let _ls = neg.start();
//!
//! let args: Vec<String> = ["*", "LS", "server-time multi-prefix"]
//!     .iter().map(|s| s.to_string()).collect();
//! let actions = neg.handle_cap(&args);
//! assert!(matches!(&actions[..], [CapAction::Send(req)] if req.args == ["REQ", "server-time"]));
//! assert_eq!(neg.state(), NegotiationState::Requesting);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::caps::{parse_ack, split_cap_token, CapChange, Capability};
use crate::sasl::{chunk_response, plain_offered, Identity};
use crate::Message;

/// Progress of capability negotiation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NegotiationState {
    /// Not connected.
    #[default]
    Idle,
    /// Sent `CAP LS 302`, awaiting the capability list.
    Listing,
    /// Sent `CAP REQ`, awaiting `ACK`/`NAK` or follow-up handlers.
    Requesting,
    /// SASL exchange in progress.
    Authenticating,
    /// Negotiation finished or aborted.
    Done,
}

/// Actions produced by the negotiator.
///
/// The caller is responsible for carrying these out in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CapAction {
    /// Send this message immediately, bypassing the registration queue.
    Send(Message),
    /// Dispatch the `IRCv3 <cap>` pseudo-event with `args`. If no handler
    /// is registered for it, call [`CapNegotiator::finish`] for `cap`.
    Claim {
        /// Lowercased capability name.
        cap: String,
        /// Raw `[name]` or `[name, value]` from the LS line.
        args: Vec<String>,
    },
    /// Negotiation is complete; send `CAP END` unless already registered.
    End,
}

fn cap(args: &[&str]) -> CapAction {
    CapAction::Send(Message::new("CAP", args.iter().copied()))
}

fn authenticate(arg: &str) -> CapAction {
    CapAction::Send(Message::new("AUTHENTICATE", [arg]))
}

/// Capability negotiation and SASL state for one connection.
#[derive(Clone, Debug, Default)]
pub struct CapNegotiator {
    desired: BTreeSet<String>,
    state: NegotiationState,
    active: BTreeSet<String>,
    /// Requested or claimed but not yet finished. `Some` while negotiating.
    pending: Option<BTreeMap<String, Vec<String>>>,
    /// The last chunk of a multi-line `CAP LS` has arrived.
    ls_complete: bool,
    sasl_in_flight: bool,
    sasl_authenticated: bool,
}

impl CapNegotiator {
    /// Create a negotiator that will request any of `desired` the server
    /// offers. Names are compared case-insensitively.
    #[must_use]
    pub fn new(desired: BTreeSet<String>) -> Self {
        Self {
            desired: desired.iter().map(|c| c.to_ascii_lowercase()).collect(),
            ..Self::default()
        }
    }

    /// Get the current negotiation state.
    #[must_use]
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Capabilities acknowledged by the server.
    #[must_use]
    pub fn active_caps(&self) -> &BTreeSet<String> {
        &self.active
    }

    /// Capabilities awaiting completion, or `None` outside negotiation.
    #[must_use]
    pub fn pending_caps(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        self.pending.as_ref()
    }

    /// Whether a tag capability has been acknowledged.
    #[must_use]
    pub fn tags_enabled(&self) -> bool {
        self.active
            .iter()
            .any(|c| Capability::from(c.as_str()).enables_tags())
    }

    /// Whether SASL completed successfully on this connection.
    #[must_use]
    pub fn sasl_authenticated(&self) -> bool {
        self.sasl_authenticated
    }

    /// Begin negotiation on a fresh connection.
    #[must_use]
    pub fn start(&mut self) -> Vec<CapAction> {
        self.reset();
        self.state = NegotiationState::Listing;
        self.pending = Some(BTreeMap::new());
        vec![cap(&["LS", "302"])]
    }

    /// Forget all negotiated state after a disconnect.
    pub fn reset(&mut self) {
        self.state = NegotiationState::Idle;
        self.active.clear();
        self.pending = None;
        self.ls_complete = false;
        self.sasl_in_flight = false;
        self.sasl_authenticated = false;
    }

    /// Registration completed (001). No `CAP END` will follow.
    pub fn registered(&mut self) {
        self.pending = None;
        self.ls_complete = true;
        self.state = NegotiationState::Done;
    }

    /// Feed the arguments of a `CAP` message.
    #[must_use]
    pub fn handle_cap(&mut self, args: &[String]) -> Vec<CapAction> {
        if args.len() < 3 {
            return Vec::new();
        }
        let list = args.last().map(String::as_str).unwrap_or("");

        match args[1].to_ascii_uppercase().as_str() {
            sub @ ("LS" | "NEW") => {
                let more_coming = sub == "LS" && args.len() > 3 && args[2] == "*";
                self.handle_offer(list, sub == "LS", more_coming)
            }
            "ACK" => self.handle_ack(list),
            "NAK" => {
                self.pending = None;
                self.state = NegotiationState::Done;
                vec![CapAction::End]
            }
            "DEL" => {
                for name in list.split_whitespace() {
                    self.active.remove(&name.to_ascii_lowercase());
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn handle_offer(&mut self, list: &str, is_ls: bool, more_coming: bool) -> Vec<CapAction> {
        let mut actions = Vec::new();
        let mut request = Vec::new();
        if is_ls {
            self.ls_complete = !more_coming;
        }
        let pending = self.pending.get_or_insert_with(BTreeMap::new);

        for token in list.split_whitespace() {
            let (name, raw) = split_cap_token(token);
            if !self.desired.contains(&name) {
                continue;
            }
            pending.insert(name.clone(), raw.clone());
            if name == Capability::Sts.as_ref() {
                actions.push(CapAction::Claim { cap: name, args: raw });
            } else {
                request.push(name);
            }
        }

        if !request.is_empty() {
            let request = request.join(" ");
            actions.push(cap(&["REQ", request.as_str()]));
            self.state = NegotiationState::Requesting;
        } else if is_ls && self.ls_complete && pending.is_empty() {
            self.pending = None;
            self.state = NegotiationState::Done;
            actions.push(CapAction::End);
        }
        actions
    }

    fn handle_ack(&mut self, list: &str) -> Vec<CapAction> {
        let mut actions = Vec::new();
        for change in parse_ack(list) {
            match change {
                CapChange::Enable(name) => {
                    self.active.insert(name.clone());
                    let raw = self.pending.as_ref().and_then(|p| p.get(&name)).cloned();
                    if let Some(args) = raw {
                        actions.push(CapAction::Claim { cap: name, args });
                    }
                }
                CapChange::Disable(name) => {
                    self.active.remove(&name);
                    actions.extend(self.finish(&name));
                }
            }
        }
        actions
    }

    /// Mark a claimed capability as handled.
    ///
    /// Returns [`CapAction::End`] once nothing is left pending and the full
    /// `CAP LS` reply has been seen.
    #[must_use]
    pub fn finish(&mut self, cap: &str) -> Vec<CapAction> {
        let cap = cap.to_ascii_lowercase();
        let Some(pending) = self.pending.as_mut() else {
            return Vec::new();
        };
        if pending.remove(&cap).is_none() {
            return Vec::new();
        }

        if pending.is_empty() && self.ls_complete {
            self.pending = None;
            self.state = NegotiationState::Done;
            return vec![CapAction::End];
        }
        if cap == Capability::Sasl.as_ref() && self.state == NegotiationState::Authenticating {
            self.state = NegotiationState::Requesting;
        }
        Vec::new()
    }

    /// Handle the `IRCv3 SASL` pseudo-event.
    ///
    /// `args` is `[name]` or `[name, mechanisms]`.
    #[must_use]
    pub fn sasl_start(&mut self, identity: Option<&Identity>, args: &[String]) -> Vec<CapAction> {
        let mechanisms = args.get(1).map(String::as_str);
        if identity.is_some() && plain_offered(mechanisms) {
            self.state = NegotiationState::Authenticating;
            self.sasl_in_flight = true;
            return vec![authenticate("PLAIN")];
        }

        self.sasl_in_flight = false;
        let mut actions = vec![authenticate("*")];
        actions.extend(self.finish(Capability::Sasl.as_ref()));
        actions
    }

    /// Handle an `AUTHENTICATE` message from the server.
    #[must_use]
    pub fn sasl_challenge(&mut self, identity: Option<&Identity>, param: &str) -> Vec<CapAction> {
        match identity {
            Some(identity) if param == "+" && self.sasl_in_flight => {
                chunk_response(&identity.plain_payload())
                    .iter()
                    .map(|chunk| authenticate(chunk))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// Handle SASL numerics 902 through 905.
    #[must_use]
    pub fn sasl_result(&mut self, numeric: &str) -> Vec<CapAction> {
        let mut actions = Vec::new();
        match numeric {
            "903" => self.sasl_authenticated = true,
            "904" | "905" if self.sasl_in_flight => actions.push(authenticate("*")),
            _ => {}
        }
        self.sasl_in_flight = false;
        actions.extend(self.finish(Capability::Sasl.as_ref()));
        actions
    }
}
