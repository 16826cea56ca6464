//! Event subscriptions and their dispatch.
//!
//! Handlers never get the session itself. Anything a handler wants to say to
//! the bot is queued on its [`Responder`] as [`Deferred`] work, which the
//! session runs once the current dispatch is over.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;

use dazeus_protocol::{COMMAND_EVENT, Event, Request};
use tracing::{debug, warn};

use crate::api::ReplyKind;
use crate::error::{ClientError, ClientResult};

/// Error type handlers may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type of a handler invocation.
pub type HandlerResult = Result<(), HandlerError>;

/// Callback invoked for matching events.
pub type Handler = Box<dyn FnMut(&Event, &mut Responder<'_>) -> HandlerResult + Send>;

/// Identifies a listener within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Numeric value of the id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a reply to an event should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    /// Network the event happened on.
    pub network: String,
    /// Channel the event happened in, or the bot's nick for private messages.
    pub channel: String,
    /// User that caused the event.
    pub sender: String,
}

impl ReplyTarget {
    /// Reads the addressing carried by an event's first three parameters.
    pub fn from_event(event: &Event) -> Option<Self> {
        if let Some(command) = event.as_command() {
            return Some(Self {
                network: command.network.clone(),
                channel: command.receiver.clone(),
                sender: command.sender.clone(),
            });
        }

        Some(Self {
            network: event.param_str(0)?.to_owned(),
            channel: event.param_str(1)?.to_owned(),
            sender: event.param_str(2)?.to_owned(),
        })
    }
}

/// Work a handler asked the session to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Deferred {
    /// Send a request and require success.
    Request(Request),
    /// Reply to the originator of an event.
    Reply {
        /// Addressing taken from the event.
        target: ReplyTarget,
        /// Reply text.
        message: String,
        /// Prefix the text with the sender's nick in channels.
        highlight: bool,
        /// How the reply is sent.
        kind: ReplyKind,
    },
}

/// Handed to handlers to queue work for the session.
pub struct Responder<'a> {
    event_name: &'a str,
    target: Option<ReplyTarget>,
    queue: &'a mut VecDeque<Deferred>,
}

impl<'a> Responder<'a> {
    fn new(event: &'a Event, queue: &'a mut VecDeque<Deferred>) -> Self {
        Self {
            event_name: event.name(),
            target: ReplyTarget::from_event(event),
            queue,
        }
    }

    /// Addressing of the event being handled, if it has any.
    pub fn target(&self) -> Option<&ReplyTarget> {
        self.target.as_ref()
    }

    /// Replies with a plain message.
    pub fn reply(&mut self, message: impl Into<String>) -> ClientResult<()> {
        self.reply_with(message, false, ReplyKind::Message)
    }

    /// Replies with a message of the given kind.
    pub fn reply_with(
        &mut self,
        message: impl Into<String>,
        highlight: bool,
        kind: ReplyKind,
    ) -> ClientResult<()> {
        let target = self.target.clone().ok_or_else(|| ClientError::NoReplyTarget {
            event: self.event_name.to_owned(),
        })?;
        self.queue.push_back(Deferred::Reply {
            target,
            message: message.into(),
            highlight,
            kind,
        });
        Ok(())
    }

    /// Queues an arbitrary request.
    pub fn send(&mut self, request: Request) {
        self.queue.push_back(Deferred::Request(request));
    }
}

struct Listener {
    event: String,
    command: Option<String>,
    handler: Handler,
}

impl Listener {
    fn matches(&self, event: &Event) -> bool {
        if event.name() != COMMAND_EVENT {
            return true;
        }
        match event.as_command() {
            Some(command) => self.command.as_deref() == Some(command.command.as_str()),
            None => false,
        }
    }
}

/// Outcome of removing a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    /// Event type the listener was registered for.
    pub event: String,
    /// Listeners still registered for that event type.
    pub remaining: usize,
}

/// Counts from one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers that matched and were invoked.
    pub invoked: usize,
    /// Handlers that returned an error.
    pub failed: usize,
}

/// Active subscriptions of one session.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    listeners: BTreeMap<ListenerId, Listener>,
    by_event: HashMap<String, BTreeSet<ListenerId>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler and returns its id.
    ///
    /// Ids start at 0 and are never reused.
    pub fn add(
        &mut self,
        event: impl Into<String>,
        command: Option<String>,
        handler: Handler,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;

        let event = event.into();
        self.by_event.entry(event.clone()).or_default().insert(id);
        self.listeners.insert(
            id,
            Listener {
                event,
                command,
                handler,
            },
        );
        id
    }

    /// Removes a listener. Unknown ids are ignored.
    pub fn remove(&mut self, id: ListenerId) -> Option<Removed> {
        let listener = self.listeners.remove(&id)?;

        let remaining = match self.by_event.get_mut(&listener.event) {
            Some(ids) => {
                ids.remove(&id);
                ids.len()
            }
            None => 0,
        };
        if remaining == 0 {
            self.by_event.remove(&listener.event);
        }

        Some(Removed {
            event: listener.event,
            remaining,
        })
    }

    /// Number of listeners registered for an event type.
    pub fn remaining(&self, event: &str) -> usize {
        self.by_event.get(event).map_or(0, BTreeSet::len)
    }

    /// Whether a listener with this id is registered.
    pub fn contains(&self, id: ListenerId) -> bool {
        self.listeners.contains_key(&id)
    }

    /// Total number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Runs every matching handler in registration order.
    ///
    /// A failing handler is logged and does not stop the others.
    pub fn dispatch(&mut self, event: &Event, queue: &mut VecDeque<Deferred>) -> DispatchReport {
        let mut report = DispatchReport::default();
        let Some(ids) = self.by_event.get(event.name()) else {
            debug!(event = event.name(), "no listeners for event");
            return report;
        };

        for id in ids {
            let Some(listener) = self.listeners.get_mut(id) else {
                continue;
            };
            if !listener.matches(event) {
                continue;
            }

            report.invoked += 1;
            let mut responder = Responder::new(event, queue);
            if let Err(err) = (listener.handler)(event, &mut responder) {
                report.failed += 1;
                warn!(
                    listener = %id,
                    event = event.name(),
                    error = %err,
                    "event handler failed"
                );
            }
        }

        report
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("next_id", &self.next_id)
            .field("listeners", &self.listeners.len())
            .field("events", &self.by_event.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Whether removing the last listener of `event` should be announced to the bot.
///
/// Command listeners share one `COMMAND` subscription that the bot manages
/// per command, so they are never unsubscribed on the wire.
pub(crate) fn needs_wire_unsubscribe(removed: &Removed) -> bool {
    removed.remaining == 0 && removed.event != COMMAND_EVENT
}
