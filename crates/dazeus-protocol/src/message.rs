//! Requests, responses and events exchanged with the bot.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::COMMAND_EVENT;
use crate::error::{ProtocolError, ProtocolResult};
use crate::scope::Scope;

/// Whether a request reads state or performs an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Serialized under the `get` key.
    Get,
    /// Serialized under the `do` key.
    Do,
}

impl RequestKind {
    fn key(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Do => "do",
        }
    }
}

/// A request sent from the plugin to the bot.
///
/// ```rust
/// use dazeus_protocol::{Request, Scope};
///
/// let request = Request::action("property")
///     .param("get")
///     .param("greeting")
///     .with_scope(&Scope::network("freenode"));
/// assert_eq!(
///     serde_json::to_string(&request).unwrap(),
///     r#"{"do":"property","params":["get","greeting"],"scope":["freenode"]}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    kind: RequestKind,
    name: String,
    params: Vec<Value>,
    scope: Option<Vec<String>>,
}

impl Request {
    fn new(kind: RequestKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            params: Vec::new(),
            scope: None,
        }
    }

    /// Creates a `get` request.
    pub fn get(name: impl Into<String>) -> Self {
        Self::new(RequestKind::Get, name)
    }

    /// Creates a `do` request.
    pub fn action(name: impl Into<String>) -> Self {
        Self::new(RequestKind::Do, name)
    }

    /// Appends a positional parameter.
    #[must_use]
    pub fn param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Appends several positional parameters.
    #[must_use]
    pub fn params<I>(mut self, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.params.extend(values.into_iter().map(Into::into));
        self
    }

    /// Attaches a scope. The universal scope is left off the wire.
    #[must_use]
    pub fn with_scope(mut self, scope: &Scope) -> Self {
        self.scope = (!scope.is_universal()).then(|| scope.to_address_list());
        self
    }

    /// Request kind.
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Request name (`networks`, `join`, ...).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Positional parameters.
    pub fn param_values(&self) -> &[Value] {
        &self.params
    }
}

impl Serialize for Request {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(self.kind.key(), &self.name)?;
        if !self.params.is_empty() {
            map.serialize_entry("params", &self.params)?;
        }
        if let Some(scope) = &self.scope {
            map.serialize_entry("scope", scope)?;
        }
        map.end()
    }
}

/// A reply to a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response(Map<String, Value>);

impl Response {
    /// Wraps a decoded JSON object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Whether the bot reported success.
    ///
    /// Older bots send an explicit `success` flag; newer ones only send
    /// `error` when something went wrong.
    pub fn is_success(&self) -> bool {
        match self.0.get("success") {
            Some(flag) => is_truthy(flag),
            None => !self.0.contains_key("error"),
        }
    }

    /// Error text supplied by the bot, if any.
    pub fn error(&self) -> Option<String> {
        self.0.get("error").map(|error| match error {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    }

    /// Looks up a response field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Removes and returns a response field.
    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// All response fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Unwraps into the underlying JSON object.
    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// An event as it appeared on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// Event type, e.g. `PRIVMSG` or `COMMAND`.
    pub event: String,
    /// Positional parameters.
    pub params: Vec<Value>,
}

/// A command invocation (`COMMAND` event).
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEvent {
    /// Network the command was issued on.
    pub network: String,
    /// Channel (or bot nick, for private messages) the command was sent to.
    pub receiver: String,
    /// User that issued the command.
    pub sender: String,
    /// Command name without the highlight character.
    pub command: String,
    /// Remaining parameters.
    pub args: Vec<Value>,
    raw: RawEvent,
}

impl CommandEvent {
    /// Reads the positional fields, handing the raw event back when one of
    /// the first four is missing or not a string.
    fn parse(raw: RawEvent) -> Result<Self, RawEvent> {
        let field = |index: usize| {
            raw.params
                .get(index)
                .and_then(Value::as_str)
                .map(str::to_owned)
        };
        let (Some(network), Some(receiver), Some(sender), Some(command)) =
            (field(0), field(1), field(2), field(3))
        else {
            return Err(raw);
        };

        Ok(Self {
            network,
            receiver,
            sender,
            command,
            args: raw.params.iter().skip(4).cloned().collect(),
            raw,
        })
    }

    /// Argument at `index` as a string, if present.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(Value::as_str)
    }
}

/// An unsolicited notification from the bot.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Any event other than a command invocation.
    Plain(RawEvent),
    /// A command invocation.
    Command(CommandEvent),
}

impl Event {
    /// Classifies a raw event.
    ///
    /// A `COMMAND` event too short to carry a command name stays
    /// [`Event::Plain`]; see [`Event::is_malformed_command`].
    pub fn from_raw(raw: RawEvent) -> Self {
        if raw.event != COMMAND_EVENT {
            return Self::Plain(raw);
        }
        match CommandEvent::parse(raw) {
            Ok(command) => Self::Command(command),
            Err(raw) => Self::Plain(raw),
        }
    }

    /// Whether this is a `COMMAND` event whose parameters could not be read.
    pub fn is_malformed_command(&self) -> bool {
        matches!(self, Self::Plain(raw) if raw.event == COMMAND_EVENT)
    }

    fn raw(&self) -> &RawEvent {
        match self {
            Self::Plain(raw) => raw,
            Self::Command(command) => &command.raw,
        }
    }

    /// Event type.
    pub fn name(&self) -> &str {
        &self.raw().event
    }

    /// All positional parameters, unmodified.
    pub fn params(&self) -> &[Value] {
        &self.raw().params
    }

    /// Parameter at `index` as a string, if present.
    pub fn param_str(&self, index: usize) -> Option<&str> {
        self.params().get(index).and_then(Value::as_str)
    }

    /// The command invocation, for `COMMAND` events.
    pub fn as_command(&self) -> Option<&CommandEvent> {
        match self {
            Self::Command(command) => Some(command),
            Self::Plain(_) => None,
        }
    }
}

/// A decoded message, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Carries an `event` key.
    Event(Event),
    /// Anything else.
    Response(Response),
}

impl Message {
    /// Classifies a decoded JSON value.
    pub fn from_value(value: Value) -> ProtocolResult<Self> {
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => return Err(ProtocolError::NotAnObject(other.to_string())),
        };

        let Some(event) = fields.remove("event") else {
            return Ok(Self::Response(Response::new(fields)));
        };

        let event = match event {
            Value::String(name) => name,
            other => {
                return Err(ProtocolError::MalformedEvent {
                    event: other.to_string(),
                    reason: "event type is not a string".to_owned(),
                });
            }
        };

        let params = match fields.remove("params") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(params)) => params,
            Some(_) => {
                return Err(ProtocolError::MalformedEvent {
                    event,
                    reason: "params is not an array".to_owned(),
                });
            }
        };

        Ok(Self::Event(Event::from_raw(RawEvent { event, params })))
    }
}
