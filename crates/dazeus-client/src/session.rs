//! A plugin's session with the bot.
//!
//! The session owns one connection and multiplexes two kinds of traffic over
//! it: responses to the single outstanding request, and events. Reading a
//! response always drains and dispatches the events queued before it, in wire
//! order.

use std::collections::VecDeque;
use std::convert::Infallible;

use dazeus_protocol::{
    COMMAND_EVENT, Event, FrameReader, FrameWriter, Message, Request, Response, Scope,
};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tracing::{debug, info, warn};

use crate::address::{Address, Connection};
use crate::error::{ClientError, ClientResult};
use crate::listener::{
    Deferred, DispatchReport, Handler, HandlerResult, ListenerId, ListenerRegistry, Responder,
    needs_wire_unsubscribe,
};

/// Request cycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No request outstanding.
    Idle,
    /// A request was written and its response has not been read yet.
    AwaitingResponse,
    /// A transport or protocol failure made the stream unusable.
    Broken,
}

/// What to do with a local listener when the bot rejects its subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RollbackPolicy {
    /// Remove the listener again.
    #[default]
    Rollback,
    /// Keep the listener registered.
    Keep,
}

/// Session behaviour switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Handling of listeners whose subscription failed.
    pub rollback: RollbackPolicy,
    /// Log every raw payload sent and received.
    pub debug_payloads: bool,
}

/// A session with the bot over any byte stream.
pub struct Session<S> {
    reader: FrameReader<ReadHalf<S>>,
    writer: FrameWriter<WriteHalf<S>>,
    registry: ListenerRegistry,
    deferred: VecDeque<Deferred>,
    state: SessionState,
    options: SessionOptions,
}

impl Session<Connection> {
    /// Connects to the bot at `address`.
    pub async fn connect(address: &Address, options: SessionOptions) -> ClientResult<Self> {
        let connection = address.connect().await?;
        info!(address = %address, "connected to bot");
        Ok(Self::with_options(connection, options))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    /// Creates a session over an open stream with default options.
    pub fn new(stream: S) -> Self {
        Self::with_options(stream, SessionOptions::default())
    }

    /// Creates a session over an open stream.
    pub fn with_options(stream: S, options: SessionOptions) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(write_half),
            registry: ListenerRegistry::new(),
            deferred: VecDeque::new(),
            state: SessionState::Idle,
            options,
        }
    }

    /// Current request cycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Registered listeners.
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.registry
    }

    /// Number of handler requests waiting for [`Session::run_deferred`].
    pub fn pending_deferred(&self) -> usize {
        self.deferred.len()
    }

    fn ensure_idle(&self) -> ClientResult<()> {
        match self.state {
            SessionState::Idle => Ok(()),
            SessionState::AwaitingResponse => Err(ClientError::Busy),
            SessionState::Broken => Err(ClientError::SessionBroken),
        }
    }

    /// Marks the session broken if `err` is fatal and passes it on.
    fn fail(&mut self, err: ClientError) -> ClientError {
        if err.is_fatal() {
            self.state = SessionState::Broken;
        }
        err
    }

    async fn write(&mut self, request: &Request) -> ClientResult<()> {
        if self.options.debug_payloads {
            let payload = serde_json::to_value(request).unwrap_or(Value::Null);
            debug!(%payload, "sending message");
        }
        self.writer.write_message(request).await?;
        Ok(())
    }

    async fn read(&mut self) -> ClientResult<Message> {
        let payload = self.reader.read_message().await?;
        if self.options.debug_payloads {
            debug!(%payload, "received message");
        }
        Ok(Message::from_value(payload)?)
    }

    fn dispatch(&mut self, event: &Event) -> DispatchReport {
        if event.is_malformed_command() {
            warn!(params = ?event.params(), "command event without a command name");
        }
        let report = self.registry.dispatch(event, &mut self.deferred);
        debug!(
            event = event.name(),
            invoked = report.invoked,
            failed = report.failed,
            "dispatched event"
        );
        report
    }

    async fn exchange(&mut self, request: &Request) -> ClientResult<Response> {
        self.write(request).await?;
        loop {
            match self.read().await? {
                Message::Event(event) => {
                    self.dispatch(&event);
                }
                Message::Response(response) => return Ok(response),
            }
        }
    }

    /// Sends a request and waits for its response.
    ///
    /// Events that arrive first are dispatched before this returns.
    pub async fn request(&mut self, request: &Request) -> ClientResult<Response> {
        self.ensure_idle()?;
        self.state = SessionState::AwaitingResponse;

        match self.exchange(request).await {
            Ok(response) => {
                self.state = SessionState::Idle;
                Ok(response)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Sends a request and fails unless the bot reports success.
    pub async fn request_success(&mut self, request: &Request) -> ClientResult<Response> {
        let response = self.request(request).await?;
        if response.is_success() {
            return Ok(response);
        }
        match response.error() {
            Some(error) => Err(ClientError::Remote(error)),
            None => Err(ClientError::UnknownRemote),
        }
    }

    /// Dispatches events forever.
    ///
    /// Deferred handler work already queued runs first, then after each
    /// event. Failed deferred requests
    /// are logged; only fatal errors end the loop.
    pub async fn listen(&mut self) -> ClientResult<Infallible> {
        self.ensure_idle()?;
        info!(listeners = self.registry.len(), "listening for events");
        self.run_deferred_logged().await?;

        loop {
            let message = match self.read().await {
                Ok(message) => message,
                Err(err) => return Err(self.fail(err)),
            };

            match message {
                Message::Event(event) => {
                    self.dispatch(&event);
                    self.run_deferred_logged().await?;
                }
                Message::Response(response) => {
                    let response = Value::Object(response.into_fields()).to_string();
                    return Err(self.fail(ClientError::UnexpectedResponse { response }));
                }
            }
        }
    }

    async fn run_deferred_logged(&mut self) -> ClientResult<()> {
        while let Some(work) = self.deferred.pop_front() {
            if let Err(err) = self.run_one(work).await {
                if err.is_fatal() {
                    return Err(err);
                }
                warn!(error = %err, "deferred request failed");
            }
        }
        Ok(())
    }

    async fn run_one(&mut self, work: Deferred) -> ClientResult<()> {
        match work {
            Deferred::Request(request) => {
                self.request_success(&request).await?;
            }
            Deferred::Reply {
                target,
                message,
                highlight,
                kind,
            } => {
                self.reply(&target, &message, highlight, kind).await?;
            }
        }
        Ok(())
    }

    /// Runs work queued by handlers, including work queued while running it.
    ///
    /// Stops at the first failure; the rest stays queued.
    pub async fn run_deferred(&mut self) -> ClientResult<()> {
        while let Some(work) = self.deferred.pop_front() {
            self.run_one(work).await?;
        }
        Ok(())
    }

    async fn subscribe_listener(
        &mut self,
        event: &str,
        command: Option<String>,
        handler: Handler,
        request: Request,
    ) -> ClientResult<ListenerId> {
        // Registered before the request goes out so events interleaved with
        // the subscription's own response are not missed.
        let id = self.registry.add(event, command, handler);

        match self.request_success(&request).await {
            Ok(_) => {
                info!(listener = %id, event, "subscribed");
                Ok(id)
            }
            Err(err) => {
                if self.options.rollback == RollbackPolicy::Rollback {
                    self.registry.remove(id);
                }
                Err(err)
            }
        }
    }

    /// Subscribes `handler` to an event type.
    pub async fn subscribe<F>(&mut self, event: &str, handler: F) -> ClientResult<ListenerId>
    where
        F: FnMut(&Event, &mut Responder<'_>) -> HandlerResult + Send + 'static,
    {
        let request = Request::action("subscribe").param(event);
        self.subscribe_listener(event, None, Box::new(handler), request)
            .await
    }

    /// Subscribes `handler` to invocations of `command` within `scope`.
    pub async fn subscribe_command<F>(
        &mut self,
        command: &str,
        handler: F,
        scope: &Scope,
    ) -> ClientResult<ListenerId>
    where
        F: FnMut(&Event, &mut Responder<'_>) -> HandlerResult + Send + 'static,
    {
        let request = Request::action("command")
            .param(command)
            .params(scope.to_command_list()?);
        self.subscribe_listener(
            COMMAND_EVENT,
            Some(command.to_owned()),
            Box::new(handler),
            request,
        )
        .await
    }

    /// Removes a listener.
    ///
    /// When it was the last one for a non-command event, the bot is asked to
    /// stop sending that event. Returns whether the listener existed.
    pub async fn unsubscribe(&mut self, id: ListenerId) -> ClientResult<bool> {
        self.ensure_idle()?;
        let Some(removed) = self.registry.remove(id) else {
            return Ok(false);
        };

        if needs_wire_unsubscribe(&removed) {
            let request = Request::action("unsubscribe").param(removed.event.as_str());
            self.request_success(&request).await?;
            info!(event = %removed.event, "unsubscribed");
        }
        Ok(true)
    }

    /// Shuts down the write side of the connection.
    pub async fn close(mut self) -> ClientResult<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use dazeus_protocol::{FrameDecoder, encode_message};
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    use super::*;

    /// Server side of an in-memory connection.
    pub(crate) struct FakeBot {
        stream: DuplexStream,
        decoder: FrameDecoder,
    }

    impl FakeBot {
        pub(crate) async fn send(&mut self, message: Value) {
            let bytes = encode_message(&message).unwrap();
            self.stream.write_all(&bytes).await.unwrap();
        }

        pub(crate) async fn recv(&mut self) -> Value {
            let mut chunk = [0u8; 256];
            loop {
                if let Some(message) = self.decoder.next_message().unwrap() {
                    return message;
                }
                let read = self.stream.read(&mut chunk).await.unwrap();
                assert!(read > 0, "client hung up");
                self.decoder.extend(&chunk[..read]);
            }
        }

        /// Receives one request and answers it.
        pub(crate) async fn expect(&mut self, request: Value, response: Value) {
            assert_eq!(self.recv().await, request);
            self.send(response).await;
        }
    }

    pub(crate) fn pair_with(options: SessionOptions) -> (Session<DuplexStream>, FakeBot) {
        let (client, server) = tokio::io::duplex(4096);
        (
            Session::with_options(client, options),
            FakeBot {
                stream: server,
                decoder: FrameDecoder::new(),
            },
        )
    }

    pub(crate) fn pair() -> (Session<DuplexStream>, FakeBot) {
        pair_with(SessionOptions::default())
    }

    fn command(name: &str, arg: &str) -> Value {
        json!({"event": "COMMAND", "params": ["net", "#chan", "user", name, arg]})
    }

    #[tokio::test]
    async fn event_before_response_is_dispatched_once() {
        let (mut session, mut bot) = pair();
        let seen = Arc::new(Mutex::new(Vec::new()));

        bot.send(command("echo", "hello")).await;
        bot.send(json!({"success": true})).await;
        let sink = Arc::clone(&seen);
        let id = session
            .subscribe_command(
                "echo",
                move |event, _| {
                    sink.lock().unwrap().push(event.params().to_vec());
                    Ok(())
                },
                &Scope::universal(),
            )
            .await
            .unwrap();
        assert_eq!(
            bot.recv().await,
            json!({"do": "command", "params": ["echo"]})
        );

        bot.send(command("echo", "again")).await;
        bot.send(json!({"success": true, "networks": ["net"]})).await;
        let response = session.request(&Request::get("networks")).await.unwrap();

        assert_eq!(response.get("networks"), Some(&json!(["net"])));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(id.get(), 0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0][4], json!("hello"));
        assert_eq!(seen[1][4], json!("again"));
    }

    #[tokio::test]
    async fn request_success_accepts_both_conventions() {
        let (mut session, mut bot) = pair();

        bot.send(json!({"success": true, "nick": "dazeus"})).await;
        session.request_success(&Request::get("nick")).await.unwrap();

        bot.send(json!({"nick": "dazeus"})).await;
        session.request_success(&Request::get("nick")).await.unwrap();

        bot.send(json!({"success": false, "error": "no such network"})).await;
        let err = session.request_success(&Request::get("nick")).await.unwrap_err();
        assert!(matches!(err, ClientError::Remote(ref text) if text == "no such network"));

        bot.send(json!({"error": "bad request"})).await;
        let err = session.request_success(&Request::get("nick")).await.unwrap_err();
        assert!(matches!(err, ClientError::Remote(ref text) if text == "bad request"));

        bot.send(json!({"success": false})).await;
        let err = session.request_success(&Request::get("nick")).await.unwrap_err();
        assert!(matches!(err, ClientError::UnknownRemote));

        // Remote failures leave the session usable.
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn listen_rejects_unsolicited_response() {
        let (mut session, mut bot) = pair();
        bot.send(json!({"success": true})).await;

        let err = session.listen().await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedResponse { .. }));
        assert_eq!(session.state(), SessionState::Broken);

        let err = session.request(&Request::get("networks")).await.unwrap_err();
        assert!(matches!(err, ClientError::SessionBroken));
    }

    #[tokio::test]
    async fn closed_connection_is_fatal() {
        let (mut session, bot) = pair();
        drop(bot);

        let err = session.request(&Request::get("networks")).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(session.state(), SessionState::Broken);
    }

    #[tokio::test]
    async fn cancelled_request_leaves_session_busy() {
        let (mut session, _bot) = pair();

        let networks = Request::get("networks");
        let pending = session.request(&networks);
        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());

        assert_eq!(session.state(), SessionState::AwaitingResponse);
        let err = session.request(&Request::get("networks")).await.unwrap_err();
        assert!(matches!(err, ClientError::Busy));
    }

    #[tokio::test]
    async fn failed_subscription_is_rolled_back() {
        let (mut session, mut bot) = pair();

        bot.send(json!({"success": false, "error": "denied"})).await;
        let err = session.subscribe("JOIN", |_, _| Ok(())).await.unwrap_err();
        assert!(matches!(err, ClientError::Remote(_)));
        assert!(session.listeners().is_empty());
        assert_eq!(
            bot.recv().await,
            json!({"do": "subscribe", "params": ["JOIN"]})
        );
    }

    #[tokio::test]
    async fn failed_subscription_can_be_kept() {
        let (mut session, mut bot) = pair_with(SessionOptions {
            rollback: RollbackPolicy::Keep,
            ..SessionOptions::default()
        });

        bot.send(json!({"success": false})).await;
        session.subscribe("JOIN", |_, _| Ok(())).await.unwrap_err();
        assert_eq!(session.listeners().remaining("JOIN"), 1);
    }

    #[tokio::test]
    async fn invalid_command_scope_sends_nothing() {
        let (mut session, _bot) = pair();
        let scope = Scope::network("net").with_receiver("#chan").with_sender("user");

        let err = session
            .subscribe_command("echo", |_, _| Ok(()), &scope)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidScope(_)));
        assert!(session.listeners().is_empty());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn unsubscribe_last_listener_notifies_bot() {
        let (mut session, mut bot) = pair();

        bot.send(json!({"success": true})).await;
        bot.send(json!({"success": true})).await;
        let first = session.subscribe("JOIN", |_, _| Ok(())).await.unwrap();
        let second = session.subscribe("JOIN", |_, _| Ok(())).await.unwrap();
        bot.recv().await;
        bot.recv().await;

        assert!(session.unsubscribe(first).await.unwrap());

        bot.send(json!({"success": true})).await;
        assert!(session.unsubscribe(second).await.unwrap());
        assert_eq!(
            bot.recv().await,
            json!({"do": "unsubscribe", "params": ["JOIN"]})
        );

        assert!(!session.unsubscribe(second).await.unwrap());
        assert_eq!(session.listeners().remaining("JOIN"), 0);
    }

    #[tokio::test]
    async fn command_subscription_carries_scope() {
        let (mut session, mut bot) = pair();

        bot.send(json!({"success": true})).await;
        let id = session
            .subscribe_command("echo", |_, _| Ok(()), &Scope::network("net").with_sender("user"))
            .await
            .unwrap();
        assert_eq!(
            bot.recv().await,
            json!({"do": "command", "params": ["echo", "net", true, "user"]})
        );

        // Dropping the last command listener stays local.
        assert!(session.unsubscribe(id).await.unwrap());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn deferred_requests_run_on_demand() {
        let (mut session, mut bot) = pair();

        bot.send(json!({"success": true})).await;
        session
            .subscribe("JOIN", |event, responder| {
                let channel = event.param_str(1).unwrap_or_default().to_owned();
                responder.send(Request::action("message").params(["net", channel.as_str(), "welcome"]));
                Ok(())
            })
            .await
            .unwrap();
        bot.recv().await;

        bot.send(json!({"event": "JOIN", "params": ["net", "#chan", "user"]})).await;
        bot.send(json!({"nick": "dazeus"})).await;
        session.request(&Request::get("nick").param("net")).await.unwrap();
        bot.recv().await;
        assert_eq!(session.pending_deferred(), 1);

        bot.send(json!({"success": true})).await;
        session.run_deferred().await.unwrap();
        assert_eq!(
            bot.recv().await,
            json!({"do": "message", "params": ["net", "#chan", "welcome"]})
        );
        assert_eq!(session.pending_deferred(), 0);
    }

    #[tokio::test]
    async fn debug_payloads_do_not_change_traffic() {
        let (mut session, mut bot) = pair_with(SessionOptions {
            debug_payloads: true,
            ..SessionOptions::default()
        });

        bot.send(json!({"success": true, "networks": []})).await;
        let response = session.request(&Request::get("networks")).await.unwrap();
        assert!(response.is_success());
        assert_eq!(bot.recv().await, json!({"get": "networks"}));
    }

    #[tokio::test]
    async fn listen_runs_replies_queued_during_subscribe() {
        let (mut session, mut bot) = pair();

        bot.send(command("echo", "early")).await;
        bot.send(json!({"success": true})).await;
        session
            .subscribe_command(
                "echo",
                |event, responder| {
                    let text = event.as_command().and_then(|c| c.arg(0)).unwrap_or_default();
                    responder.reply(text)?;
                    Ok(())
                },
                &Scope::universal(),
            )
            .await
            .unwrap();
        assert_eq!(session.pending_deferred(), 1);

        bot.send(json!({"success": true, "nick": "dazeus"})).await;
        bot.send(json!({"success": true})).await;
        bot.send(json!({"success": true})).await;
        let err = session.listen().await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedResponse { .. }));

        assert_eq!(bot.recv().await, json!({"do": "command", "params": ["echo"]}));
        assert_eq!(bot.recv().await, json!({"get": "nick", "params": ["net"]}));
        assert_eq!(
            bot.recv().await,
            json!({"do": "message", "params": ["net", "#chan", "early"]})
        );
        assert_eq!(session.pending_deferred(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_while_busy_keeps_listener() {
        let (mut session, mut bot) = pair();

        bot.send(json!({"success": true})).await;
        let id = session.subscribe("JOIN", |_, _| Ok(())).await.unwrap();
        bot.recv().await;

        let networks = Request::get("networks");
        let pending = session.request(&networks);
        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());

        let err = session.unsubscribe(id).await.unwrap_err();
        assert!(matches!(err, ClientError::Busy));
        assert!(session.listeners().contains(id));
    }

    #[tokio::test]
    async fn short_command_event_keeps_session_usable() {
        let (mut session, mut bot) = pair();
        let calls = Arc::new(Mutex::new(0));

        bot.send(json!({"success": true})).await;
        let sink = Arc::clone(&calls);
        session
            .subscribe_command(
                "echo",
                move |_, _| {
                    *sink.lock().unwrap() += 1;
                    Ok(())
                },
                &Scope::universal(),
            )
            .await
            .unwrap();
        bot.recv().await;

        bot.send(json!({"event": "COMMAND", "params": ["net", "#chan"]})).await;
        bot.send(json!({"success": true, "networks": ["net"]})).await;
        let response = session.request(&Request::get("networks")).await.unwrap();

        assert!(response.is_success());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(*calls.lock().unwrap(), 0);
    }
}
