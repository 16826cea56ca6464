//! Typed wrappers for the bot's requests.
//!
//! Each method sends one request through [`Session::request_success`] and
//! unwraps one response field.

use dazeus_protocol::{Request, Response, Scope, ScopeError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{ClientError, ClientResult};
use crate::listener::ReplyTarget;
use crate::session::Session;

/// How a reply is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplyKind {
    /// Regular message.
    #[default]
    Message,
    /// Notice.
    Notice,
    /// CTCP reply.
    Ctcp,
    /// Action (`/me`).
    Action,
}

fn field<T: DeserializeOwned>(response: &mut Response, field: &'static str) -> ClientResult<T> {
    let value = response
        .take(field)
        .ok_or(ClientError::MissingField { field })?;
    serde_json::from_value(value).map_err(|source| ClientError::FieldType { field, source })
}

/// Value of the `success` flag; bots that only report errors imply `true`.
fn success_flag(response: &Response) -> bool {
    response
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(true)
}

fn require_scope(scope: &Scope, operation: &'static str) -> ClientResult<()> {
    if scope.is_universal() {
        return Err(ScopeError::Universal { operation }.into());
    }
    Ok(())
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    async fn flag(&mut self, request: Request) -> ClientResult<bool> {
        let response = self.request_success(&request).await?;
        Ok(success_flag(&response))
    }

    async fn say(
        &mut self,
        verb: &str,
        network: &str,
        channel: &str,
        message: &str,
    ) -> ClientResult<bool> {
        self.flag(Request::action(verb).params([network, channel, message]))
            .await
    }

    /// Networks the bot is connected to.
    pub async fn networks(&mut self) -> ClientResult<Vec<String>> {
        let mut response = self.request_success(&Request::get("networks")).await?;
        field(&mut response, "networks")
    }

    /// Channels the bot has joined on a network.
    pub async fn channels(&mut self, network: &str) -> ClientResult<Vec<String>> {
        let request = Request::get("channels").param(network);
        let mut response = self.request_success(&request).await?;
        field(&mut response, "channels")
    }

    /// Joins a channel.
    pub async fn join(&mut self, network: &str, channel: &str) -> ClientResult<bool> {
        self.flag(Request::action("join").params([network, channel]))
            .await
    }

    /// Leaves a channel.
    pub async fn part(&mut self, network: &str, channel: &str) -> ClientResult<bool> {
        self.flag(Request::action("part").params([network, channel]))
            .await
    }

    /// Sends a message to a channel or user.
    pub async fn message(&mut self, network: &str, channel: &str, message: &str) -> ClientResult<bool> {
        self.say("message", network, channel, message).await
    }

    /// Sends an action (`/me`).
    pub async fn action(&mut self, network: &str, channel: &str, message: &str) -> ClientResult<bool> {
        self.say("action", network, channel, message).await
    }

    /// Sends a notice.
    pub async fn notice(&mut self, network: &str, channel: &str, message: &str) -> ClientResult<bool> {
        self.say("notice", network, channel, message).await
    }

    /// Sends a CTCP request.
    pub async fn ctcp(&mut self, network: &str, channel: &str, message: &str) -> ClientResult<bool> {
        self.say("ctcp", network, channel, message).await
    }

    /// Sends a CTCP reply.
    pub async fn ctcp_reply(
        &mut self,
        network: &str,
        channel: &str,
        message: &str,
    ) -> ClientResult<bool> {
        self.say("ctcp_rep", network, channel, message).await
    }

    /// The bot's nick on a network.
    pub async fn nick(&mut self, network: &str) -> ClientResult<String> {
        let request = Request::get("nick").param(network);
        let mut response = self.request_success(&request).await?;
        field(&mut response, "nick")
    }

    /// Reads a configuration value. `group` is usually `plugin` or `core`.
    pub async fn get_config(&mut self, key: &str, group: &str) -> ClientResult<Value> {
        let request = Request::get("config").params([group, key]);
        let mut response = self.request_success(&request).await?;
        field(&mut response, "value")
    }

    /// Reads a value from this plugin's configuration group.
    pub async fn plugin_config(&mut self, key: &str) -> ClientResult<Value> {
        self.get_config(key, "plugin").await
    }

    /// Character that prefixes commands.
    pub async fn highlight_character(&mut self) -> ClientResult<Value> {
        self.get_config("highlight", "core").await
    }

    /// Reads a property. `None` if it is not set.
    pub async fn get_property(&mut self, name: &str, scope: &Scope) -> ClientResult<Option<Value>> {
        let request = Request::action("property")
            .params(["get", name])
            .with_scope(scope);
        let mut response = self.request_success(&request).await?;
        Ok(response.take("value").filter(|value| !value.is_null()))
    }

    /// Stores a property.
    pub async fn set_property(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        scope: &Scope,
    ) -> ClientResult<bool> {
        let request = Request::action("property")
            .params(["set", name])
            .param(value)
            .with_scope(scope);
        self.flag(request).await
    }

    /// Removes a property.
    pub async fn unset_property(&mut self, name: &str, scope: &Scope) -> ClientResult<bool> {
        let request = Request::action("property")
            .params(["unset", name])
            .with_scope(scope);
        self.flag(request).await
    }

    /// Property names starting with `prefix`.
    pub async fn property_keys(&mut self, prefix: &str, scope: &Scope) -> ClientResult<Vec<String>> {
        let request = Request::action("property")
            .params(["keys", prefix])
            .with_scope(scope);
        let mut response = self.request_success(&request).await?;
        field(&mut response, "keys")
    }

    /// Checks a permission, falling back to `default` when none is stored.
    pub async fn has_permission(
        &mut self,
        permission: &str,
        scope: &Scope,
        default: bool,
    ) -> ClientResult<bool> {
        require_scope(scope, "check permission")?;
        let request = Request::action("permission")
            .params(["has", permission])
            .param(default)
            .with_scope(scope);
        let mut response = self.request_success(&request).await?;
        field(&mut response, "has_permission")
    }

    /// Grants or denies a permission.
    pub async fn set_permission(
        &mut self,
        permission: &str,
        scope: &Scope,
        allow: bool,
    ) -> ClientResult<bool> {
        require_scope(scope, "set permission")?;
        let request = Request::action("permission")
            .params(["set", permission])
            .param(allow)
            .with_scope(scope);
        self.flag(request).await
    }

    /// Removes a stored permission.
    pub async fn unset_permission(&mut self, permission: &str, scope: &Scope) -> ClientResult<bool> {
        require_scope(scope, "remove permission")?;
        let request = Request::action("permission")
            .params(["unset", permission])
            .with_scope(scope);
        self.flag(request).await
    }

    /// Answers whoever caused an event.
    ///
    /// Private messages (sent to the bot's own nick) are answered to the
    /// sender. In channels the sender's nick is prepended when `highlight`
    /// is set.
    pub async fn reply(
        &mut self,
        target: &ReplyTarget,
        message: &str,
        highlight: bool,
        kind: ReplyKind,
    ) -> ClientResult<bool> {
        let nick = self.nick(&target.network).await?;

        let (destination, text) = if target.channel == nick {
            (target.sender.as_str(), message.to_owned())
        } else if highlight {
            (target.channel.as_str(), format!("{}: {message}", target.sender))
        } else {
            (target.channel.as_str(), message.to_owned())
        };

        let verb = match kind {
            ReplyKind::Message => "message",
            ReplyKind::Notice => "notice",
            ReplyKind::Ctcp => "ctcp_rep",
            ReplyKind::Action => "action",
        };
        self.say(verb, &target.network, destination, &text).await
    }
}
