//! The echo plugin: answers a command with whatever followed it.

use std::convert::Infallible;

use dazeus_protocol::{Event, Scope};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::api::ReplyKind;
use crate::config::EchoSettings;
use crate::error::ClientResult;
use crate::listener::{HandlerResult, Responder};
use crate::session::Session;

/// Handler replying with the first command argument.
pub fn echo_handler(
    highlight: bool,
) -> impl FnMut(&Event, &mut Responder<'_>) -> HandlerResult + Send + 'static {
    move |event, responder| {
        let Some(text) = event.as_command().and_then(|command| command.arg(0)) else {
            debug!(event = event.name(), "nothing to echo");
            return Ok(());
        };
        responder.reply_with(text, highlight, ReplyKind::Message)?;
        Ok(())
    }
}

/// Subscribes the echo command and listens until the connection fails.
pub async fn run<S>(session: &mut Session<S>, settings: &EchoSettings) -> ClientResult<Infallible>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let scope = match settings.network {
        Some(ref network) => Scope::network(network.as_str()),
        None => Scope::universal(),
    };

    session
        .subscribe_command(&settings.command, echo_handler(settings.highlight), &scope)
        .await?;
    info!(command = %settings.command, "echo plugin ready");

    session.listen().await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ClientError;
    use crate::session::tests::pair;

    #[tokio::test]
    async fn echoes_first_argument() {
        let (mut session, mut bot) = pair();
        let settings = EchoSettings {
            command: "say".into(),
            network: Some("oftc".into()),
            highlight: true,
        };

        bot.send(json!({"success": true})).await;
        bot.send(json!({"event": "COMMAND", "params": ["oftc", "#dazeus", "someone", "say", "hello world"]}))
            .await;
        bot.send(json!({"event": "COMMAND", "params": ["oftc", "#dazeus", "someone", "say"]}))
            .await;
        bot.send(json!({"success": true, "nick": "dazeus"})).await;
        bot.send(json!({"success": true})).await;
        bot.send(json!({"success": true})).await;

        let err = run(&mut session, &settings).await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedResponse { .. }));

        assert_eq!(
            bot.recv().await,
            json!({"do": "command", "params": ["say", "oftc"]})
        );
        assert_eq!(bot.recv().await, json!({"get": "nick", "params": ["oftc"]}));
        assert_eq!(
            bot.recv().await,
            json!({"do": "message", "params": ["oftc", "#dazeus", "someone: hello world"]})
        );
    }
}
