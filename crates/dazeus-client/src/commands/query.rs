//! One-shot requests printed to stdout.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::api::ReplyKind;
use crate::error::{ClientError, ClientResult};
use crate::session::Session;

/// Print the networks the bot is connected to.
pub async fn networks<S>(session: &mut Session<S>) -> ClientResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    for network in session.networks().await? {
        println!("{}", network);
    }
    Ok(())
}

/// Print the channels joined on a network.
pub async fn channels<S>(session: &mut Session<S>, network: &str) -> ClientResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    for channel in session.channels(network).await? {
        println!("{}", channel);
    }
    Ok(())
}

/// Print the bot's nick on a network.
pub async fn nick<S>(session: &mut Session<S>, network: &str) -> ClientResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    println!("{}", session.nick(network).await?);
    Ok(())
}

/// Send a message, notice or action.
pub async fn say<S>(
    session: &mut Session<S>,
    network: &str,
    channel: &str,
    message: &str,
    kind: ReplyKind,
) -> ClientResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let sent = match kind {
        ReplyKind::Notice => session.notice(network, channel, message).await?,
        ReplyKind::Action => session.action(network, channel, message).await?,
        ReplyKind::Ctcp => session.ctcp(network, channel, message).await?,
        ReplyKind::Message => session.message(network, channel, message).await?,
    };
    if !sent {
        return Err(ClientError::UnknownRemote);
    }
    Ok(())
}
