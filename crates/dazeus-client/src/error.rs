//! Client error types.

use std::io;

use dazeus_protocol::{ProtocolError, ScopeError};
use thiserror::Error;

use crate::address::AddressError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the bot.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Malformed or unsupported connection address.
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),

    /// Could not open the socket.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The connection broke mid-read or mid-write.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// The bot closed the connection.
    #[error("connection closed by the bot ({buffered} bytes of partial frame buffered)")]
    ConnectionClosed { buffered: usize },

    /// Framing lost or undecodable message.
    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    /// The bot reported that the operation failed.
    #[error("remote error: {0}")]
    Remote(String),

    /// The bot reported failure without saying why.
    #[error("an unknown error occurred")]
    UnknownRemote,

    /// A response arrived while no request was outstanding.
    #[error("got response to unsent request: {response}")]
    UnexpectedResponse { response: String },

    /// Scope rejected before anything was sent.
    #[error("invalid scope: {0}")]
    InvalidScope(#[from] ScopeError),

    /// A request was issued while another one is still awaiting its response.
    #[error("a request is already awaiting its response on this session")]
    Busy,

    /// A previous transport or protocol failure left the session unusable.
    #[error("session is broken by an earlier failure")]
    SessionBroken,

    /// A successful response lacked the field the operation returns.
    #[error("response is missing field `{field}`")]
    MissingField { field: &'static str },

    /// A response field had an unexpected type.
    #[error("response field `{field}` has unexpected type: {source}")]
    FieldType {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A handler tried to reply to an event that carries no addressing.
    #[error("cannot reply to {event} event: no network/channel/sender")]
    NoReplyTarget { event: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the connection can no longer be used after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::Transport(_)
                | Self::ConnectionClosed { .. }
                | Self::Protocol(_)
                | Self::UnexpectedResponse { .. }
                | Self::Busy
                | Self::SessionBroken
        )
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(err) => Self::Transport(err),
            ProtocolError::ConnectionClosed { buffered } => Self::ConnectionClosed { buffered },
            other => Self::Protocol(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_io_errors_become_transport_errors() {
        let err = ClientError::from(ProtocolError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(matches!(err, ClientError::Transport(_)));
        assert!(err.is_fatal());

        let err = ClientError::from(ProtocolError::ConnectionClosed { buffered: 3 });
        assert!(matches!(err, ClientError::ConnectionClosed { buffered: 3 }));
    }

    #[test]
    fn remote_errors_are_recoverable() {
        assert!(!ClientError::Remote("no such channel".into()).is_fatal());
        assert!(!ClientError::UnknownRemote.is_fatal());
        assert!(!ClientError::InvalidScope(ScopeError::SenderAndReceiver).is_fatal());
        assert_eq!(
            ClientError::Remote("no such channel".into()).to_string(),
            "remote error: no such channel"
        );
    }
}
