//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while framing or interpreting messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The length prefix started with a byte that is neither a digit nor a
    /// line delimiter.
    #[error("frame desynchronized: unexpected byte 0x{byte:02x} at offset {offset}")]
    Desynchronized { byte: u8, offset: usize },

    /// Declared frame length exceeds the accepted maximum.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Frame payload is not valid JSON, or a message failed to serialize.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload is valid JSON but not a JSON object.
    #[error("expected a JSON object, got: {0}")]
    NotAnObject(String),

    /// Event message with missing or mistyped fields.
    #[error("malformed {event} event: {reason}")]
    MalformedEvent { event: String, reason: String },

    /// IO error during read/write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the stream.
    #[error("connection closed by peer ({buffered} bytes of partial frame buffered)")]
    ConnectionClosed { buffered: usize },
}

/// Scope combinations rejected before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// Command subscriptions can target a receiver or a sender, not both.
    #[error("cannot use scope with both sender and receiver for subscribing to commands")]
    SenderAndReceiver,

    /// The operation needs a concrete network, channel or user.
    #[error("refusing to {operation} for universal scope")]
    Universal { operation: &'static str },
}
