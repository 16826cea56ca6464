//! Wire framing, message shapes and scope encoding for the DaZeus protocol.
//!
//! DaZeus plugins talk to the bot over a single Unix or TCP socket. The same
//! stream carries responses to plugin requests and unsolicited events such as
//! channel messages or command invocations.
//!
//! # Protocol Overview
//!
//! Messages are sent as length-prefixed JSON:
//! - an ASCII decimal byte count (optionally surrounded by `\r`/`\n`)
//! - exactly that many bytes of UTF-8 JSON
//!
//! ```text
//! 18{"get":"networks"}
//! ```
//!
//! # Example
//!
//! ```rust
//! use dazeus_protocol::{FrameDecoder, Request, encode_message};
//!
//! let bytes = encode_message(&Request::get("networks")).unwrap();
//! assert_eq!(bytes, b"18{\"get\":\"networks\"}");
//!
//! let mut decoder = FrameDecoder::new();
//! decoder.extend(&bytes);
//! let value = decoder.next_message().unwrap().unwrap();
//! assert_eq!(value["get"], "networks");
//! ```

mod error;
mod framing;
mod message;
mod scope;

pub use error::{ProtocolError, ProtocolResult, ScopeError};
pub use framing::{
    FrameDecoder, FrameReader, FrameSpan, FrameWriter, encode_message, try_extract_frame,
};
pub use message::{CommandEvent, Event, Message, RawEvent, Request, RequestKind, Response};
pub use scope::Scope;

/// Event type carried by command invocations.
pub const COMMAND_EVENT: &str = "COMMAND";

/// Maximum accepted payload size (16 MiB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
