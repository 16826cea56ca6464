//! Decimal length-prefixed message framing.
//!
//! Every message is the ASCII decimal byte count of its JSON payload followed
//! by the payload itself:
//!
//! ```text
//! +--------------------+---------------+-------------------+
//! | length (ASCII dec) | \r / \n (opt) |  JSON payload     |
//! +--------------------+---------------+-------------------+
//! ```
//!
//! The bot separates frames with newlines, so delimiter bytes are skipped
//! wherever they show up inside the prefix. Nothing is written between frames
//! on the way out.

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Bytes requested from the transport per read.
const READ_CHUNK: usize = 1024;

/// Location of a complete payload inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpan {
    /// Offset of the first payload byte (the length of the prefix).
    pub offset: usize,
    /// Payload length in bytes.
    pub len: usize,
}

impl FrameSpan {
    /// Offset just past the end of the frame.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

const fn is_delimiter(byte: u8) -> bool {
    byte == b'\n' || byte == b'\r'
}

/// Looks for a complete frame at the start of `buffer`.
///
/// Returns `Ok(None)` when more bytes are needed. A declared length of zero
/// never completes a frame. A byte that is neither a digit nor a delimiter
/// before any digit has been read means the stream lost its framing.
///
/// # Example
///
/// ```rust
/// use dazeus_protocol::{FrameSpan, try_extract_frame};
///
/// let span = try_extract_frame(b"\n2{}").unwrap();
/// assert_eq!(span, Some(FrameSpan { offset: 2, len: 2 }));
/// assert_eq!(try_extract_frame(b"5{}").unwrap(), None);
/// ```
pub fn try_extract_frame(buffer: &[u8]) -> ProtocolResult<Option<FrameSpan>> {
    let mut offset = 0;
    let mut len: usize = 0;
    let mut seen_digit = false;

    while let Some(&byte) = buffer.get(offset) {
        if byte.is_ascii_digit() {
            len = len
                .checked_mul(10)
                .and_then(|l| l.checked_add(usize::from(byte - b'0')))
                .filter(|l| *l <= MAX_MESSAGE_SIZE)
                .ok_or(ProtocolError::MessageTooLarge {
                    size: len.saturating_mul(10),
                    max: MAX_MESSAGE_SIZE,
                })?;
            seen_digit = true;
        } else if !is_delimiter(byte) {
            if !seen_digit {
                return Err(ProtocolError::Desynchronized { byte, offset });
            }
            break;
        }
        offset += 1;
    }

    let span = FrameSpan { offset, len };
    if len > 0 && buffer.len() >= span.end() {
        Ok(Some(span))
    } else {
        Ok(None)
    }
}

/// Encodes a message as a complete frame.
///
/// # Example
///
/// ```rust
/// use dazeus_protocol::encode_message;
///
/// let bytes = encode_message(&serde_json::json!({"do": "join"})).unwrap();
/// assert_eq!(bytes, b"13{\"do\":\"join\"}");
/// ```
pub fn encode_message<T: Serialize + ?Sized>(message: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;

    if json.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: json.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    let prefix = json.len().to_string();
    let mut buffer = Vec::with_capacity(prefix.len() + json.len());
    buffer.extend_from_slice(prefix.as_bytes());
    buffer.extend_from_slice(&json);
    Ok(buffer)
}

/// Accumulates raw bytes and hands out complete messages.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes received from the transport.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes held that do not yet form a complete frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decodes the next complete message, consuming its bytes.
    ///
    /// Returns `Ok(None)` if the buffer does not hold a full frame yet.
    pub fn next_message(&mut self) -> ProtocolResult<Option<Value>> {
        let Some(span) = try_extract_frame(&self.buffer)? else {
            return Ok(None);
        };

        let parsed = serde_json::from_slice(&self.buffer[span.offset..span.end()]);
        // The frame is dropped even when it does not parse so the stream
        // stays aligned on the next prefix.
        self.buffer.drain(..span.end());
        Ok(Some(parsed?))
    }
}

/// Reads framed messages from a byte stream.
pub struct FrameReader<R> {
    reader: R,
    decoder: FrameDecoder,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Creates a new FrameReader wrapping the given reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoder: FrameDecoder::new(),
        }
    }

    /// Reads a single message, waiting for more bytes as needed.
    ///
    /// End of stream is an error: the protocol has no clean shutdown.
    pub async fn read_message(&mut self) -> ProtocolResult<Value> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(message) = self.decoder.next_message()? {
                return Ok(message);
            }

            let read = self.reader.read(&mut chunk).await?;
            if read == 0 {
                return Err(ProtocolError::ConnectionClosed {
                    buffered: self.decoder.buffered(),
                });
            }
            self.decoder.extend(&chunk[..read]);
        }
    }

    /// Returns a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Unwraps this FrameReader, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Writes framed messages to a byte stream.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Creates a new FrameWriter wrapping the given writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes and flushes a single framed message.
    pub async fn write_message<T: Serialize + ?Sized>(&mut self, message: &T) -> ProtocolResult<()> {
        let data = encode_message(message)?;
        self.writer.write_all(&data).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Shuts down the write side of the stream.
    pub async fn shutdown(&mut self) -> ProtocolResult<()> {
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Returns a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Unwraps this FrameWriter, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
