//! Connection addresses and the socket they open.
//!
//! The bot listens on `unix:<path>` or `tcp:<host>:<port>`. [`Connection`]
//! wraps either stream so the session does not care which one it got.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Reasons an address string is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// No `proto:` prefix.
    #[error("expected unix:/path/to/file or tcp:host:port, got {0:?}")]
    MissingProtocol(String),

    /// Prefix other than `unix` or `tcp`.
    #[error("invalid protocol {0:?}, must use unix or tcp")]
    UnknownProtocol(String),

    /// `unix:` on a platform without Unix domain sockets.
    #[error("unix sockets are not supported on this platform")]
    UnsupportedPlatform,

    /// `tcp:` address without `:<port>`.
    #[error("no port specified for TCP socket")]
    MissingPort,

    /// Port contains something other than digits.
    #[error("port {0:?} is not numeric")]
    NonNumericPort(String),

    /// Port outside 1..=65535.
    #[error("port {0} is not in range 1-65535")]
    PortOutOfRange(String),
}

/// Where the bot listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// Unix domain socket path.
    Unix(PathBuf),
    /// TCP host and port.
    Tcp {
        /// Host name or IP address.
        host: String,
        /// Port number.
        port: u16,
    },
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(address: &str) -> Result<Self, Self::Err> {
        let (proto, location) = address
            .split_once(':')
            .ok_or_else(|| AddressError::MissingProtocol(address.to_owned()))?;

        match proto {
            "unix" if cfg!(unix) => Ok(Self::Unix(PathBuf::from(location))),
            "unix" => Err(AddressError::UnsupportedPlatform),
            "tcp" => {
                let (host, port) = location.rsplit_once(':').ok_or(AddressError::MissingPort)?;
                Ok(Self::Tcp {
                    host: host.to_owned(),
                    port: parse_port(port)?,
                })
            }
            other => Err(AddressError::UnknownProtocol(other.to_owned())),
        }
    }
}

fn parse_port(port: &str) -> Result<u16, AddressError> {
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AddressError::NonNumericPort(port.to_owned()));
    }
    match port.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(AddressError::PortOutOfRange(port.to_owned())),
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp { host, port } => write!(f, "tcp:{host}:{port}"),
        }
    }
}

impl Address {
    /// Opens a stream to the bot.
    pub async fn connect(&self) -> ClientResult<Connection> {
        debug!(address = %self, "connecting to bot");

        let connection = match self {
            Self::Tcp { host, port } => TcpStream::connect((host.as_str(), *port))
                .await
                .map(Connection::Tcp),
            #[cfg(unix)]
            Self::Unix(path) => UnixStream::connect(path).await.map(Connection::Unix),
            #[cfg(not(unix))]
            Self::Unix(_) => return Err(AddressError::UnsupportedPlatform.into()),
        };

        connection.map_err(|source| ClientError::Connect {
            address: self.to_string(),
            source,
        })
    }
}

/// An open socket to the bot.
#[derive(Debug)]
pub enum Connection {
    /// TCP stream.
    Tcp(TcpStream),
    /// Unix domain socket stream.
    #[cfg(unix)]
    Unix(UnixStream),
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(unix)]
            Self::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(unix)]
            Self::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(unix)]
            Self::Unix(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(unix)]
            Self::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_address() {
        let address: Address = "tcp:localhost:1234".parse().unwrap();
        assert_eq!(
            address,
            Address::Tcp {
                host: "localhost".into(),
                port: 1234
            }
        );
        assert_eq!(address.to_string(), "tcp:localhost:1234");
    }

    #[cfg(unix)]
    #[test]
    fn parses_unix_address() {
        let address: Address = "unix:/var/run/dazeus.sock".parse().unwrap();
        assert_eq!(address, Address::Unix(PathBuf::from("/var/run/dazeus.sock")));
        assert_eq!(address.to_string(), "unix:/var/run/dazeus.sock");
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(matches!(
            "localhost".parse::<Address>(),
            Err(AddressError::MissingProtocol(_))
        ));
        assert_eq!(
            "udp:localhost:1234".parse::<Address>(),
            Err(AddressError::UnknownProtocol("udp".into()))
        );
        assert_eq!(
            "tcp:localhost".parse::<Address>(),
            Err(AddressError::MissingPort)
        );
        assert_eq!(
            "tcp:localhost:http".parse::<Address>(),
            Err(AddressError::NonNumericPort("http".into()))
        );
        assert_eq!(
            "tcp:localhost:-1".parse::<Address>(),
            Err(AddressError::NonNumericPort("-1".into()))
        );
    }

    #[test]
    fn port_range_is_enforced() {
        assert_eq!(
            "tcp:localhost:0".parse::<Address>(),
            Err(AddressError::PortOutOfRange("0".into()))
        );
        assert_eq!(
            "tcp:localhost:65536".parse::<Address>(),
            Err(AddressError::PortOutOfRange("65536".into()))
        );
        assert!("tcp:localhost:65535".parse::<Address>().is_ok());
        assert!("tcp:localhost:1".parse::<Address>().is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn connect_failure_names_the_address() {
        let dir = tempfile::tempdir().unwrap();
        let address = Address::Unix(dir.path().join("missing.sock"));
        let err = address.connect().await.unwrap_err();
        assert!(matches!(err, ClientError::Connect { .. }));
        assert!(err.to_string().contains("missing.sock"));
    }
}
