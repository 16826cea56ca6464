//! Plugin-side session for the DaZeus IRC bot.
//!
//! A [`Session`] owns one connection to the bot. It sends requests, waits for
//! their responses and dispatches the events that arrive in between to the
//! handlers registered with [`Session::subscribe`] and
//! [`Session::subscribe_command`].
//!
//! # Example
//!
//! ```rust,no_run
//! use dazeus_client::{Address, Scope, Session, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let address: Address = "unix:/run/dazeus/dazeus.sock".parse()?;
//!     let mut session = Session::connect(&address, SessionOptions::default()).await?;
//!
//!     session
//!         .subscribe_command(
//!             "ping",
//!             |_, responder| {
//!                 responder.reply("pong")?;
//!                 Ok(())
//!             },
//!             &Scope::universal(),
//!         )
//!         .await?;
//!     session.listen().await?;
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod listener;
pub mod session;
pub mod tracing;

pub use address::{Address, AddressError, Connection};
pub use api::ReplyKind;
pub use cli::Cli;
pub use config::ClientConfig;
pub use dazeus_protocol::{CommandEvent, Event, Request, Response, Scope, ScopeError};
pub use error::{ClientError, ClientResult};
pub use listener::{
    Deferred, DispatchReport, HandlerError, HandlerResult, ListenerId, ListenerRegistry,
    ReplyTarget, Responder,
};
pub use session::{RollbackPolicy, Session, SessionOptions, SessionState};
