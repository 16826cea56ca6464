//! Command-line interface definition.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

use crate::api::ReplyKind;

/// dazeus - talk to a DaZeus bot from the command line
#[derive(Debug, Parser)]
#[command(name = "dazeus")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "DAZEUS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output (debug logging and raw payloads)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Address of the bot: `unix:/path/to/file` or `tcp:host:port`
    #[arg(long, short, env = "DAZEUS_ADDRESS")]
    pub address: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the echo plugin: answer a command with its arguments
    Echo {
        /// Command to answer (default from config, else `echo`)
        #[arg(long)]
        command: Option<String>,

        /// Only answer on this network
        #[arg(long)]
        network: Option<String>,

        /// Prefix replies in channels with the sender's nick
        #[arg(long)]
        highlight: bool,
    },

    /// List the networks the bot is connected to
    Networks,

    /// List the channels joined on a network
    Channels {
        /// Network name
        network: String,
    },

    /// Show the bot's nick on a network
    Nick {
        /// Network name
        network: String,
    },

    /// Send a message
    #[command(group(ArgGroup::new("kind").args(["notice", "action"])))]
    Say {
        /// Network name
        network: String,
        /// Channel or nick
        channel: String,
        /// Message text
        message: String,
        /// Send as a notice
        #[arg(long)]
        notice: bool,
        /// Send as an action
        #[arg(long)]
        action: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

impl Command {
    /// Delivery kind selected by `say` flags.
    pub fn say_kind(notice: bool, action: bool) -> ReplyKind {
        if notice {
            ReplyKind::Notice
        } else if action {
            ReplyKind::Action
        } else {
            ReplyKind::Message
        }
    }
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Show configuration file path
    Path,
}
