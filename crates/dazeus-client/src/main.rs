//! dazeus CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use dazeus_client::cli::{Cli, Command, ConfigAction};
use dazeus_client::commands::{self, echo, query};
use dazeus_client::config::ClientConfig;
use dazeus_client::error::{ClientError, ClientResult};
use dazeus_client::tracing::{TracingConfig, init_tracing};
use dazeus_client::{Address, Session};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match load_config(&cli) {
        Ok(config) => {
            let preset = if cli.verbose {
                TracingConfig::cli_debug()
            } else {
                TracingConfig::plugin()
            };
            let tracing_config = preset
                .with_format(config.log.format)
                .with_filter(config.log.filter.clone());
            if let Err(e) = init_tracing(&tracing_config) {
                eprintln!("warning: {}", e);
            }
            run(cli, config).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> ClientResult<ClientConfig> {
    let mut config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };
    if cli.verbose {
        config.debug = true;
    }
    if let Some(ref address) = cli.address {
        config.address = Some(address.clone());
    }
    Ok(config)
}

async fn run(cli: Cli, config: ClientConfig) -> ClientResult<()> {
    let command = match cli.command {
        Command::Config { action } => {
            return match action {
                ConfigAction::Dump => commands::config::dump(&config),
                ConfigAction::Path => commands::config::path(),
            };
        }
        command => command,
    };

    let address: Address = config
        .address
        .as_deref()
        .ok_or_else(|| {
            ClientError::config("no bot address: pass --address or set `address` in config.toml")
        })?
        .parse()?;
    let mut session = Session::connect(&address, config.session_options()).await?;

    match command {
        Command::Echo {
            command,
            network,
            highlight,
        } => {
            let mut settings = config.echo.clone();
            if let Some(command) = command {
                settings.command = command;
            }
            if network.is_some() {
                settings.network = network;
            }
            settings.highlight |= highlight;

            let never = echo::run(&mut session, &settings).await?;
            match never {}
        }
        Command::Networks => query::networks(&mut session).await?,
        Command::Channels { network } => query::channels(&mut session, &network).await?,
        Command::Nick { network } => query::nick(&mut session, &network).await?,
        Command::Say {
            network,
            channel,
            message,
            notice,
            action,
        } => {
            let kind = Command::say_kind(notice, action);
            query::say(&mut session, &network, &channel, &message, kind).await?;
        }
        Command::Config { .. } => {}
    }

    session.close().await
}
