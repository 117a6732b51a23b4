//! `mailgate` - command-line front end for the webmail session layer.
//!
//! Each invocation performs one mail operation against the configured
//! IMAP/SMTP servers and prints the result as JSON.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use mailgate_core::{MailService, OutgoingMessage, ServerConfig};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailgate=info,mailgate_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let path = cli
        .config_path()
        .context("no configuration file given and no config directory found")?;
    let config = ServerConfig::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    info!(path = %path.display(), imap = %config.imap.host, "Configuration loaded");

    run(MailService::new(config), cli.command).await
}

async fn run(service: MailService, command: Command) -> Result<()> {
    match command {
        Command::Mailboxes => print_json(&service.list_mailboxes().await?),
        Command::Messages { mailbox } => print_json(&service.list_messages(&mailbox).await?),
        Command::Body { mailbox, uid } => {
            print_json(&service.get_message_body(&mailbox, uid).await?)
        }
        Command::Delete { mailbox, uid } => {
            service.delete_message(&mailbox, uid).await?;
            println!("ok");
            Ok(())
        }
        Command::Send {
            to,
            from,
            subject,
            text,
        } => {
            let from = from.unwrap_or_else(|| service.config().smtp.auth.user.clone());
            let message = OutgoingMessage::new(from, to, subject, text);
            service.send_message(&message).await?;
            println!("ok");
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
