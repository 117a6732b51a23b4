//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "MAILGATE_CONFIG";

/// Default configuration file name inside the config directory.
pub const CONFIG_FILE: &str = "serverInfo.json";

/// Webmail session layer on the command line.
#[derive(Debug, Parser)]
#[command(name = "mailgate", version, about)]
pub struct Cli {
    /// Server configuration file
    #[arg(short, long, value_name = "FILE", env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available operations.
#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// List all mailboxes, parents before children
    Mailboxes,

    /// List the messages in a mailbox
    Messages {
        /// Mailbox path, e.g. INBOX/Archive
        mailbox: String,
    },

    /// Print the plain-text body of a message
    Body {
        /// Mailbox path
        mailbox: String,
        /// Message UID
        uid: u32,
    },

    /// Delete a message and expunge it
    Delete {
        /// Mailbox path
        mailbox: String,
        /// Message UID
        uid: u32,
    },

    /// Send a plain-text message
    Send {
        /// Recipients, comma-separated
        #[arg(long)]
        to: String,
        /// Sender address (defaults to the SMTP user)
        #[arg(long)]
        from: Option<String>,
        /// Subject line
        #[arg(long, default_value = "")]
        subject: String,
        /// Message text
        #[arg(long, default_value = "")]
        text: String,
    },
}

impl Cli {
    /// The configuration file to load.
    ///
    /// An explicit `--config` (or `MAILGATE_CONFIG`) wins; otherwise the
    /// file is looked up in the user's config directory.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| dirs::config_dir().map(|dir| dir.join("mailgate").join(CONFIG_FILE)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_messages() {
        let cli = Cli::try_parse_from(["mailgate", "messages", "INBOX/Archive"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Messages {
                mailbox: "INBOX/Archive".into()
            }
        );
    }

    #[test]
    fn test_parse_body_uid() {
        let cli = Cli::try_parse_from(["mailgate", "body", "INBOX", "42"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Body {
                mailbox: "INBOX".into(),
                uid: 42
            }
        );
        assert!(Cli::try_parse_from(["mailgate", "body", "INBOX", "abc"]).is_err());
    }

    #[test]
    fn test_parse_send() {
        let cli = Cli::try_parse_from([
            "mailgate",
            "send",
            "--to",
            "bob@example.com",
            "--subject",
            "Hi",
        ])
        .unwrap();
        let Command::Send {
            to,
            from,
            subject,
            text,
        } = cli.command
        else {
            panic!("expected send");
        };
        assert_eq!(to, "bob@example.com");
        assert_eq!(from, None);
        assert_eq!(subject, "Hi");
        assert_eq!(text, "");
    }

    #[test]
    fn test_explicit_config_path() {
        let cli =
            Cli::try_parse_from(["mailgate", "--config", "/etc/mail.json", "mailboxes"]).unwrap();
        assert_eq!(cli.config_path(), Some(PathBuf::from("/etc/mail.json")));
    }

    #[test]
    fn test_default_config_path() {
        let cli = Cli {
            config: None,
            command: Command::Mailboxes,
        };
        if let Some(path) = cli.config_path() {
            assert!(path.ends_with("mailgate/serverInfo.json"));
        }
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
