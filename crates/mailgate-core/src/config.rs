//! Server configuration.
//!
//! The configuration is read once at start-up, typically from a
//! `serverInfo.json` file of the form
//!
//! ```json
//! {
//!   "smtp": { "host": "smtp.example.com", "port": 465, "auth": { "user": "me", "pass": "secret" } },
//!   "imap": { "host": "imap.example.com", "port": 993, "auth": { "user": "me", "pass": "secret" } }
//! }
//! ```
//!
//! and then shared read-only by every session.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Security/encryption mode for connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// Implicit TLS (connect directly with TLS).
    Tls,
    /// STARTTLS upgrade after plaintext connect; fails if the server
    /// refuses it.
    StartTls,
    /// STARTTLS when the server accepts it, plaintext otherwise.
    ///
    /// Used when no mode is configured and the port is not a TLS port.
    Opportunistic,
}

impl Security {
    /// Infer the security mode from a well-known port.
    ///
    /// 993 (IMAPS) and 465 (SMTPS) use implicit TLS. Anything else tries
    /// STARTTLS and stays plaintext when the server does not offer it.
    #[must_use]
    pub const fn for_port(port: u16) -> Self {
        match port {
            993 | 465 => Self::Tls,
            _ => Self::Opportunistic,
        }
    }

    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::Tls => "SSL/TLS",
            Self::StartTls => "STARTTLS",
            Self::Opportunistic => "STARTTLS if available",
        }
    }
}

/// Login credentials for one server.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Username for authentication.
    pub user: String,
    /// Password for authentication.
    pub pass: String,
}

impl Credentials {
    /// Creates credentials from a user name and password.
    #[must_use]
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

/// Connection settings for a single IMAP or SMTP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Credentials used right after connecting.
    pub auth: Credentials,
    /// Security mode. Inferred from the port when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Security>,
    /// Skip certificate validation for this server only.
    ///
    /// Needed for servers with self-signed certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl ServerEndpoint {
    /// Creates an endpoint with the security mode inferred from the port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, auth: Credentials) -> Self {
        Self {
            host: host.into(),
            port,
            auth,
            security: None,
            accept_invalid_certs: false,
        }
    }

    /// Sets an explicit security mode.
    #[must_use]
    pub const fn with_security(mut self, security: Security) -> Self {
        self.security = Some(security);
        self
    }

    /// Disables certificate validation for this endpoint.
    #[must_use]
    pub const fn accepting_invalid_certs(mut self) -> Self {
        self.accept_invalid_certs = true;
        self
    }

    /// The effective security mode.
    #[must_use]
    pub fn security(&self) -> Security {
        self.security.unwrap_or_else(|| Security::for_port(self.port))
    }
}

/// The complete, immutable server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Outgoing mail server.
    pub smtp: ServerEndpoint,
    /// Incoming mail server.
    pub imap: ServerEndpoint,
}

impl ServerConfig {
    /// Parses and validates a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a field is invalid.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its content is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&json)?;
        tracing::debug!(
            path = %path.display(),
            imap = %format_args!("{}:{}", config.imap.host, config.imap.port),
            smtp = %format_args!("{}:{}", config.smtp.host, config.smtp.port),
            "Loaded server configuration"
        );
        Ok(config)
    }

    /// Checks that both endpoints are usable.
    ///
    /// Returns every problem found rather than stopping at the first.
    ///
    /// # Errors
    ///
    /// Returns a vector of `ValidationError` if any fields are invalid.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.imap.host.trim().is_empty() {
            errors.push(ValidationError::EmptyImapHost);
        }
        if self.imap.port == 0 {
            errors.push(ValidationError::InvalidImapPort);
        }
        if self.imap.auth.user.trim().is_empty() {
            errors.push(ValidationError::EmptyImapUser);
        }

        if self.smtp.host.trim().is_empty() {
            errors.push(ValidationError::EmptySmtpHost);
        }
        if self.smtp.port == 0 {
            errors.push(ValidationError::InvalidSmtpPort);
        }
        if self.smtp.auth.user.trim().is_empty() {
            errors.push(ValidationError::EmptySmtpUser);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Validation error for server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// IMAP host is empty.
    EmptyImapHost,
    /// IMAP port is invalid.
    InvalidImapPort,
    /// IMAP user is empty.
    EmptyImapUser,
    /// SMTP host is empty.
    EmptySmtpHost,
    /// SMTP port is invalid.
    InvalidSmtpPort,
    /// SMTP user is empty.
    EmptySmtpUser,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyImapHost => "IMAP host is required",
            Self::InvalidImapPort => "IMAP port must be 1-65535",
            Self::EmptyImapUser => "IMAP user is required",
            Self::EmptySmtpHost => "SMTP host is required",
            Self::InvalidSmtpPort => "SMTP port must be 1-65535",
            Self::EmptySmtpUser => "SMTP user is required",
        }
    }

    /// Get the configuration key this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyImapHost => "imap.host",
            Self::InvalidImapPort => "imap.port",
            Self::EmptyImapUser => "imap.auth.user",
            Self::EmptySmtpHost => "smtp.host",
            Self::InvalidSmtpPort => "smtp.port",
            Self::EmptySmtpUser => "smtp.auth.user",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field(), self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while loading the server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The configuration is not valid JSON of the expected shape.
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// One or more fields failed validation.
    #[error("invalid configuration: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
