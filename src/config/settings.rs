//! Configuration settings for the mail gateway.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::auth::SharedSecret;
use crate::error::{GatewayError, GatewayResult};

/// Main configuration structure for the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub email: EmailConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Security configuration.
#[derive(Clone, Deserialize)]
pub struct SecurityConfig {
    /// Inline shared secret used to verify request signatures.
    #[serde(default)]
    pub api_secret: Option<String>,
    /// Path to a file holding the shared secret.
    #[serde(default)]
    pub api_secret_path: Option<PathBuf>,
    /// Largest request body accepted by `POST /send`.
    #[serde(default = "default_max_payload")]
    pub max_email_payload_bytes: usize,
}

// Hand-written so the secret can never reach a log line through `{:?}`.
impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("api_secret", &self.api_secret.as_ref().map(|_| "[REDACTED]"))
            .field("api_secret_path", &self.api_secret_path)
            .field("max_email_payload_bytes", &self.max_email_payload_bytes)
            .finish()
    }
}

/// Outgoing email configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Default `From` address for every message.
    pub sender: String,
}

/// Which delivery backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Log the message and pretend it was sent.
    Log,
    /// POST the message to an HTTP email API.
    Http,
}

/// Delivery provider configuration.
#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_kind")]
    pub kind: ProviderKind,
    /// Endpoint for the `http` provider.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Optional bearer token for the `http` provider.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Upper bound on a single send, in seconds.
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for the audit log.
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether audit records are written to `<logging.dir>/audit.log`.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_payload() -> usize {
    65_536 // 64KB
}

fn default_provider_kind() -> ProviderKind {
    ProviderKind::Log
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/mailgate")
}

fn default_audit_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            endpoint: None,
            api_token: None,
            timeout_seconds: default_provider_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> GatewayResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            GatewayError::Config { message } => GatewayError::config(format!(
                "Invalid config file '{}': {}",
                path.display(),
                message
            )),
            other => other,
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> GatewayResult<Self> {
        let settings: Settings = toml::from_str(content)
            .map_err(|e| GatewayError::config(format!("Failed to parse TOML: {}", e)))?;

        settings.validate()?;

        Ok(settings)
    }

    /// Parsed bind address.
    pub fn bind_addr(&self) -> GatewayResult<SocketAddr> {
        self.server.bind.parse().map_err(|e| {
            GatewayError::config(format!("Invalid bind address '{}': {}", self.server.bind, e))
        })
    }

    /// Timeout applied to each outbound send.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_seconds)
    }

    /// Path of the JSON-lines audit log.
    pub fn audit_log_path(&self) -> PathBuf {
        self.logging.dir.join("audit.log")
    }

    /// Resolve the shared secret, reading it from disk if configured by path.
    pub fn load_secret(&self) -> GatewayResult<SharedSecret> {
        let bytes = match (&self.security.api_secret, &self.security.api_secret_path) {
            (Some(inline), None) => inline.as_bytes().to_vec(),
            (None, Some(path)) => {
                // Secret files usually end with a newline that the caller never signs with.
                trim_ascii_whitespace(&read_secret_file(path)?).to_vec()
            }
            _ => {
                return Err(GatewayError::config(
                    "Exactly one of security.api_secret and security.api_secret_path must be set",
                ))
            }
        };

        if bytes.is_empty() {
            return Err(GatewayError::config("Shared secret is empty"));
        }

        Ok(SharedSecret::new(bytes))
    }

    /// Validate the settings.
    fn validate(&self) -> GatewayResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(GatewayError::config(format!(
                "Invalid log level '{}'. Valid levels: {:?}",
                self.logging.level, valid_levels
            )));
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(GatewayError::config(format!(
                "Invalid log format '{}'. Valid formats: {:?}",
                self.logging.format, valid_formats
            )));
        }

        match (&self.security.api_secret, &self.security.api_secret_path) {
            (Some(_), Some(_)) | (None, None) => {
                return Err(GatewayError::config(
                    "Exactly one of security.api_secret and security.api_secret_path must be set",
                ));
            }
            (Some(secret), None) if secret.trim().is_empty() => {
                return Err(GatewayError::config("security.api_secret must not be empty"));
            }
            _ => {}
        }

        if self.security.max_email_payload_bytes == 0 {
            return Err(GatewayError::config(
                "security.max_email_payload_bytes must be greater than zero",
            ));
        }

        if !self.email.sender.contains('@') {
            return Err(GatewayError::config(format!(
                "Invalid sender address '{}'",
                self.email.sender
            )));
        }

        if self.provider.kind == ProviderKind::Http && self.provider.endpoint.is_none() {
            return Err(GatewayError::config(
                "provider.endpoint is required when provider.kind = \"http\"",
            ));
        }

        if self.provider.timeout_seconds == 0 {
            return Err(GatewayError::config(
                "provider.timeout_seconds must be greater than zero",
            ));
        }

        self.bind_addr()?;

        Ok(())
    }
}

/// Read a secret file, refusing files readable by group or others.
fn read_secret_file(path: &Path) -> GatewayResult<Vec<u8>> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        GatewayError::config(format!(
            "Failed to read secret metadata from {}: {}",
            path.display(),
            e
        ))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(GatewayError::config(format!(
                "Secret file {} has insecure permissions {:04o}, expected 0600 or 0400",
                path.display(),
                mode & 0o777
            )));
        }
    }
    #[cfg(not(unix))]
    let _ = metadata;

    std::fs::read(path).map_err(|e| {
        GatewayError::config(format!(
            "Failed to read secret from {}: {}",
            path.display(),
            e
        ))
    })
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}
