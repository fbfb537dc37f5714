//! Server configuration, loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `SEPARATION_TOKEN_SECRET`: token signing secret (required, non-empty)
//! - `SEPARATION_HTTP_PORT`: HTTP/WebSocket port (default: 8000)
//! - `SEPARATION_BIND_ADDRESS`: bind address (default: 0.0.0.0)
//! - `SEPARATION_DATABASE_PATH`: database file (default: separation.db)
//! - `SEPARATION_SEND_QUEUE_CAPACITY`: per-connection write queue (default: 64)
//! - `SEPARATION_WRITE_TIMEOUT_SECS`: socket write timeout (default: 5)
//! - `SEPARATION_MAX_UPLOAD_BYTES`: PDF upload cap (default: 10 MiB)

use std::time::Duration;

use thiserror::Error;

/// Configuration error. Fatal at startup only.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// A value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Token signing secret with a redacted `Debug`.
#[derive(Clone)]
pub struct TokenSecret(String);

impl TokenSecret {
    /// Wrap a secret value.
    #[must_use]
    pub fn new(secret: String) -> Self {
        Self(secret)
    }

    /// Expose the secret for key derivation.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenSecret([REDACTED])")
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// HTTP/WebSocket port.
    pub http_port: u16,
    /// Bind address.
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_port: 8000,
            bind_address: "0.0.0.0".to_string(),
        }
    }
}

/// Database settings.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Path to the database file.
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "separation.db".to_string(),
        }
    }
}

/// WebSocket fan-out settings.
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    /// Per-connection bounded write queue. A full queue demotes the client.
    pub send_queue_capacity: usize,
    /// Best-effort socket write timeout.
    pub write_timeout: Duration,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            send_queue_capacity: 64,
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Upload limits.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Maximum accepted PDF size in bytes.
    pub max_upload_bytes: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Complete server configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Database settings.
    pub database: DatabaseSettings,
    /// WebSocket fan-out settings.
    pub websocket: WebSocketSettings,
    /// Upload limits.
    pub upload: UploadSettings,
    /// Token signing secret.
    pub token_secret: TokenSecret,
}

impl Settings {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the token secret is missing/empty or a
    /// value fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token_secret = std::env::var("SEPARATION_TOKEN_SECRET")
            .map_err(|_| ConfigError::MissingEnvVar("SEPARATION_TOKEN_SECRET".to_string()))?;
        if token_secret.is_empty() {
            return Err(ConfigError::EmptyValue("SEPARATION_TOKEN_SECRET".to_string()));
        }

        let server = ServerSettings {
            http_port: parse_env_u16("SEPARATION_HTTP_PORT", ServerSettings::default().http_port),
            bind_address: std::env::var("SEPARATION_BIND_ADDRESS")
                .unwrap_or_else(|_| ServerSettings::default().bind_address),
        };
        let database = DatabaseSettings {
            path: std::env::var("SEPARATION_DATABASE_PATH")
                .unwrap_or_else(|_| DatabaseSettings::default().path),
        };
        let websocket = WebSocketSettings {
            send_queue_capacity: parse_env_usize(
                "SEPARATION_SEND_QUEUE_CAPACITY",
                WebSocketSettings::default().send_queue_capacity,
            ),
            write_timeout: parse_env_duration_secs(
                "SEPARATION_WRITE_TIMEOUT_SECS",
                WebSocketSettings::default().write_timeout,
            ),
        };
        let upload = UploadSettings {
            max_upload_bytes: parse_env_usize(
                "SEPARATION_MAX_UPLOAD_BYTES",
                UploadSettings::default().max_upload_bytes,
            ),
        };

        let settings = Self {
            server,
            database,
            websocket,
            upload,
            token_secret: TokenSecret::new(token_secret),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validate value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.websocket.send_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "send_queue_capacity must be positive".to_string(),
            ));
        }
        if self.upload.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_upload_bytes must be positive".to_string(),
            ));
        }
        if self.database.path.is_empty() {
            return Err(ConfigError::Invalid("database path cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Settings for tests: in-memory database, fixed secret.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            server: ServerSettings::default(),
            database: DatabaseSettings {
                path: ":memory:".to_string(),
            },
            websocket: WebSocketSettings::default(),
            upload: UploadSettings::default(),
            token_secret: TokenSecret::new("test-secret".to_string()),
        }
    }
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::for_tests();
        assert_eq!(settings.server.http_port, 8000);
        assert_eq!(settings.websocket.send_queue_capacity, 64);
        assert_eq!(settings.upload.max_upload_bytes, 10 * 1024 * 1024);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let mut settings = Settings::for_tests();
        settings.websocket.send_queue_capacity = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = TokenSecret::new("super-secret".to_string());
        let debug = format!("{secret:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }
}
