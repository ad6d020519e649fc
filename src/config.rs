//! Configuration management for the RAX FTP client
//!
//! Settings come from an optional `config.toml` and `RAX_FTP_CLIENT_*`
//! environment variables, in that order of precedence (environment wins).

use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

/// Client configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Server host name or address
    pub host: String,

    /// Server command port
    pub port: u16,

    /// Login name, `anonymous` when unset
    pub user: Option<String>,

    /// Password, `@anonymous` when unset
    pub pass: Option<String>,

    /// Interval between keepalive NOOPs once `keep_alive` is called
    pub keepalive_interval_secs: u64,

    /// Optional limit applied by the session manager to a whole operation.
    /// The client itself enforces no per-command deadline.
    pub response_timeout_secs: Option<u64>,

    /// Buffer size for data channel pumps
    pub buffer_size: usize,

    /// Maximum concurrent sessions held by a session manager
    pub max_sessions: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 21,
            user: None,
            pass: None,
            keepalive_interval_secs: 30,
            response_timeout_secs: None,
            buffer_size: 8192,
            max_sessions: 10,
        }
    }
}

impl ClientConfig {
    /// Configuration for `host:port` with every other setting defaulted.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.pass = Some(pass.into());
        self
    }

    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_paths = [
            "rax-ftp-client/config", // packaged layout
            "config",                // local development
        ];

        let mut builder = Config::builder();
        for path in config_paths {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        let settings = builder
            .add_source(Environment::with_prefix("RAX_FTP_CLIENT"))
            .build()?;

        let config: ClientConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.host.trim().is_empty() {
            return Err(config::ConfigError::Message("host cannot be empty".into()));
        }

        if self.port == 0 {
            return Err(config::ConfigError::Message("port cannot be 0".into()));
        }

        if self.keepalive_interval_secs == 0 {
            return Err(config::ConfigError::Message(
                "keepalive_interval_secs must be greater than 0".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(config::ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        if self.max_sessions == 0 {
            return Err(config::ConfigError::Message(
                "max_sessions must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    pub fn user_or_default(&self) -> &str {
        self.user.as_deref().unwrap_or("anonymous")
    }

    pub fn pass_or_default(&self) -> &str {
        self.pass.as_deref().unwrap_or("@anonymous")
    }

    /// Get keepalive interval as Duration
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    /// Get response timeout as Duration
    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_secs.map(Duration::from_secs)
    }
}
