//! Configuration module for the Gov.br SSO server
//!
//! Sources, lowest precedence first:
//! - Configuration file (`config.toml`, or the path in `GOVBR_CONFIG_FILE`); `-` and `_` in keys are equivalent
//! - Environment variables with the `GOVBR__` prefix, e.g. `GOVBR__PROVIDER__CLIENT_ID`
//! - Legacy variables `HOST`, `PORT` and `RUST_LOG`

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config as Settings, ConfigBuilder, Environment, File, Map, Value};
use govbr_oauth2::GovBrConfig;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, info};

/// Main configuration struct for the SSO server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Gov.br client registration; required
    pub provider: GovBrConfig,

    /// Session cookie and lifetime
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to (default: 127.0.0.1)
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to bind to (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle lifetime of a session in seconds (default: 1800)
    #[serde(default = "default_session_ttl")]
    pub ttl_seconds: u64,

    /// Interval between sweeps of expired sessions (default: 60)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,

    /// Mark the session cookie `Secure`; enable behind HTTPS
    #[serde(default)]
    pub secure_cookie: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Whether to include target module
    #[serde(default = "default_true")]
    pub target: bool,
}

// Default value functions
fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_session_ttl() -> u64 {
    1800 // 30 minutes
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_session_ttl(),
            cleanup_interval_seconds: default_cleanup_interval(),
            secure_cookie: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: true,
        }
    }
}

impl Config {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("GOVBR_CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let mut builder = Settings::builder();

        if config_path.exists() {
            info!("Loading configuration from {}", config_path.display());
            builder = Self::layer_file(builder, config_path)?;
        } else {
            debug!(
                "No config file found at {}, using environment only",
                config_path.display()
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("GOVBR")
                .separator("__") // GOVBR__PROVIDER__CLIENT_ID
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut settings: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        settings.apply_env_overrides()?;
        settings.validate()?;

        Ok(settings)
    }

    /// Add the file as the lowest layer with `-` in keys folded to `_`, so
    /// `client-secret` in the file and `GOVBR__PROVIDER__CLIENT_SECRET` land on one key.
    fn layer_file(
        mut builder: ConfigBuilder<DefaultState>,
        config_path: &Path,
    ) -> Result<ConfigBuilder<DefaultState>> {
        let file = Settings::builder()
            .add_source(File::from(config_path))
            .build()
            .context("Failed to read configuration file")?;
        let table: Map<String, Value> = file
            .try_deserialize()
            .context("Configuration file is not a table")?;

        for (section, value) in table {
            let section = section.replace('-', "_");
            match value.clone().into_table() {
                Ok(fields) => {
                    for (key, field) in fields {
                        builder = builder
                            .set_default(format!("{}.{}", section, key.replace('-', "_")), field)?;
                    }
                }
                Err(_) => builder = builder.set_default(section, value)?,
            }
        }

        Ok(builder)
    }

    /// Apply direct environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("HOST") {
            info!("Using HOST environment variable");
            self.server.host = host.parse().context("Invalid HOST value")?;
        }

        if let Ok(port) = std::env::var("PORT") {
            info!("Using PORT environment variable");
            self.server.port = port.parse().context("Invalid PORT value")?;
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.logging.level = log_level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        self.provider
            .validate()
            .context("Invalid provider configuration")?;

        if self.session.ttl_seconds == 0 {
            anyhow::bail!("Session TTL must be positive");
        }

        if self.session.cleanup_interval_seconds == 0 {
            anyhow::bail!("Session cleanup interval must be positive");
        }

        // Full filter directives are passed through untouched
        if !self.logging.level.contains('=') && !self.logging.level.contains(',') {
            let valid_levels = ["trace", "debug", "info", "warn", "error"];
            let level_lower = self.logging.level.to_lowercase();
            if !valid_levels.contains(&level_lower.as_str()) {
                anyhow::bail!(
                    "Invalid log level '{}'. Must be one of: {:?}",
                    self.logging.level,
                    valid_levels
                );
            }
        }

        let valid_formats = ["pretty", "compact"];
        let format_lower = self.logging.format.to_lowercase();
        if !valid_formats.contains(&format_lower.as_str()) {
            anyhow::bail!(
                "Invalid log format '{}'. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            );
        }

        Ok(())
    }

    /// Get the socket address for the server
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from((self.server.host, self.server.port))
    }

    /// Get the log filter string for tracing
    pub fn log_filter(&self) -> String {
        if self.logging.level.contains('=') || self.logging.level.contains(',') {
            self.logging.level.clone()
        } else {
            format!(
                "govbr_sso_server={},govbr_oauth2={},tower_http={},{}",
                self.logging.level, self.logging.level, self.logging.level, "warn"
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GovBrConfig {
        GovBrConfig::new(
            "https://sso.staging.acesso.gov.br",
            "abc",
            "secret",
            "http://localhost:8080/openid",
            "http://localhost:8080/logout/govbr",
        )
        .with_scopes("openid email profile")
    }

    fn config() -> Config {
        Config {
            server: ServerConfig::default(),
            provider: provider(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_default_config() {
        assert!(config().validate().is_ok());
        assert_eq!(config().socket_addr().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_invalid_config() {
        let mut config = config();
        config.server.port = 0;
        assert!(config.validate().is_err());

        config.server.port = 8080;
        config.logging.format = "json".to_string();
        assert!(config.validate().is_err());

        config.logging.format = "compact".to_string();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        config.provider.client_secret.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_filter() {
        let mut config = config();
        assert_eq!(
            config.log_filter(),
            "govbr_sso_server=info,govbr_oauth2=info,tower_http=info,warn"
        );

        config.logging.level = "govbr_oauth2=trace,info".to_string();
        assert_eq!(config.log_filter(), "govbr_oauth2=trace,info");
    }
}
