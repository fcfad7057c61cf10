use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use config::{Config as ConfigLib, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use crate::utils::error::{Result, GatewayError};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    pub messaging: MessagingConfig,
    pub agent: AgentConfig,
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_dir: Option<String>,
}

/// Timing of the correlated request/response exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagingConfig {
    /// How long a caller waits for the response to its request.
    pub timeout_secs: u64,
    /// Age after which a queued message nobody claimed is discarded.
    pub expiry_secs: u64,
    /// Upper bound of a single wait before the waiter re-checks the queue.
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    pub sweep_interval_secs: u64,
}

/// Durations handed to every connection descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub response_timeout: Duration,
    pub message_expiry: Duration,
    pub poll_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(60),
            message_expiry: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        let config = Self::defaults()?
            // Load from config file
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Override with environment variables (e.g., APP__NODE__PORT)
            .add_source(Environment::with_prefix("APP").separator("__"))

            .build()?;

        Self::finish(config)
    }

    /// Loads defaults overlaid with a single file, without environment overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = Self::defaults()?
            .add_source(File::from(path))
            .build()?;

        Self::finish(config)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(ConfigLib::builder()
            .set_default("node.host", "127.0.0.1")?
            .set_default("node.port", 8181)?
            .set_default("node.log_level", "info")?
            .set_default("messaging.timeout_secs", 60)?
            .set_default("messaging.expiry_secs", 120)?
            .set_default("messaging.poll_interval_ms", 500)?
            .set_default("agent.url", "http://localhost:9997/agent")?
            .set_default("agent.timeout_secs", 30)?
            .set_default("maintenance.sweep_interval_secs", 300)?)
    }

    fn finish(config: ConfigLib) -> Result<Self> {
        let config: Self = config.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.node.port == 0 {
            return Err(GatewayError::Config("Invalid port number".into()));
        }

        if self.messaging.timeout_secs == 0 {
            return Err(GatewayError::Config("messaging.timeout_secs must be greater than 0".into()));
        }
        if self.messaging.poll_interval_ms == 0 {
            return Err(GatewayError::Config("messaging.poll_interval_ms must be greater than 0".into()));
        }
        // a response must outlive the wait for it, otherwise it could be purged while awaited
        if self.messaging.expiry_secs < self.messaging.timeout_secs {
            return Err(GatewayError::Config(
                "messaging.expiry_secs must not be shorter than messaging.timeout_secs".into(),
            ));
        }

        if !self.agent.url.starts_with("http://") && !self.agent.url.starts_with("https://") {
            return Err(GatewayError::Config(format!("Invalid agent url '{}'", self.agent.url)));
        }

        if self.maintenance.sweep_interval_secs == 0 {
            return Err(GatewayError::Config("maintenance.sweep_interval_secs must be greater than 0".into()));
        }

        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            response_timeout: Duration::from_secs(self.messaging.timeout_secs),
            message_expiry: Duration::from_secs(self.messaging.expiry_secs),
            poll_interval: Duration::from_millis(self.messaging.poll_interval_ms),
        }
    }

    pub fn get_agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent.timeout_secs)
    }

    pub fn get_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance.sweep_interval_secs)
    }
}

impl From<ConfigError> for GatewayError {
    fn from(error: ConfigError) -> Self {
        GatewayError::Config(error.to_string())
    }
}
