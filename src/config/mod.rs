//! Configuration loading and management
//!
//! Configuration is read from the YAML file named by `CONFIG_PATH`, then a
//! fixed set of environment variables override individual values. Every field
//! has a default, so an empty file is a valid configuration.

use crate::core::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-request deadline; slower requests get `408`
    pub request_timeout_secs: u64,
    /// How long in-flight requests may drain on shutdown
    pub shutdown_grace_secs: u64,
    /// Optional directory served for paths no route matches
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            request_timeout_secs: 15,
            shutdown_grace_secs: 5,
            static_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Which order store backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

/// Order store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Create the tables on startup if they are missing
    pub ensure_schema: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            ensure_schema: false,
        }
    }
}

/// PostgreSQL connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            dbname: "orders".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 5,
        }
    }
}

impl PostgresConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.dbname
        )
    }
}

/// Which message stream feeds the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamBackend {
    Memory,
    Kafka,
}

/// Message stream settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub backend: StreamBackend,
    pub brokers: Vec<String>,
    pub topic: String,
    pub group_id: String,
    /// Interval of the demo producer; `0` disables it
    pub produce_interval_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            backend: StreamBackend::Memory,
            brokers: vec!["localhost:9092".to_string()],
            topic: "orders".to_string(),
            group_id: "order-relay".to_string(),
            produce_interval_secs: 5,
        }
    }
}

impl StreamConfig {
    pub fn produce_interval(&self) -> Option<Duration> {
        (self.produce_interval_secs > 0).then(|| Duration::from_secs(self.produce_interval_secs))
    }
}

/// Persistence retry settings of the stream consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Total save attempts per message, the first one included
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 500,
        }
    }
}

/// Startup cache warm-up deadlines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmUpSettings {
    pub list_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for WarmUpSettings {
    fn default() -> Self {
        Self {
            list_timeout_secs: 10,
            fetch_timeout_secs: 5,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging settings; `RUST_LOG` takes precedence over `level`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub postgres: PostgresConfig,
    pub stream: StreamConfig,
    pub consumer: ConsumerConfig,
    pub warmup: WarmUpSettings,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from the file named by `CONFIG_PATH`, apply environment
    /// overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CONFIG_PATH").map_err(|_| ConfigError::MissingPath)?;
        let mut config = Self::from_yaml_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Override values from environment variables
    ///
    /// `lookup` abstracts the environment so overrides can be tested without
    /// touching the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("SERVER_PORT") {
            self.server.port = parse_var("SERVER_PORT", &port)?;
        }
        if let Some(host) = lookup("POSTGRES_HOST") {
            self.postgres.host = host;
        }
        if let Some(port) = lookup("POSTGRES_PORT") {
            self.postgres.port = parse_var("POSTGRES_PORT", &port)?;
        }
        if let Some(user) = lookup("POSTGRES_USER") {
            self.postgres.user = user;
        }
        if let Some(password) = lookup("POSTGRES_PASSWORD") {
            self.postgres.password = password;
        }
        if let Some(dbname) = lookup("POSTGRES_DBNAME") {
            self.postgres.dbname = dbname;
        }
        if let Some(brokers) = lookup("KAFKA_BROKERS") {
            self.stream.brokers = brokers
                .split(',')
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(topic) = lookup("KAFKA_TOPIC") {
            self.stream.topic = topic;
        }
        if let Some(group_id) = lookup("KAFKA_GROUP_ID") {
            self.stream.group_id = group_id;
        }
        Ok(())
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port", "must be greater than 0"));
        }
        if self.consumer.max_attempts == 0 {
            return Err(invalid("consumer.max_attempts", "must be at least 1"));
        }
        if self.stream.topic.trim().is_empty() {
            return Err(invalid("stream.topic", "must not be empty"));
        }
        if self.stream.backend == StreamBackend::Kafka && self.stream.brokers.is_empty() {
            return Err(invalid("stream.brokers", "at least one broker is required"));
        }
        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(key, &format!("'{}' is not a valid number", value)))
}
