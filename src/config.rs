use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::application::{CacheSettings, PlanningSettings};
use crate::domains::path_planning::{Connectivity, PlanningAlgorithm};

/// Prefix for environment overrides, e.g. `WALLPATH__CACHE__CAPACITY=64`.
pub const ENV_PREFIX: &str = "WALLPATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub planning: PlanningConfig,
    pub cache: CacheConfig,
    pub store: StoreConfig,
    pub postgres: PostgresConfig,
    pub kafka: KafkaConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    pub resolution: u32,
    pub default_algorithm: PlanningAlgorithm,
    pub default_connectivity: Connectivity,
    /// 0 waits without a deadline.
    pub wait_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    /// 0 disables expiry.
    pub ttl_secs: u64,
    pub dispatch_pin_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Plan documents for the `file` backend.
    pub directory: PathBuf,
    /// Wall documents (`<wall_id>.json`) read by the `memory` and `file`
    /// backends. The `postgres` backend reads the `walls` table instead.
    pub wall_directory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub client_id: String,
    pub group_id: String,
    pub topics: KafkaTopics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaTopics {
    pub plan_commands: String,
    pub plan_results: String,
    pub robot_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive. `RUST_LOG` wins when set.
    pub filter: String,
}

impl Config {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Layers an optional TOML file under `WALLPATH__`-prefixed environment
    /// variables. Missing keys fall back to the defaults.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path.as_ref()).required(false));
        }
        let config: Config = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("kafka.brokers")
                    .try_parsing(true),
            )
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.planning.resolution == 0 {
            anyhow::bail!("planning.resolution must be positive");
        }
        if self.cache.capacity == 0 {
            anyhow::bail!("cache.capacity must be positive");
        }
        Ok(())
    }

    pub fn planning_settings(&self) -> PlanningSettings {
        PlanningSettings {
            resolution: self.planning.resolution,
            default_algorithm: self.planning.default_algorithm,
            default_connectivity: self.planning.default_connectivity,
            wait_timeout: non_zero(Duration::from_millis(self.planning.wait_timeout_ms)),
        }
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            capacity: self.cache.capacity,
            ttl: non_zero(Duration::from_secs(self.cache.ttl_secs)),
        }
    }

    pub fn dispatch_pin(&self) -> Duration {
        Duration::from_secs(self.cache.dispatch_pin_secs)
    }
}

fn non_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            resolution: 10,
            default_algorithm: PlanningAlgorithm::AStar,
            default_connectivity: Connectivity::Four,
            wait_timeout_ms: 30_000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl_secs: 3600,
            dispatch_pin_secs: 600,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            directory: PathBuf::from("data/plans"),
            wall_directory: PathBuf::from("data/walls"),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "wallpath".to_string(),
            username: "postgres".to_string(),
            password: "password".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            client_id: "wallpath".to_string(),
            group_id: "wallpath-group".to_string(),
            topics: KafkaTopics::default(),
        }
    }
}

impl Default for KafkaTopics {
    fn default() -> Self {
        Self {
            plan_commands: "plan-commands".to_string(),
            plan_results: "plan-results".to_string(),
            robot_path: "robot-path".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,wallpath=debug".to_string(),
        }
    }
}
