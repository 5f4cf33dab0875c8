use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub locks: LockSettings,
    #[serde(default)]
    pub id_generator: IdGeneratorSettings,
    pub application: ApplicationSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub pool_size: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    pub url: String,
}

/// Account snapshot cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub enabled: bool,
    pub account_ttl_secs: u64,
    pub key_prefix: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            account_ttl_secs: 600,
            key_prefix: "account".to_string(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.account_ttl_secs)
    }
}

/// Distributed lock timings. `create_wait_ms` applies to account creation,
/// `mutate_wait_ms` to update, delete and transfer.
#[derive(Debug, Clone, Deserialize)]
pub struct LockSettings {
    pub key_prefix: String,
    pub create_wait_ms: u64,
    pub mutate_wait_ms: u64,
    pub hold_ms: u64,
    pub retry_interval_ms: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            key_prefix: "account".to_string(),
            create_wait_ms: 2_000,
            mutate_wait_ms: 5_000,
            hold_ms: 10_000,
            retry_interval_ms: 50,
        }
    }
}

impl LockSettings {
    pub fn create_wait(&self) -> Duration {
        Duration::from_millis(self.create_wait_ms)
    }

    pub fn mutate_wait(&self) -> Duration {
        Duration::from_millis(self.mutate_wait_ms)
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdGeneratorSettings {
    pub node_id: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }
}
