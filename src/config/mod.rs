use crate::house::{HouseId, NUM_HOUSES};
use crate::state::{EventLogLimits, StoreOptions, DEFAULT_MAX_EVENTS};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, warn};

// Re-export existing config types
pub use crate::backing::MemcacheConfig;

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "HOUSED_CONFIG";

/// Complete housed configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HousedConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub houses: HousesConfig,
    #[serde(default)]
    pub memcache: MemcacheConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Directory served for any path that is not an API endpoint
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
}

fn default_port() -> u16 {
    3000
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("./public")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            public_dir: default_public_dir(),
        }
    }
}

/// Per-house tables, index = house id
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HousesConfig {
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default)]
    pub target_macs: Vec<String>,
}

/// Event log retention
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    /// Days; negative values fail to parse
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
}

fn default_max_events() -> usize {
    DEFAULT_MAX_EVENTS
}

fn default_max_age_days() -> u32 {
    7
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
            max_age_days: default_max_age_days(),
        }
    }
}

impl EventsConfig {
    pub fn limits(&self) -> EventLogLimits {
        EventLogLimits {
            max_events: self.max_events,
            max_age_secs: i64::from(self.max_age_days).saturating_mul(24 * 60 * 60),
        }
    }
}

impl HousedConfig {
    /// Defaults, then the file named by `HOUSED_CONFIG` (if set), then the
    /// process environment
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                info!(path = %path, "Reading config file");
                load_config(path.trim())?
            }
            _ => HousedConfig::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.normalize();
        Ok(config)
    }

    /// Override settings from environment variables
    ///
    /// `lookup` returns the raw value of a variable. Blank values are
    /// ignored; numeric values that fail to parse keep the current setting.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = var("PORT") {
            match v.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %v, "Ignoring invalid PORT"),
            }
        }
        if let Some(v) = var("HOUSED_PUBLIC_DIR") {
            self.server.public_dir = PathBuf::from(v);
        }

        self.houses.api_keys.resize(NUM_HOUSES, String::new());
        self.houses.target_macs.resize(NUM_HOUSES, String::new());
        for i in 0..NUM_HOUSES {
            if let Some(key) = var(&format!("APIKEY{}", i)) {
                self.houses.api_keys[i] = key;
            }
            if let Some(mac) = var(&format!("MAC{}", i)) {
                self.houses.target_macs[i] = mac;
            }
        }

        if let Some(v) = var("MEMCACHEDCLOUD_SERVERS") {
            self.memcache.servers = v;
        }
        if let Some(v) = var("MEMCACHEDCLOUD_USERNAME") {
            self.memcache.username = Some(v);
        }
        if let Some(v) = var("MEMCACHEDCLOUD_PASSWORD") {
            self.memcache.password = Some(v);
        }
        if let Some(v) = var("HOUSED_MEMCACHE_ENABLED") {
            match v.parse() {
                Ok(enabled) => self.memcache.enabled = enabled,
                Err(_) => warn!(value = %v, "Ignoring invalid HOUSED_MEMCACHE_ENABLED"),
            }
        }
        if let Some(v) = var("HOUSED_MEMCACHE_TIMEOUT_MS") {
            match v.parse() {
                Ok(ms) => self.memcache.timeout_ms = ms,
                Err(_) => warn!(value = %v, "Ignoring invalid HOUSED_MEMCACHE_TIMEOUT_MS"),
            }
        }
    }

    /// Trim per-house entries and pad/truncate the tables to one slot per house
    pub fn normalize(&mut self) {
        for table in [&mut self.houses.api_keys, &mut self.houses.target_macs] {
            table.resize(NUM_HOUSES, String::new());
            for entry in table.iter_mut() {
                *entry = entry.trim().to_string();
            }
        }
    }

    /// Log one line per house describing what is configured for it
    ///
    /// Houses without an API key can never authenticate.
    pub fn log_house_tables(&self) {
        for house in HouseId::all() {
            let i = house.index();
            match self.houses.api_keys.get(i).map(String::as_str) {
                Some(key) if !key.is_empty() => info!(house = i, "API key configured"),
                _ => warn!(house = i, "No API key configured, house cannot authenticate"),
            }
            match self.houses.target_macs.get(i).map(String::as_str) {
                Some(mac) if !mac.is_empty() => info!(house = i, mac = %mac, "Target MAC configured"),
                _ => warn!(house = i, "No target MAC configured"),
            }
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            persist_timeout: self.memcache.timeout(),
            event_limits: self.events.limits(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<HousedConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: HousedConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path))?;
    Ok(config)
}
