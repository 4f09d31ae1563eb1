use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
pub struct PyriteConfig {
    /// Backing path of the shared-memory segment the publisher owns.
    #[serde(default = "defaults::shm_path")]
    pub shm_path: String,

    /// TCP endpoint the publisher listens on for quote subscribers.
    #[serde(default = "defaults::listen_addr")]
    pub listen_addr: String,

    #[serde(default = "defaults::log_level")]
    pub log_level: String,

    /// Microseconds between generated quotes.
    #[serde(default = "defaults::tick_interval_us")]
    pub tick_interval_us: u64,

    /// Stop after this many quotes; 0 runs unbounded.
    #[serde(default = "defaults::max_ticks")]
    pub max_ticks: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

mod defaults {
    pub fn shm_path() -> String {
        "/dev/shm/hft_market_data".into()
    }

    pub fn listen_addr() -> String {
        "127.0.0.1:9000".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn tick_interval_us() -> u64 {
        1_000
    }

    pub fn max_ticks() -> u64 {
        0
    }
}

impl Default for PyriteConfig {
    fn default() -> Self {
        Self {
            shm_path: defaults::shm_path(),
            listen_addr: defaults::listen_addr(),
            log_level: defaults::log_level(),
            tick_interval_us: defaults::tick_interval_us(),
            max_ticks: defaults::max_ticks(),
        }
    }
}

impl PyriteConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: PyriteConfig = toml::from_str(&text)?;
        Ok(config)
    }
}
