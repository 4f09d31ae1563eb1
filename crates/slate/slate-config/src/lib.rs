use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
pub struct SlateConfig {
    /// Backing path of the publisher's shared-memory segment.
    #[serde(default = "defaults::shm_path")]
    pub shm_path: String,

    #[serde(default = "defaults::log_level")]
    pub log_level: String,
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

    pub fn log_level() -> String {
        "info".into()
    }
}

impl Default for SlateConfig {
    fn default() -> Self {
        Self {
            shm_path: defaults::shm_path(),
            log_level: defaults::log_level(),
        }
    }
}

impl SlateConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: SlateConfig = toml::from_str(&text)?;
        Ok(config)
    }
}
