use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
pub struct FlintConfig {
    /// Publisher endpoint to subscribe to.
    #[serde(default = "defaults::connect_addr")]
    pub connect_addr: String,

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
    pub fn connect_addr() -> String {
        "127.0.0.1:9000".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

impl Default for FlintConfig {
    fn default() -> Self {
        Self {
            connect_addr: defaults::connect_addr(),
            log_level: defaults::log_level(),
        }
    }
}

impl FlintConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: FlintConfig = toml::from_str(&text)?;
        Ok(config)
    }
}
