use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::window::WindowSpec;

/// Settings loaded from `termrc.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Accept remote-control commands on the socket.
    pub allow_remote_control: bool,
    /// Socket to listen on instead of the default.
    pub listen_on: Option<PathBuf>,
    /// Windows opened when `termrc run` starts.
    pub windows: Vec<WindowSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allow_remote_control: true,
            listen_on: None,
            windows: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from a TOML file path. Returns None if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let config: Self = toml::from_str(&contents)
            .map_err(|source| ConfigError::ParseFailed {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %path.display(), windows = config.windows.len(), "loaded config");
        Ok(Some(config))
    }

    /// `path`, or the default location when `None`; defaults when the file
    /// is missing.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        Ok(Self::load(&path)?.unwrap_or_default())
    }
}

/// `$XDG_CONFIG_HOME/termrc/termrc.toml` (or the platform equivalent).
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("termrc").join("termrc.toml"))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
