//! Bridge configuration loaded from `config.toml`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_EXECUTABLE: &str = "ocamlmerlin";
pub const DEFAULT_PROJECT_SEARCH_DEPTH: usize = 3;

const fn default_search_depth() -> usize {
    DEFAULT_PROJECT_SEARCH_DEPTH
}

fn default_executable() -> String {
    DEFAULT_EXECUTABLE.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Analysis server to spawn; resolved through `PATH`.
    #[serde(default = "default_executable")]
    pub executable: String,
    /// Extra arguments passed to the server. `${VAR}` is expanded.
    #[serde(default)]
    pub flags: Vec<String>,
    /// Drop warnings from location lists.
    #[serde(default)]
    pub ignore_warnings: bool,
    /// How many parent directories to search for a `.merlin` file.
    #[serde(default = "default_search_depth")]
    pub project_search_depth: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            flags: Vec::new(),
            ignore_warnings: false,
            project_search_depth: DEFAULT_PROJECT_SEARCH_DEPTH,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

impl BridgeConfig {
    /// Load from the default location. A missing file is not an error.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %path.display(), "failed to read config: {err}");
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match Self::parse(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!(path = %path.display(), "failed to parse config: {err}");
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Flags with `${VAR}` references substituted.
    #[must_use]
    pub fn expanded_flags(&self) -> Vec<String> {
        self.flags.iter().map(|f| expand_env_vars(f)).collect()
    }
}

/// `$XDG_CONFIG_HOME/merlin-bridge/config.toml` (or the platform equivalent).
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("merlin-bridge").join("config.toml"))
}

/// Replace `${VAR}` with the variable's value; unset variables become empty.
/// Unclosed references and `${}` are kept literally.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find('}') {
            Some(0) => {
                out.push_str("${}");
                rest = &after[1..];
            }
            Some(close) => {
                out.push_str(&env::var(&after[..close]).unwrap_or_default());
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
