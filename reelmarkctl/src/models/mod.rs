//! Shape of the configuration `reelmarkctl` loads.

use std::path::PathBuf;

use reelmark_core::EngineConfig;
use serde::{Deserialize, Serialize};

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => f.write_str("built-in defaults"),
            ConfigSource::EnvPath(path) => {
                write!(f, "REELMARK_CONFIG_PATH ({})", path.display())
            }
            ConfigSource::EnvInline => f.write_str("REELMARK_CONFIG_JSON"),
            ConfigSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheduler and change-bus tuning.
    pub engine: EngineConfig,
    /// Postgres connection string for the `postgres` store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl Config {
    /// Connection string with the password masked, for display.
    pub fn redacted_database_url(&self) -> Option<String> {
        let url = self.database_url.as_deref()?;
        let Some((scheme, rest)) = url.split_once("://") else {
            return Some(url.to_string());
        };
        let Some((userinfo, host)) = rest.rsplit_once('@') else {
            return Some(url.to_string());
        };
        let user = userinfo.split(':').next().unwrap_or_default();
        Some(format!("{scheme}://{user}:***@{host}"))
    }
}
