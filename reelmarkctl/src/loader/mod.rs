//! Resolves the effective [`Config`] from the environment and disk.
//!
//! Lookup order:
//! 1) `$REELMARK_CONFIG_PATH` (TOML or JSON file),
//! 2) `$REELMARK_CONFIG_JSON` (inline JSON),
//! 3) the first default file found under the base directory,
//! 4) defaults.
//!
//! `$DATABASE_URL` overrides whatever the file said. Guard rails run last.

mod error;

pub use error::ConfigLoadError;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::models::{Config, ConfigSource};
use crate::validation::{ConfigWarnings, apply_guard_rails};

pub const CONFIG_PATH_VAR: &str = "REELMARK_CONFIG_PATH";
pub const CONFIG_JSON_VAR: &str = "REELMARK_CONFIG_JSON";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

const DEFAULT_FILES: &[&str] = &[
    "reelmark.toml",
    "reelmark.json",
    "config/reelmark.toml",
    "config/reelmark.json",
];

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: ConfigSource,
    pub warnings: ConfigWarnings,
}

/// Loads `.env` from the working directory or its parents.
///
/// Returns the file that was loaded, `None` when there is none.
pub fn load_dotenv() -> Result<Option<PathBuf>, ConfigLoadError> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(err) if err.not_found() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env: HashMap<String, String>,
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Loader reading the current process environment and working
    /// directory.
    pub fn from_process_env() -> Self {
        Self {
            env: std::env::vars().collect(),
            base_dir: PathBuf::from("."),
        }
    }

    /// Loader over an explicit environment, for tests and embedding.
    pub fn with_env<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            env: vars
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            base_dir: PathBuf::from("."),
        }
    }

    /// Directory searched for the default config files.
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    fn var(&self, key: &str) -> Option<&str> {
        self.env
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn load(&self) -> Result<LoadedConfig, ConfigLoadError> {
        let (mut config, source) = self.load_layers()?;

        if let Some(url) = self.var(DATABASE_URL_VAR) {
            config.database_url = Some(url.to_string());
        }

        let warnings = apply_guard_rails(&config)?;
        debug!(%source, warnings = warnings.len(), "configuration loaded");

        Ok(LoadedConfig {
            config,
            source,
            warnings,
        })
    }

    fn load_layers(&self) -> Result<(Config, ConfigSource), ConfigLoadError> {
        if let Some(path) = self.var(CONFIG_PATH_VAR) {
            let path = PathBuf::from(path);
            let config = load_from_file(&path)?;
            return Ok((config, ConfigSource::EnvPath(path)));
        }

        if let Some(raw) = self.var(CONFIG_JSON_VAR) {
            let config = parse_json(raw, CONFIG_JSON_VAR)?;
            return Ok((config, ConfigSource::EnvInline));
        }

        if let Some(path) = self.find_default_file() {
            let config = load_from_file(&path)?;
            return Ok((config, ConfigSource::File(path)));
        }

        Ok((Config::default(), ConfigSource::Default))
    }

    fn find_default_file(&self) -> Option<PathBuf> {
        DEFAULT_FILES
            .iter()
            .map(|candidate| self.base_dir.join(candidate))
            .find(|path| path.exists())
    }
}

pub fn load_from_file(path: &Path) -> Result<Config, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let origin = path.display().to_string();

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => parse_json(&contents, &origin),
        Some("toml") | Some("tml") => parse_toml(&contents, &origin),
        _ => parse_from_str(&contents, &origin),
    }
}

/// Tries TOML first, then JSON.
pub fn parse_from_str(
    contents: &str,
    origin: &str,
) -> Result<Config, ConfigLoadError> {
    toml::from_str(contents).or_else(|toml_err| {
        serde_json::from_str(contents).map_err(|json_err| {
            ConfigLoadError::Parse {
                origin: origin.to_string(),
                reason: format!(
                    "toml error: {toml_err}; json error: {json_err}"
                ),
            }
        })
    })
}

fn parse_toml(contents: &str, origin: &str) -> Result<Config, ConfigLoadError> {
    toml::from_str(contents).map_err(|err| ConfigLoadError::Parse {
        origin: origin.to_string(),
        reason: err.to_string(),
    })
}

fn parse_json(contents: &str, origin: &str) -> Result<Config, ConfigLoadError> {
    serde_json::from_str(contents).map_err(|err| ConfigLoadError::Parse {
        origin: origin.to_string(),
        reason: err.to_string(),
    })
}
