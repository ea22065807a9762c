//! Finding and reading the config file

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, Result};

use super::defaults::{config_file_names, system_config_path};
use super::types::Config;
use super::validation::validate_config;

/// Syntax of a config file, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are TOML; anything else is read as YAML
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::Toml,
            _ => Self::Yaml,
        }
    }

    pub fn parse(self, content: &str) -> Result<Config> {
        let config = match self {
            Self::Toml => toml::from_str(content).map_err(ConfigError::TomlError)?,
            Self::Yaml => serde_yaml::from_str(content).map_err(ConfigError::YamlError)?,
        };
        Ok(config)
    }
}

/// Parse config text without validating it
pub fn parse_config(path: &Path, content: &str) -> Result<Config> {
    ConfigFormat::of(path).parse(content)
}

/// Read, parse and validate one file
pub fn load_config(path: &Path) -> Result<Config> {
    let format = ConfigFormat::of(path);
    info!(path = %path.display(), ?format, "loading config");

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path.to_path_buf()).into())
        }
        Err(e) => return Err(ConfigError::Io(e).into()),
    };

    let config = format.parse(&content)?;
    validate_config(&config)?;
    debug!(targets = config.targets.len(), storage = config.storage.len(), "config ready");
    Ok(config)
}

/// Locate the config file for `start_dir`.
///
/// Walks from `start_dir` towards the root and returns the first file named
/// in [`config_file_names`], falling back to the system-wide file.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let found = start_dir.ancestors().find_map(|dir| {
        config_file_names()
            .into_iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    });

    match found {
        Some(path) => {
            info!(path = %path.display(), "found config file");
            Some(path)
        }
        None => {
            let system = system_config_path();
            debug!(start_dir = %start_dir.display(), system = %system.display(), "no project config file");
            system.is_file().then_some(system)
        }
    }
}

/// Load `explicit` when given, otherwise the file [`find_config`] picks
pub fn resolve_config(explicit: Option<&Path>, dir: &Path) -> Result<(Config, PathBuf)> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => find_config(dir).ok_or_else(|| ConfigError::NotFound(dir.to_path_buf()))?,
    };
    let config = load_config(&path)?;
    Ok((config, path))
}
