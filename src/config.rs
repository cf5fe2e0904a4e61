use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Local configuration: API tokens plus the logical-name -> database-id map.
#[derive(Deserialize, PartialEq, Clone, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub token: String,
    pub dropbox_token: String,
    pub databases: BTreeMap<String, String>,
}

impl Config {
    pub fn open(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_yaml::from_str(&text).context("Failed to parse config")?;
        Ok(config)
    }

    /// Fixed default location, `~/.notion/config.yaml`.
    pub fn default_path() -> Result<PathBuf> {
        let home = home::home_dir().context("Failed to locate home directory")?;
        Ok(home.join(".notion").join("config.yaml"))
    }
}
