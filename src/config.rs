use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    /// Interface used when none is given on the command line.
    #[serde(default)]
    pub default_interface: Option<String>,

    /// Override for the rescan cadence in watch mode, in seconds.
    #[serde(default)]
    pub scan_interval_secs: Option<u64>,

    /// Credentials replayed when a connect attempt asks for a password.
    #[serde(default)]
    pub networks: Vec<NetworkCredential>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkCredential {
    pub ssid: String,
    pub password: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let path = config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn find_network(&self, ssid: &str) -> Option<&NetworkCredential> {
        self.networks.iter().find(|n| n.ssid == ssid)
    }

    pub fn add_network(&mut self, network: NetworkCredential) {
        // Replace an existing entry for the same SSID.
        self.networks.retain(|n| n.ssid != network.ssid);
        self.networks.push(network);
    }
}

pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join("wifi-tracker").join("config.toml"))
}
