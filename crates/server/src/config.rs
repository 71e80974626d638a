use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use freeroam::DEFAULT_PORT;

/// Server settings, loaded from a TOML file and overridable from the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server_name: String,
    pub port: u16,
    pub max_players: usize,
    /// Sent privately to every player right after they connect; empty
    /// disables it.
    pub welcome_message: String,
    pub npcs_allowed: bool,
    pub mods_allowed: bool,
    pub allowlist: bool,
    pub announce: bool,
    pub master_server: String,
    /// Extension to load from the compiled-in catalog; empty loads none.
    pub extension: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_name: "Freeroam server".to_string(),
            port: DEFAULT_PORT,
            max_players: 32,
            welcome_message: String::new(),
            npcs_allowed: true,
            mods_allowed: false,
            allowlist: false,
            announce: false,
            master_server: "http://master.freeroam-servers.net/".to_string(),
            extension: String::new(),
        }
    }
}

/// Read a TOML config file, falling back to defaults when the file does
/// not exist. A file that exists but fails to parse aborts startup.
pub fn load_toml<T: Default + DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        log::info!("{} not found, using defaults", path.display());
        return Ok(T::default());
    }

    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}
