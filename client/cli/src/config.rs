use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub server_url: Option<String>,
    pub token: Option<String>,
}

impl Config {
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "stowage", "stow")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Apply command-line overrides on top of the saved values
    pub fn with_overrides(mut self, server: Option<String>, token: Option<String>) -> Self {
        if server.is_some() {
            self.server_url = server;
        }
        if token.is_some() {
            self.token = token;
        }
        self
    }

    pub fn require_auth(&self) -> anyhow::Result<(&str, &str)> {
        let server = self
            .server_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No server configured. Run: stow login"))?;
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Not logged in. Run: stow login"))?;
        Ok((server, token))
    }
}
