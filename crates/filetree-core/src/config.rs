use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::listing::DEFAULT_MAX_TAKE;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address the WebSocket listener binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Directory served as the tree root
    #[serde(default)]
    pub root_dir: String,

    /// Hard ceiling for the `take` pagination parameter
    #[serde(default = "default_max_take")]
    pub max_take: u64,

    /// Emit a timing event per tree request
    #[serde(default)]
    pub profile_requests: bool,
}

fn default_bind_addr() -> String {
    "127.0.0.1:7870".to_string()
}

fn default_max_take() -> u64 {
    DEFAULT_MAX_TAKE
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            root_dir: String::new(),
            max_take: default_max_take(),
            profile_requests: false,
        }
    }
}

impl ServiceConfig {
    /// Default config file path for this platform
    pub fn default_path() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("io", "filetree", "server") {
            dirs.config_dir().join("config.json")
        } else {
            PathBuf::from("filetree-config.json")
        }
    }

    /// Load config from a file path
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&data).with_context(|| "failed to parse config JSON")?;
        Ok(config)
    }

    /// Save config to a file path
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: ServiceConfig = serde_json::from_str(r#"{"root_dir":"x"}"#).unwrap();
        assert_eq!(config.root_dir, "x");
        assert_eq!(config.bind_addr, "127.0.0.1:7870");
        assert_eq!(config.max_take, DEFAULT_MAX_TAKE);
        assert!(!config.profile_requests);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = ServiceConfig {
            bind_addr: "0.0.0.0:9000".to_string(),
            root_dir: "/srv/static".to_string(),
            max_take: 250,
            profile_requests: true,
        };
        config.save(&path).unwrap();

        let loaded = ServiceConfig::load(&path).unwrap();
        assert_eq!(loaded.bind_addr, config.bind_addr);
        assert_eq!(loaded.root_dir, config.root_dir);
        assert_eq!(loaded.max_take, 250);
        assert!(loaded.profile_requests);
    }
}
