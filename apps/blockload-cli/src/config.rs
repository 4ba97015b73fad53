//! CLI configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/blockload/config.toml`
//! - Windows: `%APPDATA%/blockload/config.toml`

use std::path::{Path, PathBuf};

use anyhow::Context;
use blockload_protocol::UploadTarget;
use blockload_uploader::UploadOptions;
use serde::{Deserialize, Serialize};

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Base64 AES-256 key used for `--encrypt` and decrypting downloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,

    /// Defaults for `upload`.
    #[serde(default)]
    pub upload: UploadOptions,

    /// Object the commands act on when `--url` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<UploadTarget>,

    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Config {
    /// Loads `path`, or the default location when `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = config_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Config {
                        path: Some(path),
                        ..Config::default()
                    })
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.path = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Saves to the file this config was loaded from.
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => config_path()?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        // The file may hold an encryption key.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(path)
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("blockload")
            .join("config.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("blockload").join("config.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/blockload/config.toml"))
    }
}
