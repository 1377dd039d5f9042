use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AdapterError;
use crate::operations::path_utils::normalize_root;

static SETTINGS_FILE_NAME: &str = "settings.json";

/// Option keys understood by `AdapterConfig::from_options`
pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const ROOT_KEY: &str = "root";
pub const TEMP_DIR_KEY: &str = "temp_dir";

/// Immutable adapter configuration, validated on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterConfig {
    access_token: String,
    root: String,
    temp_dir: PathBuf,
}

impl AdapterConfig {
    /// Fails fast when the access token is empty.
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(AdapterError::InvalidConfig("access_token must not be empty".into()).into());
        }
        Ok(Self {
            access_token,
            root: "/".to_string(),
            temp_dir: std::env::temp_dir(),
        })
    }

    pub fn with_root(mut self, root: &str) -> Self {
        self.root = normalize_root(root);
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    /// Build from a loosely-typed option map (`access_token`, `root`, `temp_dir`).
    pub fn from_options(options: &HashMap<String, String>) -> Result<Self> {
        let access_token = options.get(ACCESS_TOKEN_KEY).ok_or_else(|| {
            AdapterError::InvalidConfig(format!("missing required option '{}'", ACCESS_TOKEN_KEY))
        })?;

        let mut config = Self::new(access_token.as_str())?;
        if let Some(root) = options.get(ROOT_KEY) {
            config = config.with_root(root);
        }
        if let Some(temp_dir) = options.get(TEMP_DIR_KEY) {
            config = config.with_temp_dir(temp_dir);
        }
        Ok(config)
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Normalized root, always starting and ending with `/`.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }
}

pub struct ProjectConfig {
    pub settings: Settings,
    pub project_dirs: ProjectDirs,
}

impl ProjectConfig {
    /// Load settings from the per-user config directory, creating it on first use.
    pub fn new() -> Result<Self> {
        let proj_dirs = Self::project_dirs()?;
        let settings = Settings::new(&proj_dirs.config_dir().join(SETTINGS_FILE_NAME))?;
        Ok(Self {
            settings,
            project_dirs: proj_dirs,
        })
    }

    /// Per-user config and data directories, created if missing.
    pub fn project_dirs() -> Result<ProjectDirs> {
        let proj_dirs = ProjectDirs::from("com", "bdfs", "baidu-netdisk-fs")
            .ok_or_else(|| anyhow!("Failed to get project directories"))?;
        for x in [proj_dirs.config_dir(), proj_dirs.data_dir()] {
            if !x.exists() {
                fs::create_dir_all(x).context("Failed to create config directory")?;
            }
        }
        Ok(proj_dirs)
    }
}

/// On-disk settings for the `bdfs` command line tool.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Settings {
    /// Load the settings file, writing a default one only when none exists.
    /// An unreadable file is an error and is never replaced.
    pub fn new(config_file_path: &Path) -> Result<Self> {
        if !config_file_path.exists() {
            warn!(
                "No settings file at {} - creating default config",
                config_file_path.display()
            );
            let default = Self::default();
            default.save_to_file(config_file_path)?;
            return Ok(default);
        }
        Self::load_settings_from_file(config_file_path)
    }

    pub fn load_settings_from_file(config_file_path: &Path) -> Result<Self> {
        if !config_file_path.exists() {
            return Err(anyhow!("Config file not found"));
        }
        let data = fs::read_to_string(config_file_path).with_context(|| {
            format!("Failed to read settings file {}", config_file_path.display())
        })?;
        let settings: Self = serde_json::from_str(&data).with_context(|| {
            format!("Failed to parse settings file {}", config_file_path.display())
        })?;
        Ok(settings)
    }

    pub fn save_to_file(&self, config_file_path: &Path) -> Result<()> {
        if let Some(parent_path) = config_file_path.parent() {
            fs::create_dir_all(parent_path).context("Failed to create config directory")?;
        }

        let data = serde_json::to_string_pretty(self)?;
        fs::write(config_file_path, data)?;
        Ok(())
    }

    pub fn to_adapter_config(&self) -> Result<AdapterConfig> {
        let access_token = self.access_token.as_deref().ok_or_else(|| {
            AdapterError::InvalidConfig(format!("missing required option '{}'", ACCESS_TOKEN_KEY))
        })?;

        let mut config = AdapterConfig::new(access_token)?;
        if let Some(root) = &self.root {
            config = config.with_root(root);
        }
        if let Some(temp_dir) = &self.temp_dir {
            config = config.with_temp_dir(temp_dir);
        }
        Ok(config)
    }
}
