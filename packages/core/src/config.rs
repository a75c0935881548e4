//! Host configuration.
//!
//! Describes the directories and platform answers that
//! [`crate::platform::HostPlatform`] reports. Values are merged from
//! defaults, an optional JSON file and environment overrides, in that order.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{ConfigParseSnafu, Error, IoResultExt, Result};
use crate::mount_table::DEFAULT_TABLE_NAMES;
use crate::volume::MediaState;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "VOLD_INVENTORY_CONFIG";

/// Default API level; new enough for every version-gated query.
pub const DEFAULT_API_LEVEL: u32 = 16;

/// Default app identity used for directory resolution.
pub const DEFAULT_PACKAGE: &str = "de.example.volumes";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Platform generation; see [`crate::platform::PlatformGeneration`].
    pub api_level: u32,
    /// Mount tables are read from `<system_root>/etc/<name>`.
    pub system_root: PathBuf,
    /// Mount table file names, tried in order.
    pub mount_table_names: Vec<String>,
    pub internal_dir: PathBuf,
    pub external_dir: PathBuf,
    /// Platform mount state of the external store; derived from directory
    /// access when unset.
    pub external_state: Option<MediaState>,
    /// Answer of the direct removable query, if the platform has one.
    pub external_removable: Option<bool>,
    pub package_name: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            api_level: DEFAULT_API_LEVEL,
            system_root: PathBuf::from("/system"),
            mount_table_names: DEFAULT_TABLE_NAMES.iter().map(|s| s.to_string()).collect(),
            internal_dir: PathBuf::from("/data"),
            external_dir: PathBuf::from("/mnt/sdcard"),
            external_state: None,
            external_removable: None,
            package_name: DEFAULT_PACKAGE.to_string(),
        }
    }
}

impl HostConfig {
    /// Loads configuration: defaults, then the config file, then environment.
    ///
    /// The file is taken from `explicit_path`, else `$VOLD_INVENTORY_CONFIG`,
    /// else `<config dir>/vold-inventory/config.json`. Only an explicitly
    /// named file has to exist.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let named = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut config = match (&named, default_config_path()) {
            (Some(path), _) => Self::from_file(path)?,
            (None, Some(path)) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).config_read_context(path)?;
        serde_json::from_str(&content).context(ConfigParseSnafu { path })
    }

    /// Applies `VOLD_*` overrides looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(level) = var("VOLD_API_LEVEL") {
            self.api_level = level.trim().parse().map_err(|_| Error::InvalidConfigValue {
                key: "VOLD_API_LEVEL".to_string(),
                value: level.clone(),
            })?;
        }
        if let Some(root) = var("VOLD_SYSTEM_ROOT") {
            self.system_root = PathBuf::from(root);
        }
        if let Some(dir) = var("VOLD_INTERNAL_DIR") {
            self.internal_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("VOLD_EXTERNAL_DIR") {
            self.external_dir = PathBuf::from(dir);
        }
        if let Some(package) = var("VOLD_PACKAGE") {
            self.package_name = package;
        }
        Ok(())
    }

    /// Checks that values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.mount_table_names.iter().all(|n| n.trim().is_empty()) {
            return Err(invalid("mount_table_names", "[]"));
        }
        if self.package_name.trim().is_empty() {
            return Err(invalid("package_name", &self.package_name));
        }
        for (key, dir) in [
            ("system_root", &self.system_root),
            ("internal_dir", &self.internal_dir),
            ("external_dir", &self.external_dir),
        ] {
            if !dir.is_absolute() {
                return Err(invalid(key, &dir.display().to_string()));
            }
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str) -> Error {
    Error::InvalidConfigValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// `<config dir>/vold-inventory/config.json`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("vold-inventory").join("config.json"))
}
