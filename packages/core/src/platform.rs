//! Host platform interface.
//!
//! Everything the engine asks of the host goes through [`Platform`]: where
//! the internal and external stores live, what the platform believes about
//! them, where the mount tables are, and the per-app directory primitives
//! that [`crate::app_dirs`] proxies to.
//!
//! Several queries only exist on newer platform generations. Those return
//! `Option`, with `None` meaning "not available here", so callers can fall
//! back instead of guessing.

use std::path::{Path, PathBuf};

use crate::app_dirs;
use crate::capacity::{self, Capacity, ProbeStrategy};
use crate::config::HostConfig;
use crate::volume::{Access, MediaState};

/// Platform API generation, as a monotonically increasing level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlatformGeneration(pub u32);

impl PlatformGeneration {
    /// First generation with per-app directories on external storage.
    pub const EXTERNAL_APP_DIRS: Self = Self(8);
    /// First generation that can answer "is external storage removable" and
    /// report exact usable/total space.
    pub const REMOVABLE_QUERY: Self = Self(9);
    /// First generation that can answer "is external storage emulated".
    pub const EMULATED_QUERY: Self = Self(11);

    pub fn has_external_app_dirs(self) -> bool {
        self >= Self::EXTERNAL_APP_DIRS
    }

    pub fn has_removable_query(self) -> bool {
        self >= Self::REMOVABLE_QUERY
    }

    pub fn has_emulated_query(self) -> bool {
        self >= Self::EMULATED_QUERY
    }

    /// Capacity strategy available on this generation.
    pub fn probe_strategy(self) -> ProbeStrategy {
        if self >= Self::REMOVABLE_QUERY {
            ProbeStrategy::Exact
        } else {
            ProbeStrategy::BlockCount
        }
    }
}

/// The application on whose behalf directories are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub package_name: String,
}

impl AppIdentity {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
        }
    }
}

/// The host platform, as seen by the volume engine.
pub trait Platform: Send + Sync {
    fn generation(&self) -> PlatformGeneration;

    /// The app-private data partition.
    fn internal_storage_dir(&self) -> PathBuf;

    /// The single official "external storage" directory.
    fn external_storage_dir(&self) -> PathBuf;

    fn external_storage_state(&self) -> MediaState;

    /// Direct removability query; `None` on generations without it.
    fn is_external_storage_removable(&self) -> Option<bool>;

    /// Whether internal and external storage share one partition; `None` on
    /// generations without the query.
    fn is_external_storage_emulated(&self) -> Option<bool>;

    /// Mount table files, in the order they should be tried.
    fn mount_table_paths(&self) -> Vec<PathBuf>;

    /// App-private files directory on internal storage.
    fn app_files_dir(&self, app: &AppIdentity) -> PathBuf;

    /// App-private cache directory on internal storage.
    fn app_cache_dir(&self, app: &AppIdentity) -> PathBuf;

    /// App-private files directory on the primary external store.
    fn external_files_dir(&self, app: &AppIdentity, subpath: Option<&str>) -> Option<PathBuf>;

    /// App-private cache directory on the primary external store.
    fn external_cache_dir(&self, app: &AppIdentity) -> Option<PathBuf>;

    /// Shared directory for a media category on the primary external store.
    fn external_public_dir(&self, category: &str) -> Option<PathBuf>;

    /// Measures the filesystem behind `path`. Never fails; see [`capacity::probe`].
    fn probe_capacity(&self, path: &Path) -> Capacity {
        capacity::probe(Some(path), self.generation().probe_strategy())
    }
}

/// Conventional per-app layout below a storage root.
pub const APP_DATA_DIR: &str = "Android/data";

/// `<root>/Android/data/<package>/<leaf>`.
pub fn app_data_path(root: &Path, app: &AppIdentity, leaf: &str) -> PathBuf {
    root.join(APP_DATA_DIR).join(&app.package_name).join(leaf)
}

/// [`Platform`] for a Linux host, described by a [`HostConfig`].
///
/// Useful for inspecting unpacked device images or emulator filesystems.
#[derive(Debug, Clone)]
pub struct HostPlatform {
    config: HostConfig,
}

impl HostPlatform {
    pub fn new(config: HostConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Creates `path` if the external store is writeable; failures are silent.
    fn ensure_external_dir(&self, path: PathBuf) -> PathBuf {
        if self.external_storage_state().is_writeable() {
            app_dirs::ensure_dir(&path);
        }
        path
    }
}

impl Platform for HostPlatform {
    fn generation(&self) -> PlatformGeneration {
        PlatformGeneration(self.config.api_level)
    }

    fn internal_storage_dir(&self) -> PathBuf {
        self.config.internal_dir.clone()
    }

    fn external_storage_dir(&self) -> PathBuf {
        self.config.external_dir.clone()
    }

    fn external_storage_state(&self) -> MediaState {
        self.config
            .external_state
            .unwrap_or_else(|| MediaState::from_access(Access::check(&self.config.external_dir)))
    }

    fn is_external_storage_removable(&self) -> Option<bool> {
        if !self.generation().has_removable_query() {
            return None;
        }
        self.config.external_removable
    }

    fn is_external_storage_emulated(&self) -> Option<bool> {
        if !self.generation().has_emulated_query() {
            return None;
        }
        Some(same_device(
            &self.config.internal_dir,
            &self.config.external_dir,
        ))
    }

    fn mount_table_paths(&self) -> Vec<PathBuf> {
        let etc = self.config.system_root.join("etc");
        self.config
            .mount_table_names
            .iter()
            .map(|name| etc.join(name))
            .collect()
    }

    fn app_files_dir(&self, app: &AppIdentity) -> PathBuf {
        self.config
            .internal_dir
            .join("data")
            .join(&app.package_name)
            .join("files")
    }

    fn app_cache_dir(&self, app: &AppIdentity) -> PathBuf {
        self.config
            .internal_dir
            .join("data")
            .join(&app.package_name)
            .join("cache")
    }

    fn external_files_dir(&self, app: &AppIdentity, subpath: Option<&str>) -> Option<PathBuf> {
        if !self.generation().has_external_app_dirs() {
            return None;
        }
        let mut path = app_data_path(&self.config.external_dir, app, "files");
        if let Some(subpath) = subpath {
            path.push(subpath.trim_start_matches('/'));
        }
        Some(self.ensure_external_dir(path))
    }

    fn external_cache_dir(&self, app: &AppIdentity) -> Option<PathBuf> {
        if !self.generation().has_external_app_dirs() {
            return None;
        }
        let path = app_data_path(&self.config.external_dir, app, "cache");
        Some(self.ensure_external_dir(path))
    }

    fn external_public_dir(&self, category: &str) -> Option<PathBuf> {
        if !self.generation().has_external_app_dirs() {
            return None;
        }
        Some(
            self.config
                .external_dir
                .join(category.trim_start_matches('/')),
        )
    }
}

/// True if both paths live on the same device. Unreadable paths never match.
fn same_device(a: &Path, b: &Path) -> bool {
    use nix::sys::stat::stat;

    match (stat(a), stat(b)) {
        (Ok(a), Ok(b)) => a.st_dev == b.st_dev,
        _ => false,
    }
}
