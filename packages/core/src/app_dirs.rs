//! Per-app directory resolution for each volume kind.
//!
//! - `Internal` delegates to the platform's own app directories.
//! - `PrimaryExternal` delegates to the platform's external app directories
//!   when the generation has them, else synthesizes a path.
//! - `Secondary` always synthesizes `<mount>/Android/data/<package>/...`.
//!
//! Synthesized directories are created on demand when the volume is
//! writeable. Creation failures are not reported: a missing directory is
//! the failure signal.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, IoResultExt, Result};
use crate::platform::{self, AppIdentity, Platform};
use crate::volume::{VolumeKind, VolumeRecord};

const FILES: &str = "files";
const CACHE: &str = "cache";

impl VolumeRecord {
    /// App-private files directory on this volume, optionally a
    /// subdirectory of it.
    pub fn files_dir(
        &self,
        platform: &dyn Platform,
        app: &AppIdentity,
        subpath: Option<&str>,
    ) -> Result<PathBuf> {
        check_app(app)?;
        let subpath = subpath.map(relative).filter(|s| !s.is_empty());

        Ok(match self.kind {
            VolumeKind::Internal => {
                let files = platform.app_files_dir(app);
                match subpath {
                    Some(subpath) => {
                        let dir = files.join(subpath);
                        ensure_dir(&dir);
                        dir
                    }
                    None => files,
                }
            }
            VolumeKind::PrimaryExternal => match platform.external_files_dir(app, subpath) {
                Some(dir) => dir,
                None => self.synthesized(app, FILES, subpath),
            },
            VolumeKind::Secondary => self.synthesized(app, FILES, subpath),
        })
    }

    /// App-private cache directory on this volume.
    pub fn cache_dir(&self, platform: &dyn Platform, app: &AppIdentity) -> Result<PathBuf> {
        check_app(app)?;

        Ok(match self.kind {
            VolumeKind::Internal => platform.app_cache_dir(app),
            VolumeKind::PrimaryExternal => match platform.external_cache_dir(app) {
                Some(dir) => dir,
                None => self.synthesized(app, CACHE, None),
            },
            VolumeKind::Secondary => self.synthesized(app, CACHE, None),
        })
    }

    /// Shared directory for a media category such as `"Music"`.
    ///
    /// Internal storage has no public directories and yields `None`.
    pub fn public_dir(&self, platform: &dyn Platform, category: &str) -> Result<Option<PathBuf>> {
        let category = relative(category);
        if category.is_empty() {
            return Err(Error::invalid_argument("public directory category is empty"));
        }

        Ok(match self.kind {
            VolumeKind::Internal => None,
            VolumeKind::PrimaryExternal => Some(
                platform
                    .external_public_dir(category)
                    .unwrap_or_else(|| self.mount_path.join(category)),
            ),
            VolumeKind::Secondary => Some(self.mount_path.join(category)),
        })
    }

    fn synthesized(&self, app: &AppIdentity, leaf: &str, subpath: Option<&str>) -> PathBuf {
        let mut dir = platform::app_data_path(&self.mount_path, app, leaf);
        if let Some(subpath) = subpath {
            dir.push(subpath);
        }
        if self.writeable {
            ensure_dir(&dir);
        }
        dir
    }
}

fn check_app(app: &AppIdentity) -> Result<()> {
    if app.package_name.trim().is_empty() {
        return Err(Error::invalid_argument("app package name is empty"));
    }
    Ok(())
}

/// Strips leading slashes so the argument joins below a directory instead
/// of replacing it.
fn relative(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Creates `dir` if missing. Failures are logged at debug and otherwise
/// ignored.
pub(crate) fn ensure_dir(dir: &Path) {
    if dir.is_dir() {
        return;
    }
    if let Err(e) = fs::create_dir_all(dir).dir_create_context(dir) {
        tracing::debug!("{}", e);
    }
}
