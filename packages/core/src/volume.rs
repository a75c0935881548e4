//! Volume data model.
//!
//! A [`VolumeRecord`] describes one mount point: where it lives, how big it
//! is and how the engine classified it. Records are built fresh on every
//! rescan and never change after the snapshot holding them is published.

use std::path::{Path, PathBuf};

use nix::unistd::{AccessFlags, access};
use serde::{Deserialize, Serialize};

use crate::capacity::{self, Capacity};

/// Display name of the internal store.
pub const INTERNAL_NAME: &str = "intern";

/// Display name of the primary external store when it is a real card.
pub const PRIMARY_REMOVABLE_NAME: &str = "SD-Card";

/// Display name of the primary external store when it is built in.
pub const PRIMARY_FIXED_NAME: &str = "intern 2";

/// Which role a volume plays, and therefore how its directories resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeKind {
    /// The app-private data partition.
    Internal,
    /// The platform's single official "external storage" directory.
    PrimaryExternal,
    /// Any further mount point found in the mount table.
    Secondary,
}

/// Mount state as the platform reports it.
///
/// Only `Mounted` and `MountedReadOnly` mean the directory can be used.
/// Anything else is "unavailable", which is not the same as "removable":
/// a soldered store shared over a cable to a host computer is `Shared`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaState {
    Mounted,
    MountedReadOnly,
    Shared,
    Unmounted,
    Removed,
}

impl MediaState {
    pub fn is_available(self) -> bool {
        matches!(self, Self::Mounted | Self::MountedReadOnly)
    }

    pub fn is_writeable(self) -> bool {
        self == Self::Mounted
    }

    /// Derives a state from what the directory allows right now.
    pub fn from_access(access: Access) -> Self {
        match (access.available, access.writeable) {
            (true, true) => Self::Mounted,
            (true, false) => Self::MountedReadOnly,
            (false, _) => Self::Removed,
        }
    }
}

/// Result of checking a directory for read and write access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Access {
    /// Exists, is a directory and is readable.
    pub available: bool,
    /// Additionally writable. Never true when `available` is false.
    pub writeable: bool,
}

impl Access {
    pub const NONE: Self = Self {
        available: false,
        writeable: false,
    };

    /// Checks `path` against the calling process's permissions.
    pub fn check(path: &Path) -> Self {
        let available = path.is_dir() && access(path, AccessFlags::R_OK).is_ok();
        Self {
            available,
            writeable: available && access(path, AccessFlags::W_OK).is_ok(),
        }
    }
}

/// One storage volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeRecord {
    /// Absolute mount path; unique within a snapshot.
    pub mount_path: PathBuf,
    /// Vendor label from the mount table, or the mount path for platform volumes.
    pub label: String,
    pub display_name: String,
    /// Present only while the volume is available.
    pub capacity: Option<Capacity>,
    pub removable: bool,
    pub available: bool,
    pub writeable: bool,
    pub kind: VolumeKind,
}

impl VolumeRecord {
    /// Builds the internal store record. It is always available and never
    /// removable.
    pub fn internal(mount_path: impl Into<PathBuf>, capacity: Capacity) -> Self {
        let mount_path = mount_path.into();
        Self {
            label: mount_path.display().to_string(),
            mount_path,
            display_name: INTERNAL_NAME.to_string(),
            capacity: Some(capacity),
            removable: false,
            available: true,
            writeable: true,
            kind: VolumeKind::Internal,
        }
    }

    /// Builds the primary external record from the platform-reported state.
    ///
    /// `capacity` is only consulted when the state is available. The
    /// display name is provisional until the removable flag is settled.
    pub fn primary(
        mount_path: impl Into<PathBuf>,
        state: MediaState,
        removable: bool,
        capacity: impl FnOnce(&Path) -> Capacity,
    ) -> Self {
        let mount_path = mount_path.into();
        let available = state.is_available();
        let capacity = available.then(|| capacity(&mount_path));
        let mut record = Self {
            label: mount_path.display().to_string(),
            mount_path,
            display_name: String::new(),
            capacity,
            removable,
            available,
            writeable: state.is_writeable(),
            kind: VolumeKind::PrimaryExternal,
        };
        record.set_removable(removable);
        record
    }

    /// Builds a secondary record from a mount-table entry.
    pub fn secondary(
        label: impl Into<String>,
        mount_path: impl Into<PathBuf>,
        access: Access,
        capacity: Option<Capacity>,
    ) -> Self {
        let mount_path = mount_path.into();
        Self {
            display_name: last_segment(&mount_path),
            label: label.into(),
            mount_path,
            capacity: if access.available { capacity } else { None },
            removable: true,
            available: access.available,
            writeable: access.available && access.writeable,
            kind: VolumeKind::Secondary,
        }
    }

    /// Updates the removable flag; for the primary store this also picks
    /// the matching display name.
    pub fn set_removable(&mut self, removable: bool) {
        self.removable = removable;
        if self.kind == VolumeKind::PrimaryExternal {
            self.display_name = if removable {
                PRIMARY_REMOVABLE_NAME
            } else {
                PRIMARY_FIXED_NAME
            }
            .to_string();
        }
    }

    /// Marks the volume as unusable, e.g. an alias of another volume.
    pub fn mark_unavailable(&mut self) {
        self.available = false;
        self.writeable = false;
        self.capacity = None;
    }

    /// Current state in platform terms.
    pub fn state(&self) -> MediaState {
        MediaState::from_access(Access {
            available: self.available,
            writeable: self.writeable,
        })
    }

    /// Capacity, or zero when unknown.
    pub fn capacity_or_zero(&self) -> Capacity {
        self.capacity.unwrap_or(Capacity::ZERO)
    }

    /// One-line human summary: name plus "total / free free", or "(missing)".
    ///
    /// Removable volumes show the rounded medium size, since the filesystem
    /// total of a card is always a bit below what is printed on it.
    pub fn summary(&self) -> String {
        match (self.available, self.capacity) {
            (true, Some(capacity)) => {
                let total = if self.removable {
                    capacity.rounded_total()
                } else {
                    capacity.total_bytes
                };
                format!(
                    "{}: {} / {} free",
                    self.display_name,
                    capacity::format_bytes(total),
                    capacity::format_bytes(capacity.free_bytes)
                )
            }
            _ => format!("{} (missing)", self.display_name),
        }
    }
}

/// Last component of a path, or the whole path if it has none.
fn last_segment(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
