//! Read-only queries over a published [`Inventory`].
//!
//! Nothing here scans or blocks; every answer comes from the snapshot it is
//! called on. Absence (no secondary volume, no record for a path) is an
//! `Option::None`, never an error.

use std::path::Path;

use crate::registry::Inventory;
use crate::volume::{MediaState, VolumeRecord};

/// Which records [`Inventory::list`] returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Case-insensitive substring of the display name; applies to
    /// secondaries only.
    pub name: Option<String>,
    pub only_available: bool,
    pub include_primary: bool,
    pub include_internal: bool,
}

impl ListFilter {
    /// Primary plus every secondary, available or not.
    pub fn external() -> Self {
        Self {
            include_primary: true,
            ..Self::default()
        }
    }

    /// Every record in the snapshot.
    pub fn all() -> Self {
        Self {
            include_primary: true,
            include_internal: true,
            ..Self::default()
        }
    }
}

impl Inventory {
    /// Internal first, then primary, then matching secondaries in
    /// mount-table order.
    pub fn list(&self, filter: &ListFilter) -> Vec<&VolumeRecord> {
        let needle = filter.name.as_deref().map(str::to_lowercase);
        let usable = |record: &VolumeRecord| !filter.only_available || record.available;

        let mut records = Vec::new();
        if filter.include_internal && usable(&self.internal) {
            records.push(&self.internal);
        }
        if filter.include_primary && usable(&self.primary) {
            records.push(&self.primary);
        }
        records.extend(self.secondaries.iter().filter(|&record| {
            usable(record)
                && needle
                    .as_deref()
                    .is_none_or(|n| record.display_name.to_lowercase().contains(n))
        }));
        records
    }

    pub fn internal(&self) -> &VolumeRecord {
        &self.internal
    }

    pub fn primary(&self) -> &VolumeRecord {
        &self.primary
    }

    /// The first secondary candidate, even when it is currently unavailable.
    pub fn secondary(&self) -> Option<&VolumeRecord> {
        self.secondaries.first()
    }

    pub fn is_storage_emulated(&self) -> bool {
        self.emulated
    }

    pub fn is_primary_removable(&self) -> bool {
        self.primary.removable
    }

    /// Media state of the secondary volume; `None` when there is none.
    pub fn secondary_state(&self) -> Option<MediaState> {
        self.secondary().map(VolumeRecord::state)
    }

    pub fn is_secondary_available(&self) -> bool {
        self.secondary().is_some_and(|s| s.available)
    }

    /// Secondary volumes come from card slots and USB ports.
    pub fn is_secondary_removable(&self) -> bool {
        true
    }

    /// Mount point of the secondary volume, if it can be used right now.
    pub fn secondary_directory(&self) -> Option<&Path> {
        self.secondary()
            .filter(|s| s.available)
            .map(|s| s.mount_path.as_path())
    }

    /// The record whose mount point contains `path`. Nested mount points
    /// resolve to the deepest one.
    pub fn find_by_path(&self, path: &Path) -> Option<&VolumeRecord> {
        self.records()
            .filter(|record| path.starts_with(&record.mount_path))
            .max_by_key(|record| record.mount_path.components().count())
    }

    /// Where to put data when the caller has no preference: the primary
    /// store while it is available, internal storage otherwise.
    pub fn default_volume(&self) -> &VolumeRecord {
        if self.primary.available {
            &self.primary
        } else {
            &self.internal
        }
    }

    /// Resolves a previously chosen mount path, or the default when there
    /// is no choice yet.
    pub fn resolve_preferred(&self, preferred: Option<&Path>) -> Option<&VolumeRecord> {
        match preferred {
            Some(path) => self.find_by_path(path),
            None => Some(self.default_volume()),
        }
    }
}
