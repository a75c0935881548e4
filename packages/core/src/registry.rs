//! Volume registry: rescans and the published inventory.
//!
//! A rescan builds the internal and primary records from platform state,
//! streams the mount table through the parser, settles the primary's
//! removable flag and publishes a new immutable [`Inventory`]. Readers only
//! ever see a complete snapshot: publishing is a single `Arc` swap.
//!
//! Rescans are serialized by a dedicated mutex, so two concurrent rescans
//! can never interleave and publish a snapshot whose secondaries were built
//! against a different primary.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::Serialize;

use crate::heuristics::{self, RemovableEvidence};
use crate::mount_table::{self, PrimaryRef};
use crate::platform::Platform;
use crate::volume::VolumeRecord;

/// Where the mount table data of a snapshot came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MountTableReport {
    /// File the candidates were parsed from, if any could be opened.
    pub source: Option<PathBuf>,
    /// Whether that file was read to the end.
    pub complete: bool,
    /// Rendered read error, if any.
    pub error: Option<String>,
}

/// One immutable, fully built inventory of volumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inventory {
    pub(crate) internal: VolumeRecord,
    pub(crate) primary: VolumeRecord,
    /// Secondary candidates in mount-table order; the first is "the"
    /// secondary volume.
    pub(crate) secondaries: Vec<VolumeRecord>,
    /// Internal and primary external storage share one partition.
    pub(crate) emulated: bool,
    pub(crate) mount_table: MountTableReport,
}

impl Inventory {
    /// Every record in the snapshot: internal, primary, then secondaries.
    pub fn records(&self) -> impl Iterator<Item = &VolumeRecord> {
        [&self.internal, &self.primary]
            .into_iter()
            .chain(self.secondaries.iter())
    }

    pub fn secondaries(&self) -> &[VolumeRecord] {
        &self.secondaries
    }

    pub fn mount_table(&self) -> &MountTableReport {
        &self.mount_table
    }
}

/// Owns the platform handle and the current snapshot.
pub struct VolumeRegistry<P> {
    platform: P,
    rescan_lock: Mutex<()>,
    current: RwLock<Option<Arc<Inventory>>>,
}

impl<P: Platform> VolumeRegistry<P> {
    /// Creates a registry without scanning. Call [`Self::rescan`] or
    /// [`Self::inventory`] before querying.
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            rescan_lock: Mutex::new(()),
            current: RwLock::new(None),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// The current snapshot, if one was published. Never scans.
    pub fn snapshot(&self) -> Option<Arc<Inventory>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current snapshot, scanning first if none exists yet.
    ///
    /// Concurrent first calls perform a single scan.
    pub fn inventory(&self) -> Arc<Inventory> {
        if let Some(inventory) = self.snapshot() {
            return inventory;
        }

        let _guard = self.rescan_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have finished the first scan while we waited.
        if let Some(inventory) = self.snapshot() {
            return inventory;
        }
        self.rescan_locked()
    }

    /// Rebuilds the inventory from scratch and publishes it.
    ///
    /// Blocks on filesystem calls; keep it off latency-sensitive threads.
    pub fn rescan(&self) -> Arc<Inventory> {
        let _guard = self.rescan_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.rescan_locked()
    }

    fn rescan_locked(&self) -> Arc<Inventory> {
        let inventory = Arc::new(build_inventory(&self.platform));
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(inventory.clone());
        // Freed only after the write guard is released.
        drop(previous);
        inventory
    }
}

/// Runs one full scan against `platform`.
pub fn build_inventory(platform: &impl Platform) -> Inventory {
    let probe = |path: &Path| platform.probe_capacity(path);

    let internal_dir = platform.internal_storage_dir();
    let internal = VolumeRecord::internal(&internal_dir, probe(&internal_dir));

    let platform_removable = platform.is_external_storage_removable();
    let mut primary = VolumeRecord::primary(
        platform.external_storage_dir(),
        platform.external_storage_state(),
        platform_removable.unwrap_or(false),
        probe,
    );

    let scan = mount_table::parse_first_readable(
        &platform.mount_table_paths(),
        PrimaryRef::of(&primary),
        &probe,
    );
    let mount_table = MountTableReport {
        complete: scan.is_complete(),
        error: scan.error.as_ref().map(|e| e.to_string()),
        source: scan.source,
    };
    if let Some(e) = &mount_table.error {
        tracing::error!("mount table unusable, continuing with platform volumes: {}", e);
    }

    let secondaries = dedup_candidates(scan.parsed.candidates, &primary.mount_path);

    let removable = heuristics::resolve_primary_removable(&RemovableEvidence {
        platform_reported: platform_removable,
        corrections: &scan.parsed.corrections,
        secondary_found: !secondaries.is_empty(),
    });
    primary.set_removable(removable);

    let emulated = if secondaries.is_empty() {
        false
    } else {
        platform.is_external_storage_emulated().unwrap_or(false)
    };

    tracing::info!(
        "rescan: primary {} (removable: {}, available: {}), {} secondary candidate(s), emulated: {}",
        primary.mount_path.display(),
        primary.removable,
        primary.available,
        secondaries.len(),
        emulated
    );

    Inventory {
        internal,
        primary,
        secondaries,
        emulated,
        mount_table,
    }
}

/// Drops candidates that duplicate the primary or an earlier candidate.
fn dedup_candidates(candidates: Vec<VolumeRecord>, primary: &Path) -> Vec<VolumeRecord> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| c.mount_path != primary && seen.insert(c.mount_path.clone()))
        .collect()
}
