//! Storage change notifications.
//!
//! The host delivers an event whenever a volume is inserted, pulled out or
//! shared over a cable. Every event leads to a full rescan; the event's
//! payload is only logged.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::registry::{Inventory, VolumeRegistry};

/// A change to some volume, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "path", rename_all = "snake_case")]
pub enum StorageEvent {
    /// Media was inserted and mounted.
    Mounted(PathBuf),
    /// Media was pulled out before being unmounted.
    BadRemoval(PathBuf),
    Removed(PathBuf),
    /// Media is exported to a host computer and unusable locally.
    Shared(PathBuf),
}

impl StorageEvent {
    pub fn path(&self) -> &Path {
        match self {
            Self::Mounted(path)
            | Self::BadRemoval(path)
            | Self::Removed(path)
            | Self::Shared(path) => path,
        }
    }
}

impl<P: Platform> VolumeRegistry<P> {
    /// Rescans in response to `event` and returns the new snapshot.
    pub fn handle_event(&self, event: &StorageEvent) -> Arc<Inventory> {
        tracing::info!("storage event {:?}, rescanning", event);
        self.rescan()
    }
}

/// Rescans `registry` for every event received on `events` and calls
/// `on_rescan` after each one.
///
/// The worker exits once every sender is dropped.
pub fn spawn_rescan_listener<P, F>(
    registry: Arc<VolumeRegistry<P>>,
    events: Receiver<StorageEvent>,
    mut on_rescan: F,
) -> JoinHandle<()>
where
    P: Platform + 'static,
    F: FnMut(Arc<Inventory>) + Send + 'static,
{
    thread::spawn(move || {
        for event in events {
            let inventory = registry.handle_event(&event);
            on_rescan(inventory);
        }
        tracing::debug!("storage event channel closed, listener stopping");
    })
}
