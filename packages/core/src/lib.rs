//! vold-inventory-core: storage volume inventory for devices whose platform
//! only exposes a single "external storage" directory.
//!
//! The vendor mount table (`vold.fstab`) usually knows about more volumes
//! than the platform admits to: a second card slot, USB mass storage, or the
//! fact that "external storage" is really soldered flash. This library
//! reads that table, reconciles it with the platform's hints and publishes
//! an immutable inventory of typed volume records.
//!
//! # Modules
//!
//! - [`capacity`]: Free/total space probing that never fails
//! - [`volume`]: Volume records, kinds and mount states
//! - [`mount_table`]: Streaming `vold.fstab` parser
//! - [`heuristics`]: Removability rules for the primary external store
//! - [`registry`]: Rescans and atomically published snapshots
//! - [`query`]: Read-only queries over a snapshot
//! - [`app_dirs`]: Per-app files/cache/public directories on each volume
//! - [`platform`]: Host platform interface and a Linux host implementation
//! - [`events`]: Storage change notifications that trigger rescans
//! - [`config`]: Host configuration
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```no_run
//! use vold_inventory_core::{AppIdentity, HostConfig, HostPlatform, ListFilter, VolumeRegistry};
//!
//! let config = HostConfig::load(None).unwrap();
//! let registry = VolumeRegistry::new(HostPlatform::new(config));
//! let inventory = registry.rescan();
//!
//! for volume in inventory.list(&ListFilter::all()) {
//!     println!("{}", volume.summary());
//! }
//!
//! if let Some(card) = inventory.secondary() {
//!     let app = AppIdentity::new("org.example.app");
//!     let files = card.files_dir(registry.platform(), &app, None).unwrap();
//!     println!("app files on card: {}", files.display());
//! }
//! ```

pub mod app_dirs;
pub mod capacity;
pub mod config;
pub mod error;
pub mod events;
pub mod heuristics;
pub mod mount_table;
pub mod platform;
pub mod query;
pub mod registry;
pub mod volume;

// Re-export commonly used types
pub use capacity::Capacity;
pub use config::HostConfig;
pub use error::{Error, Result};
pub use events::{StorageEvent, spawn_rescan_listener};
pub use platform::{AppIdentity, HostPlatform, Platform, PlatformGeneration};
pub use query::ListFilter;
pub use registry::{Inventory, MountTableReport, VolumeRegistry};
pub use volume::{MediaState, VolumeKind, VolumeRecord};
