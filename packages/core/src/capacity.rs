//! Capacity probing for mounted volumes.
//!
//! The only numeric query the engine makes against the host. A probe never
//! fails visibly: any error (missing path, permission problem, unsupported
//! filesystem) degrades to [`Capacity::ZERO`], which callers read as
//! "no capacity known".

use std::path::Path;

use serde::Serialize;

const MIB: u64 = 1024 * 1024;

/// Free and total bytes of the filesystem backing a directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capacity {
    /// Bytes available to an unprivileged writer.
    pub free_bytes: u64,
    /// Total size of the filesystem in bytes.
    pub total_bytes: u64,
}

impl Capacity {
    /// The value returned for failed or skipped probes.
    pub const ZERO: Self = Self {
        free_bytes: 0,
        total_bytes: 0,
    };

    pub fn new(free_bytes: u64, total_bytes: u64) -> Self {
        Self {
            free_bytes,
            total_bytes,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.free_bytes == 0 && self.total_bytes == 0
    }

    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }

    /// Guesses the marketed size of the medium.
    ///
    /// Returns the next power of two at or above `total_bytes`, but never
    /// less than 1 MiB. A 14 GiB filesystem on a "16 GB" card reports 16 GiB.
    /// Only meaningful when the volume holds a single partition.
    pub fn rounded_total(&self) -> u64 {
        self.total_bytes
            .max(MIB)
            .checked_next_power_of_two()
            .unwrap_or(u64::MAX)
    }
}

/// How the probe talks to the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStrategy {
    /// `statvfs`: usable blocks times fragment size.
    Exact,
    /// `statfs`: available block count times block size. Used on platform
    /// generations without the exact query.
    BlockCount,
}

/// Probes the filesystem that backs `path`.
///
/// `None` yields [`Capacity::ZERO`]; so does any I/O error.
pub fn probe(path: Option<&Path>, strategy: ProbeStrategy) -> Capacity {
    let Some(path) = path else {
        return Capacity::ZERO;
    };

    let result = match strategy {
        ProbeStrategy::Exact => probe_statvfs(path),
        ProbeStrategy::BlockCount => probe_statfs(path),
    };

    match result {
        Ok(capacity) => capacity,
        Err(e) => {
            tracing::debug!("capacity probe failed for {}: {}", path.display(), e);
            Capacity::ZERO
        }
    }
}

#[allow(clippy::unnecessary_cast)]
fn probe_statvfs(path: &Path) -> nix::Result<Capacity> {
    let stat = nix::sys::statvfs::statvfs(path)?;
    let fragment = stat.fragment_size() as u64;
    Ok(Capacity::new(
        (stat.blocks_available() as u64).saturating_mul(fragment),
        (stat.blocks() as u64).saturating_mul(fragment),
    ))
}

#[allow(clippy::unnecessary_cast)]
fn probe_statfs(path: &Path) -> nix::Result<Capacity> {
    let stat = nix::sys::statfs::statfs(path)?;
    let block_size = u64::try_from(stat.block_size()).unwrap_or(0);
    Ok(Capacity::new(
        (stat.blocks_available() as u64).saturating_mul(block_size),
        (stat.blocks() as u64).saturating_mul(block_size),
    ))
}

/// Formats a byte count the short way ("1.5 GB", "512 MB").
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else if value < 10.0 {
        format!("{:.1} {}", value, UNITS[unit])
    } else {
        format!("{:.0} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_rounded_total_rounds_up_to_power_of_two() {
        assert_eq!(Capacity::new(0, 14 * GIB).rounded_total(), 16 * GIB);
        assert_eq!(Capacity::new(0, 16 * GIB).rounded_total(), 16 * GIB);
        assert_eq!(Capacity::new(0, 16 * GIB + 1).rounded_total(), 32 * GIB);
    }

    #[test]
    fn test_rounded_total_has_floor() {
        assert_eq!(Capacity::ZERO.rounded_total(), MIB);
        assert_eq!(Capacity::new(0, 4096).rounded_total(), MIB);
    }

    #[test]
    fn test_rounded_total_saturates() {
        assert_eq!(Capacity::new(0, u64::MAX).rounded_total(), u64::MAX);
    }

    #[test]
    fn test_probe_absent_path_is_zero() {
        assert_eq!(probe(None, ProbeStrategy::Exact), Capacity::ZERO);
        assert_eq!(probe(None, ProbeStrategy::BlockCount), Capacity::ZERO);
    }

    #[test]
    fn test_probe_missing_path_is_zero() {
        let missing = Path::new("/definitely/not/a/mount/point");
        assert_eq!(probe(Some(missing), ProbeStrategy::Exact), Capacity::ZERO);
        assert_eq!(
            probe(Some(missing), ProbeStrategy::BlockCount),
            Capacity::ZERO
        );
    }

    #[test]
    fn test_probe_real_directory() {
        let dir = tempdir().unwrap();

        for strategy in [ProbeStrategy::Exact, ProbeStrategy::BlockCount] {
            let capacity = probe(Some(dir.path()), strategy);
            assert!(capacity.total_bytes > 0, "{strategy:?} reported no size");
            assert!(capacity.free_bytes <= capacity.total_bytes);
        }
    }

    #[test]
    fn test_used_bytes_never_underflows() {
        assert_eq!(Capacity::new(10, 4).used_bytes(), 0);
        assert_eq!(Capacity::new(4, 10).used_bytes(), 6);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(16 * GIB), "16 GB");
        assert_eq!(format_bytes(512 * MIB), "512 MB");
    }
}
