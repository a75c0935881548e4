//! Mount table (`vold.fstab`) parsing.
//!
//! The mount table is a vendor configuration file for the volume daemon.
//! There is no canonical grammar, so the parser only understands the few
//! directives that matter for discovering volumes and ignores the rest:
//!
//! ```text
//! discard = disable
//! dev_mount sdcard /mnt/sdcard auto /devices/platform/... encryptable_nonremovable
//! dev_mount extsd  /mnt/extSdCard auto /devices/platform/...
//! ```
//!
//! Each `dev_mount` line other than the primary store's own entry becomes a
//! candidate [`VolumeRecord`]. The primary's entry, and `discard` directives
//! seen before it, only produce [`Correction`]s for the primary record.
//! The scan is single pass and order sensitive.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::capacity::Capacity;
use crate::error::{Error, IoResultExt};
use crate::heuristics::{Correction, CorrectionReason};
use crate::volume::{Access, VolumeRecord};

/// Directive declaring a mountable device.
pub const DEV_MOUNT: &str = "dev_mount";

/// Directive some vendors put before the primary entry.
pub const DISCARD: &str = "discard";

/// Mount table file names, in the order they are tried.
pub const DEFAULT_TABLE_NAMES: [&str; 2] = ["vold.fstab", "vold.conf"];

/// What the parser needs to know about the already-established primary store.
#[derive(Debug, Clone, Copy)]
pub struct PrimaryRef<'a> {
    pub mount_path: &'a Path,
    pub capacity: Option<Capacity>,
}

impl<'a> PrimaryRef<'a> {
    pub fn of(record: &'a VolumeRecord) -> Self {
        Self {
            mount_path: &record.mount_path,
            capacity: record.capacity,
        }
    }
}

/// Everything extracted from one mount table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMountTable {
    /// Candidate secondary volumes, in file order.
    pub candidates: Vec<VolumeRecord>,
    /// Corrections for the primary record, in file order.
    pub corrections: Vec<Correction>,
    /// Whether the primary's own `dev_mount` entry was seen.
    pub past_primary_entry: bool,
}

/// Outcome of reading one or more mount table files.
///
/// A failed read keeps whatever was parsed before the failure.
#[derive(Debug, Default)]
pub struct MountTableScan {
    /// File the results came from.
    pub source: Option<PathBuf>,
    pub parsed: ParsedMountTable,
    pub error: Option<Error>,
}

impl MountTableScan {
    /// True if the source file was read to the end.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Streaming mount table parser.
///
/// Feed it lines with [`MountTableParser::feed_line`] and collect the
/// result with [`MountTableParser::finish`].
pub struct MountTableParser<'a> {
    primary: PrimaryRef<'a>,
    probe: &'a dyn Fn(&Path) -> Capacity,
    before_primary_entry: bool,
    parsed: ParsedMountTable,
}

impl<'a> MountTableParser<'a> {
    /// Creates a parser that checks candidates against `primary` and
    /// measures them with `probe`.
    pub fn new(primary: PrimaryRef<'a>, probe: &'a dyn Fn(&Path) -> Capacity) -> Self {
        Self {
            primary,
            probe,
            before_primary_entry: true,
            parsed: ParsedMountTable::default(),
        }
    }

    /// Processes one line. Unknown directives and malformed lines are skipped.
    pub fn feed_line(&mut self, line: &str) {
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            return;
        };

        if keyword == DEV_MOUNT {
            self.dev_mount(tokens);
        } else if self.before_primary_entry
            && let Some(value) = discard_value(keyword, tokens)
        {
            self.discard(value);
        }
    }

    /// Reads lines until end of input or the first I/O error.
    ///
    /// Bytes that are not UTF-8 are replaced, so a stray Latin-1 comment
    /// does not end the scan.
    pub fn read(&mut self, reader: impl BufRead) -> std::io::Result<()> {
        for line in reader.split(b'\n') {
            self.feed_line(&String::from_utf8_lossy(&line?));
        }
        Ok(())
    }

    pub fn finish(self) -> ParsedMountTable {
        self.parsed
    }

    fn dev_mount<'t>(&mut self, mut tokens: impl Iterator<Item = &'t str>) {
        let (Some(label), Some(raw_path)) = (tokens.next(), tokens.next()) else {
            tracing::debug!("skipping dev_mount line without label and mount point");
            return;
        };
        let mount_path = resolve_mount_path(raw_path);

        if mount_path == self.primary.mount_path {
            self.parsed.past_primary_entry = true;
            self.before_primary_entry = false;
            // e.g. Galaxy Note: "encryptable_nonremovable"
            if tokens.any(|flag| flag.contains("nonremovable")) {
                tracing::debug!("primary entry {} flagged nonremovable", mount_path.display());
                self.parsed
                    .corrections
                    .push(Correction::ForceNonRemovable(CorrectionReason::NonremovableFlag));
            }
            return;
        }

        let access = Access::check(&mount_path);
        let capacity = access.available.then(|| (self.probe)(&mount_path));
        let mut record = VolumeRecord::secondary(label, &mount_path, access, capacity);

        // Samsung mounts an alias of the primary below it; same capacity
        // means same storage.
        if record.available
            && record.capacity.is_some()
            && mount_path.starts_with(self.primary.mount_path)
            && record.capacity == self.primary.capacity
        {
            tracing::debug!(
                "{} aliases the primary store, marking unavailable",
                mount_path.display()
            );
            record.mark_unavailable();
        }

        tracing::debug!(
            "mount table candidate {} (available: {}, writeable: {})",
            mount_path.display(),
            record.available,
            record.writeable
        );
        self.parsed.candidates.push(record);
    }

    fn discard(&mut self, value: &str) {
        match value {
            "disable" => {
                tracing::debug!("discard = disable before primary entry");
                self.parsed
                    .corrections
                    .push(Correction::ForceNonRemovable(CorrectionReason::DiscardDisabled));
            }
            // Seen on cards that were in fact soldered; not trusted.
            "enable" => tracing::info!("ignoring 'discard = enable' before primary entry"),
            other => tracing::warn!("unintelligible discard value: {}", other),
        }
    }
}

/// Extracts the value of a `discard = <value>` directive.
///
/// Accepts the spaced form as well as `discard=value`. The `=` is required.
fn discard_value<'t>(
    keyword: &'t str,
    mut tokens: impl Iterator<Item = &'t str>,
) -> Option<&'t str> {
    let rest = keyword.strip_prefix(DISCARD)?;
    let rest = if rest.is_empty() { tokens.next()? } else { rest };
    let value = rest.strip_prefix('=')?;
    if value.is_empty() {
        tokens.next()
    } else {
        Some(value)
    }
}

/// Resolves the mount path token.
///
/// Some vendors write `primary:asec:lun` paths; when the raw token is not a
/// directory but contains a colon, the part before the first colon is used.
fn resolve_mount_path(raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if !path.is_dir()
        && let Some((head, _)) = raw.split_once(':')
        && !head.is_empty()
    {
        return PathBuf::from(head);
    }
    path.to_path_buf()
}

/// Parses an in-memory mount table.
pub fn parse_str(
    content: &str,
    primary: PrimaryRef<'_>,
    probe: &dyn Fn(&Path) -> Capacity,
) -> ParsedMountTable {
    let mut parser = MountTableParser::new(primary, probe);
    for line in content.lines() {
        parser.feed_line(line);
    }
    parser.finish()
}

/// Parses the mount table at `path`.
///
/// Never fails outright: open and read errors are returned in
/// [`MountTableScan::error`] alongside whatever was parsed before them.
pub fn parse_file(
    path: &Path,
    primary: PrimaryRef<'_>,
    probe: &dyn Fn(&Path) -> Capacity,
) -> MountTableScan {
    let mut parser = MountTableParser::new(primary, probe);

    let error = match fs::File::open(path).mount_table_read_context(path) {
        Ok(file) => parser
            .read(BufReader::new(file))
            .mount_table_read_context(path)
            .err(),
        Err(e) => Some(e),
    };

    if let Some(e) = &error {
        tracing::warn!("{}", e);
    }

    MountTableScan {
        source: Some(path.to_path_buf()),
        parsed: parser.finish(),
        error,
    }
}

/// Tries each candidate file in order; the first complete read wins.
///
/// When no file can be read completely, the partial result with the most
/// candidates, then the most corrections, is kept (earlier files win ties).
/// Files that do not exist never win. When none of the files exist the
/// error is [`Error::MountTableMissing`].
pub fn parse_first_readable(
    paths: &[PathBuf],
    primary: PrimaryRef<'_>,
    probe: &dyn Fn(&Path) -> Capacity,
) -> MountTableScan {
    first_readable(paths, |path| parse_file(path, primary, probe))
}

fn first_readable(
    paths: &[PathBuf],
    mut scan_file: impl FnMut(&Path) -> MountTableScan,
) -> MountTableScan {
    let mut best: Option<MountTableScan> = None;

    for path in paths {
        let scan = scan_file(path);
        if scan.is_complete() {
            return scan;
        }
        if is_not_found(scan.error.as_ref()) {
            continue;
        }

        let rank = |s: &MountTableScan| (s.parsed.candidates.len(), s.parsed.corrections.len());
        if best.as_ref().is_none_or(|b| rank(&scan) > rank(b)) {
            best = Some(scan);
        }
    }

    best.unwrap_or_else(|| MountTableScan {
        source: None,
        parsed: ParsedMountTable::default(),
        error: Some(Error::MountTableMissing {
            tried: paths.iter().map(|p| p.display().to_string()).collect(),
        }),
    })
}

fn is_not_found(error: Option<&Error>) -> bool {
    matches!(
        error,
        Some(Error::MountTableRead { source, .. }) if source.kind() == std::io::ErrorKind::NotFound
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read, Write};
    use tempfile::{NamedTempFile, tempdir};

    const GIB: u64 = 1024 * 1024 * 1024;

    fn fixed(capacity: Capacity) -> impl Fn(&Path) -> Capacity {
        move |_| capacity
    }

    fn primary_at(path: &Path) -> PrimaryRef<'_> {
        PrimaryRef {
            mount_path: path,
            capacity: Some(Capacity::new(GIB, 8 * GIB)),
        }
    }

    #[test]
    fn test_primary_entry_is_not_a_candidate() {
        let primary = Path::new("/mnt/sdcard");
        let probe = fixed(Capacity::ZERO);
        let parsed = parse_str("dev_mount SDCARD /mnt/sdcard", primary_at(primary), &probe);

        assert!(parsed.candidates.is_empty());
        assert!(parsed.past_primary_entry);
        assert!(parsed.corrections.is_empty());
    }

    #[test]
    fn test_distinct_entry_becomes_candidate() {
        let primary = Path::new("/mnt/sdcard");
        let probe = fixed(Capacity::ZERO);
        let parsed = parse_str(
            "dev_mount SDCARD /mnt/extSdCard",
            primary_at(primary),
            &probe,
        );

        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.candidates[0].display_name, "extSdCard");
        assert_eq!(parsed.candidates[0].label, "SDCARD");
        assert!(!parsed.past_primary_entry);
    }

    #[test]
    fn test_nonremovable_flag_on_primary_entry() {
        let primary = Path::new("/mnt/sdcard");
        let probe = fixed(Capacity::ZERO);
        let parsed = parse_str(
            "dev_mount sdcard /mnt/sdcard 11 /devices/platform/dw_mmc/mmc_host/mmc0 encryptable_nonremovable",
            primary_at(primary),
            &probe,
        );

        assert_eq!(
            parsed.corrections,
            vec![Correction::ForceNonRemovable(CorrectionReason::NonremovableFlag)]
        );
    }

    #[test]
    fn test_nonremovable_flag_on_other_entry_is_ignored() {
        let primary = Path::new("/mnt/sdcard");
        let probe = fixed(Capacity::ZERO);
        let parsed = parse_str(
            "dev_mount usb /mnt/usb auto /devices/usb nonremovable",
            primary_at(primary),
            &probe,
        );

        assert!(parsed.corrections.is_empty());
        assert_eq!(parsed.candidates.len(), 1);
    }

    #[test]
    fn test_discard_disable_before_primary() {
        let primary = Path::new("/mnt/sdcard");
        let probe = fixed(Capacity::ZERO);
        let parsed = parse_str(
            "discard = disable\ndev_mount sdcard /mnt/sdcard auto /devices/x",
            primary_at(primary),
            &probe,
        );

        assert_eq!(
            parsed.corrections,
            vec![Correction::ForceNonRemovable(CorrectionReason::DiscardDisabled)]
        );
    }

    #[test]
    fn test_discard_compact_form() {
        let primary = Path::new("/mnt/sdcard");
        let probe = fixed(Capacity::ZERO);
        let parsed = parse_str("discard=disable", primary_at(primary), &probe);
        assert_eq!(parsed.corrections.len(), 1);
    }

    #[test]
    fn test_discard_enable_is_ignored() {
        let primary = Path::new("/mnt/sdcard");
        let probe = fixed(Capacity::ZERO);
        let parsed = parse_str(
            "discard = enable\ndiscard = maybe\ndev_mount sdcard /mnt/sdcard",
            primary_at(primary),
            &probe,
        );
        assert!(parsed.corrections.is_empty());
    }

    #[test]
    fn test_discard_after_primary_is_ignored() {
        let primary = Path::new("/mnt/sdcard");
        let probe = fixed(Capacity::ZERO);
        let parsed = parse_str(
            "dev_mount sdcard /mnt/sdcard\ndiscard = disable",
            primary_at(primary),
            &probe,
        );
        assert!(parsed.corrections.is_empty());
    }

    #[test]
    fn test_malformed_and_unknown_lines_are_skipped() {
        let primary = Path::new("/mnt/sdcard");
        let probe = fixed(Capacity::ZERO);
        let content = "# comment\n\n   \ndev_mount\ndev_mount onlylabel\ndiscard\ndiscard =\nfoo bar baz\ndiscardable = disable\ndev_mount usb /mnt/usbdisk\n";
        let parsed = parse_str(content, primary_at(primary), &probe);

        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.candidates[0].display_name, "usbdisk");
        assert!(parsed.corrections.is_empty());
    }

    #[test]
    fn test_candidates_keep_file_order() {
        let primary = Path::new("/mnt/sdcard");
        let probe = fixed(Capacity::ZERO);
        let content = "dev_mount sdcard /mnt/sdcard2\ndev_mount sdcard /mnt/sdcard\ndev_mount usb /mnt/usbdisk\n";
        let parsed = parse_str(content, primary_at(primary), &probe);

        let names: Vec<_> = parsed
            .candidates
            .iter()
            .map(|c| c.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["sdcard2", "usbdisk"]);
    }

    #[test]
    fn test_alias_of_primary_is_suppressed() {
        let primary = tempdir().unwrap();
        let alias = primary.path().join("external_sd");
        fs::create_dir(&alias).unwrap();

        let primary_ref = primary_at(primary.path());
        let probe = fixed(primary_ref.capacity.unwrap());
        let content = format!("dev_mount sdcard {}", alias.display());
        let parsed = parse_str(&content, primary_ref, &probe);

        assert_eq!(parsed.candidates.len(), 1);
        let candidate = &parsed.candidates[0];
        assert!(!candidate.available);
        assert!(!candidate.writeable);
        assert_eq!(candidate.capacity, None);
    }

    #[test]
    fn test_sub_path_with_own_capacity_is_kept() {
        let primary = tempdir().unwrap();
        let card = primary.path().join("external_sd");
        fs::create_dir(&card).unwrap();

        let probe = fixed(Capacity::new(GIB, 32 * GIB));
        let content = format!("dev_mount sdcard {}", card.display());
        let parsed = parse_str(&content, primary_at(primary.path()), &probe);

        let candidate = &parsed.candidates[0];
        assert!(candidate.available);
        assert!(candidate.writeable);
        assert_eq!(candidate.capacity, Some(Capacity::new(GIB, 32 * GIB)));
    }

    #[test]
    fn test_colon_dialect_uses_leading_path() {
        let card = tempdir().unwrap();
        let probe = fixed(Capacity::new(GIB, 16 * GIB));
        let content = format!(
            "dev_mount sdcard {}:/mnt/secure/asec:/dev/lun auto /devices/x",
            card.path().display()
        );
        let parsed = parse_str(&content, primary_at(Path::new("/mnt/sdcard")), &probe);

        let candidate = &parsed.candidates[0];
        assert_eq!(candidate.mount_path, card.path());
        assert!(candidate.available);
    }

    #[test]
    fn test_colon_dialect_matches_primary() {
        let probe = fixed(Capacity::ZERO);
        let parsed = parse_str(
            "dev_mount sdcard /mnt/sdcard:/mnt/secure/asec auto nonremovable",
            primary_at(Path::new("/mnt/sdcard")),
            &probe,
        );

        assert!(parsed.candidates.is_empty());
        assert!(parsed.past_primary_entry);
        assert_eq!(parsed.corrections.len(), 1);
    }

    #[test]
    fn test_parse_file_missing() {
        let dir = tempdir().unwrap();
        let probe = fixed(Capacity::ZERO);
        let scan = parse_file(
            &dir.path().join("vold.fstab"),
            primary_at(Path::new("/mnt/sdcard")),
            &probe,
        );

        assert!(!scan.is_complete());
        assert!(scan.parsed.candidates.is_empty());
    }

    struct FailAfter<R> {
        inner: R,
    }

    impl<R: Read> Read for FailAfter<R> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.inner.read(buf)? {
                0 => Err(std::io::Error::other("device went away")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_partial_read_keeps_candidates() {
        let probe = fixed(Capacity::ZERO);
        let mut parser = MountTableParser::new(primary_at(Path::new("/mnt/sdcard")), &probe);
        let reader = FailAfter {
            inner: Cursor::new(b"dev_mount a /mnt/a\ndev_mount b /mnt/b\n".to_vec()),
        };

        let result = parser.read(BufReader::new(reader));
        assert!(result.is_err());

        let parsed = parser.finish();
        assert_eq!(parsed.candidates.len(), 2);
    }

    #[test]
    fn test_non_utf8_line_does_not_end_scan() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"discard = disable\n# caf\xe9 comment\ndev_mount sd /mnt/extSdCard\n")
            .unwrap();

        let probe = fixed(Capacity::ZERO);
        let scan = parse_file(file.path(), primary_at(Path::new("/mnt/sdcard")), &probe);

        assert!(scan.is_complete());
        assert_eq!(scan.parsed.corrections.len(), 1);
        assert_eq!(scan.parsed.candidates.len(), 1);
        assert_eq!(scan.parsed.candidates[0].display_name, "extSdCard");
    }

    #[test]
    fn test_discard_requires_equals() {
        let primary = Path::new("/mnt/sdcard");
        let probe = fixed(Capacity::ZERO);

        let parsed = parse_str("discard disable", primary_at(primary), &probe);
        assert!(parsed.corrections.is_empty());

        for line in ["discard =disable", "discard= disable", "discard = disable"] {
            let parsed = parse_str(line, primary_at(primary), &probe);
            assert_eq!(parsed.corrections.len(), 1, "{line}");
        }
    }

    /// A scan of `content` whose reader fails after the last byte.
    fn partial_scan(path: &Path, content: &str) -> MountTableScan {
        let probe = fixed(Capacity::ZERO);
        let mut parser = MountTableParser::new(primary_at(Path::new("/mnt/sdcard")), &probe);
        let reader = FailAfter {
            inner: Cursor::new(content.as_bytes().to_vec()),
        };
        let error = parser
            .read(BufReader::new(reader))
            .mount_table_read_context(path)
            .err();
        MountTableScan {
            source: Some(path.to_path_buf()),
            parsed: parser.finish(),
            error,
        }
    }

    #[test]
    fn test_missing_file_never_beats_partial_read() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("vold.fstab");
        let partial = dir.path().join("vold.conf");
        let paths = vec![missing.clone(), partial.clone()];

        let probe = fixed(Capacity::ZERO);
        let scan = first_readable(&paths, |path| {
            if path == missing {
                parse_file(path, primary_at(Path::new("/mnt/sdcard")), &probe)
            } else {
                partial_scan(path, "discard = disable\n")
            }
        });

        assert_eq!(scan.source, Some(partial));
        assert_eq!(scan.parsed.corrections.len(), 1);
        assert!(matches!(scan.error, Some(Error::MountTableRead { .. })));
    }

    #[test]
    fn test_partial_reads_ranked_by_candidates_then_corrections() {
        let paths: Vec<PathBuf> = ["a", "b", "c"].iter().map(PathBuf::from).collect();
        let content = |path: &Path| match path.to_str() {
            Some("a") => "dev_mount x /mnt/x\n",
            Some("b") => "discard = disable\ndev_mount y /mnt/y\n",
            _ => "dev_mount z /mnt/z\n",
        };

        let scan = first_readable(&paths, |path| partial_scan(path, content(path)));
        assert_eq!(scan.source, Some(PathBuf::from("b")));

        let ties = vec![PathBuf::from("a"), PathBuf::from("c")];
        let scan = first_readable(&ties, |path| partial_scan(path, content(path)));
        assert_eq!(scan.source, Some(PathBuf::from("a")));
    }

    #[test]
    fn test_unreadable_file_is_reported_not_missing() {
        let dir = tempdir().unwrap();
        let unreadable = dir.path().join("vold.conf");
        fs::create_dir(&unreadable).unwrap();
        let paths = vec![dir.path().join("vold.fstab"), unreadable.clone()];

        let probe = fixed(Capacity::ZERO);
        let scan = parse_first_readable(&paths, primary_at(Path::new("/mnt/sdcard")), &probe);

        assert_eq!(scan.source, Some(unreadable));
        assert!(matches!(scan.error, Some(Error::MountTableRead { .. })));
    }

    #[test]
    fn test_parse_first_readable_falls_back() {
        let dir = tempdir().unwrap();
        let fallback = dir.path().join("vold.conf");
        fs::write(&fallback, "dev_mount sd /mnt/extSdCard\n").unwrap();

        let probe = fixed(Capacity::ZERO);
        let paths = vec![dir.path().join("vold.fstab"), fallback.clone()];
        let scan = parse_first_readable(&paths, primary_at(Path::new("/mnt/sdcard")), &probe);

        assert!(scan.is_complete());
        assert_eq!(scan.source, Some(fallback));
        assert_eq!(scan.parsed.candidates.len(), 1);
    }

    #[test]
    fn test_parse_first_readable_prefers_first() {
        let mut first = NamedTempFile::new().unwrap();
        writeln!(first, "dev_mount a /mnt/a").unwrap();
        let mut second = NamedTempFile::new().unwrap();
        writeln!(second, "dev_mount b /mnt/b\ndev_mount c /mnt/c").unwrap();

        let probe = fixed(Capacity::ZERO);
        let paths = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let scan = parse_first_readable(&paths, primary_at(Path::new("/mnt/sdcard")), &probe);

        assert_eq!(scan.source.as_deref(), Some(first.path()));
        assert_eq!(scan.parsed.candidates.len(), 1);
    }

    #[test]
    fn test_parse_first_readable_all_missing() {
        let dir = tempdir().unwrap();
        let probe = fixed(Capacity::ZERO);
        let paths = vec![dir.path().join("vold.fstab"), dir.path().join("vold.conf")];
        let scan = parse_first_readable(&paths, primary_at(Path::new("/mnt/sdcard")), &probe);

        assert!(matches!(scan.error, Some(Error::MountTableMissing { .. })));
        assert_eq!(scan.source, None);
    }
}
