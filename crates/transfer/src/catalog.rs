use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, Local, NaiveDate};

/// chrono format of a bucket directory name (`20240131`).
pub const BUCKET_FORMAT: &str = "%Y%m%d";

/// Returns the bucket label for a point in time.
pub fn bucket_label(at: DateTime<Local>) -> String {
    at.format(BUCKET_FORMAT).to_string()
}

/// Outcome of a retention purge.
#[derive(Debug, Default)]
pub struct PurgeReport {
    /// Buckets that were deleted.
    pub removed: Vec<PathBuf>,
    /// Buckets that were due for deletion but could not be removed.
    pub failed: Vec<(PathBuf, std::io::Error)>,
}

/// Storage for working files, grouped into per-day buckets.
///
/// Methods are blocking; async callers run them under `spawn_blocking`.
pub trait CatalogStore: Send + Sync + 'static {
    /// Directory that transfers started at `at` belong to.
    fn bucket_for(&self, at: DateTime<Local>) -> PathBuf;

    /// Writes `bytes` at `offset` into `path`, creating the file and its
    /// bucket if needed. Existing bytes outside the range are kept.
    fn write(&self, path: &Path, offset: u64, bytes: &[u8]) -> std::io::Result<()>;

    /// Reads the whole file.
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;

    /// Replaces the file's contents.
    fn overwrite(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()>;

    /// Current file length, or `None` if it does not exist.
    fn persisted_len(&self, path: &Path) -> std::io::Result<Option<u64>>;

    /// Deletes every bucket dated strictly before `today - days`.
    ///
    /// Each bucket is attempted independently; failures are reported, not
    /// returned. `Err` means the root itself could not be listed.
    fn purge_older_than(&self, days: u32, today: NaiveDate) -> std::io::Result<PurgeReport>;
}

// ---------------------------------------------------------------------------
// FsCatalogStore
// ---------------------------------------------------------------------------

/// Filesystem catalog rooted at an upload directory.
///
/// Layout: `<root>/<YYYYMMDD>/<transfer-id>.<ext>`.
#[derive(Debug, Clone)]
pub struct FsCatalogStore {
    root: PathBuf,
}

impl FsCatalogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the upload root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl CatalogStore for FsCatalogStore {
    fn bucket_for(&self, at: DateTime<Local>) -> PathBuf {
        self.root.join(bucket_label(at))
    }

    fn write(&self, path: &Path, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)?;
        file.flush()
    }

    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn overwrite(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        // Write beside the target and rename so a crash never leaves a
        // half-written container behind.
        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        std::fs::write(&tmp, bytes)?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(())
    }

    fn persisted_len(&self, path: &Path) -> std::io::Result<Option<u64>> {
        match std::fs::metadata(path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn purge_older_than(&self, days: u32, today: NaiveDate) -> std::io::Result<PurgeReport> {
        let mut report = PurgeReport::default();

        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e),
        };

        let Some(cutoff) = today.checked_sub_days(Days::new(u64::from(days))) else {
            return Ok(report);
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let name = entry.file_name();
            let Some(date) = name
                .to_str()
                .and_then(|n| NaiveDate::parse_from_str(n, BUCKET_FORMAT).ok())
            else {
                continue;
            };

            if date >= cutoff {
                continue;
            }

            match std::fs::remove_dir_all(&path) {
                Ok(()) => report.removed.push(path),
                Err(e) => report.failed.push((path, e)),
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn bucket_label_is_date() {
        assert_eq!(bucket_label(at(2024, 1, 31, 12)), "20240131");
    }

    #[test]
    fn bucket_for_joins_root() {
        let store = FsCatalogStore::new("/srv/uploads");
        assert_eq!(
            store.bucket_for(at(2024, 3, 5, 23)),
            PathBuf::from("/srv/uploads/20240305")
        );
    }

    #[test]
    fn write_at_offset_creates_bucket() {
        let dir = TempDir::new().unwrap();
        let store = FsCatalogStore::new(dir.path());
        let path = dir.path().join("20240101").join("t1.bkp");

        store.write(&path, 0, b"Hello").unwrap();
        store.write(&path, 5, b" World").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"Hello World");
        assert_eq!(store.persisted_len(&path).unwrap(), Some(11));
    }

    #[test]
    fn write_overlapping_keeps_tail() {
        let dir = TempDir::new().unwrap();
        let store = FsCatalogStore::new(dir.path());
        let path = dir.path().join("f.bkp");

        store.write(&path, 0, b"0123456789").unwrap();
        store.write(&path, 2, b"ab").unwrap();

        assert_eq!(store.read(&path).unwrap(), b"01ab456789");
    }

    #[test]
    fn write_empty_chunk_creates_file() {
        let dir = TempDir::new().unwrap();
        let store = FsCatalogStore::new(dir.path());
        let path = dir.path().join("b").join("empty.bkp");

        store.write(&path, 0, b"").unwrap();
        assert_eq!(store.persisted_len(&path).unwrap(), Some(0));
    }

    #[test]
    fn persisted_len_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = FsCatalogStore::new(dir.path());
        assert_eq!(store.persisted_len(&dir.path().join("nope")).unwrap(), None);
    }

    #[test]
    fn overwrite_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let store = FsCatalogStore::new(dir.path());
        let path = dir.path().join("f.bkp");

        store.write(&path, 0, b"long original content").unwrap();
        store.overwrite(&path, b"short").unwrap();

        assert_eq!(store.read(&path).unwrap(), b"short");
        assert!(!dir.path().join("f.bkp.tmp").exists());
    }

    #[test]
    fn read_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let store = FsCatalogStore::new(dir.path());
        assert!(store.read(&dir.path().join("missing.bkp")).is_err());
    }

    #[test]
    fn purge_deletes_only_expired_buckets() {
        let dir = TempDir::new().unwrap();
        let store = FsCatalogStore::new(dir.path());

        for name in ["20240310", "20240309", "20240308"] {
            let bucket = dir.path().join(name);
            std::fs::create_dir_all(&bucket).unwrap();
            std::fs::write(bucket.join("t.bkp"), b"x").unwrap();
        }

        let report = store.purge_older_than(1, date(2024, 3, 10)).unwrap();

        assert_eq!(report.removed, vec![dir.path().join("20240308")]);
        assert!(report.failed.is_empty());
        assert!(dir.path().join("20240310").exists());
        assert!(dir.path().join("20240309").exists());
        assert!(!dir.path().join("20240308").exists());
    }

    #[test]
    fn purge_ignores_foreign_entries() {
        let dir = TempDir::new().unwrap();
        let store = FsCatalogStore::new(dir.path());

        std::fs::create_dir_all(dir.path().join("not-a-date")).unwrap();
        std::fs::write(dir.path().join("19990101"), b"a file, not a bucket").unwrap();

        let report = store.purge_older_than(1, date(2024, 3, 10)).unwrap();
        assert!(report.removed.is_empty());
        assert!(dir.path().join("not-a-date").exists());
        assert!(dir.path().join("19990101").exists());
    }

    #[test]
    fn purge_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FsCatalogStore::new(dir.path().join("absent"));
        let report = store.purge_older_than(1, date(2024, 3, 10)).unwrap();
        assert!(report.removed.is_empty());
    }

    #[test]
    fn purge_zero_days_keeps_today() {
        let dir = TempDir::new().unwrap();
        let store = FsCatalogStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("20240310")).unwrap();
        std::fs::create_dir_all(dir.path().join("20240309")).unwrap();

        let report = store.purge_older_than(0, date(2024, 3, 10)).unwrap();
        assert_eq!(report.removed, vec![dir.path().join("20240309")]);
    }
}
