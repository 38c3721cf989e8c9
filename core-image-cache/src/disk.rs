//! Persistent tier: one file per key with TTL expiry and size trimming.
//!
//! ## Record format
//!
//! ```text
//! offset  size  field
//! 0       4     magic "ICM1"
//! 4       8     creation time, Unix millis, big-endian i64
//! 12      4     width, big-endian i32
//! 16      4     height, big-endian i32
//! 20      ..    encoded image bytes
//! ```
//!
//! Records are written to `<key>.bin.tmp` and renamed into place, so readers
//! never see a partially written `<key>.bin`. A record's modification time is
//! refreshed on every read; trimming deletes the least recently modified files
//! first, which approximates LRU at whole-file granularity.
//!
//! All operations on one `DiskCache` are serialized by an internal mutex and
//! perform blocking I/O; async callers should go through `spawn_blocking`.

use crate::key::CacheKey;
use bridge_traits::time::Clock;
use bytes::Bytes;
use core_runtime::logging::strip_path;
use filetime::FileTime;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Marker at the start of every record.
pub const RECORD_MAGIC: [u8; 4] = *b"ICM1";

/// Length of the fixed record header in bytes.
pub const HEADER_LEN: usize = 20;

const RECORD_EXTENSION: &str = "bin";
const TEMP_SUFFIX: &str = ".tmp";

/// An encoded image with the dimensions it decodes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskEntry {
    pub bytes: Bytes,
    pub width: i32,
    pub height: i32,
}

/// Outcome of a trim pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimResult {
    pub files_deleted: usize,
    pub bytes_freed: u64,
    pub size_after: u64,
}

pub struct DiskCache {
    directory: PathBuf,
    max_size_bytes: u64,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl DiskCache {
    /// Open (or create) a disk cache rooted at `directory`.
    ///
    /// A zero `ttl` disables expiry. Directory creation is best-effort: if it
    /// fails every read is a miss and every write a silent no-op.
    pub fn new(
        directory: impl Into<PathBuf>,
        max_size_bytes: u64,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let directory = directory.into();
        if let Err(e) = fs::create_dir_all(&directory) {
            warn!(
                directory = %directory.display(),
                error = %e,
                "Failed to create disk cache directory"
            );
        }

        info!(
            directory = %directory.display(),
            max_size_bytes,
            ttl_ms = ttl.as_millis() as u64,
            "Disk cache opened"
        );

        Self {
            directory,
            max_size_bytes,
            ttl,
            clock,
            lock: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Read the record for `key`.
    ///
    /// Missing, truncated, foreign and expired records are all misses.
    /// Expired records are deleted on the way out.
    pub fn get(&self, key: &CacheKey) -> Option<DiskEntry> {
        let _guard = self.lock.lock();
        let path = self.record_path(key);
        let now = self.clock.unix_timestamp_millis();

        match self.read_record(&path, now) {
            Ok(entry) => entry,
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                debug!(key = %key, error = %e, "Disk cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store a record for `key`, replacing any previous one.
    ///
    /// Failures are logged and swallowed: the previous record (if any) is left
    /// in place and no temp file survives.
    pub fn put(&self, key: &CacheKey, entry: &DiskEntry) {
        let _guard = self.lock.lock();
        let now = self.clock.unix_timestamp_millis();

        if let Err(e) = self.commit_with(key, now, |out| write_record(out, now, entry)) {
            warn!(key = %key, error = %e, "Disk cache write failed");
            return;
        }

        if let Err(e) = self.trim_to_size() {
            warn!(error = %e, "Disk cache trim failed");
        }
    }

    pub fn remove(&self, key: &CacheKey) {
        let _guard = self.lock.lock();
        if let Err(e) = fs::remove_file(self.record_path(key)) {
            if e.kind() != io::ErrorKind::NotFound {
                debug!(key = %key, error = %e, "Failed to remove disk cache record");
            }
        }
    }

    /// Delete every file in the cache directory.
    pub fn clear(&self) {
        let _guard = self.lock.lock();
        let files = match self.list_files() {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "Failed to list disk cache directory");
                return;
            }
        };

        let count = files.len();
        for file in files {
            let _ = fs::remove_file(&file.path);
        }
        info!(files_deleted = count, "Disk cache cleared");
    }

    /// Total size of all files in the cache directory.
    pub fn size_bytes(&self) -> u64 {
        let _guard = self.lock.lock();
        self.list_files()
            .map(|files| files.iter().map(|f| f.len).sum())
            .unwrap_or(0)
    }

    /// Number of committed records.
    pub fn entry_count(&self) -> usize {
        let _guard = self.lock.lock();
        self.list_files()
            .map(|files| {
                files
                    .iter()
                    .filter(|f| f.path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION))
                    .count()
            })
            .unwrap_or(0)
    }

    fn record_path(&self, key: &CacheKey) -> PathBuf {
        self.directory.join(key.file_name())
    }

    fn temp_path(&self, key: &CacheKey) -> PathBuf {
        self.directory
            .join(format!("{}{}", key.file_name(), TEMP_SUFFIX))
    }

    fn read_record(&self, path: &Path, now: i64) -> io::Result<Option<DiskEntry>> {
        let data = fs::read(path)?;
        let display_path = path.to_string_lossy();
        let file = strip_path(&display_path);

        let Some(header) = RecordHeader::parse(&data) else {
            debug!(file = %file, "Ignoring malformed disk cache record");
            return Ok(None);
        };

        if self.is_expired(header.created_at, now) {
            debug!(
                file = %file,
                age_ms = now - header.created_at,
                "Disk cache record expired"
            );
            fs::remove_file(path)?;
            return Ok(None);
        }

        let bytes = Bytes::from(data).slice(HEADER_LEN..);
        if let Err(e) = set_mtime_millis(path, now) {
            debug!(error = %e, "Failed to refresh disk cache record mtime");
        }

        Ok(Some(DiskEntry {
            bytes,
            width: header.width,
            height: header.height,
        }))
    }

    fn is_expired(&self, created_at: i64, now: i64) -> bool {
        if self.ttl.is_zero() {
            return false;
        }
        let ttl_millis = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        now.saturating_sub(created_at) >= ttl_millis
    }

    /// Write a record through a temp file and move it into place.
    ///
    /// `write` produces the full file contents. On any error the temp file is
    /// deleted and the error returned.
    fn commit_with<F>(&self, key: &CacheKey, now: i64, write: F) -> io::Result<()>
    where
        F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
    {
        let path = self.record_path(key);
        let tmp = self.temp_path(key);

        let result = (|| {
            let mut out = BufWriter::new(File::create(&tmp)?);
            write(&mut out)?;
            out.into_inner().map_err(|e| e.into_error())?.sync_all()?;

            // No portable atomic replace: delete then rename
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
            fs::rename(&tmp, &path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        if let Err(e) = set_mtime_millis(&path, now) {
            debug!(error = %e, "Failed to set disk cache record mtime");
        }
        Ok(())
    }

    fn trim_to_size(&self) -> io::Result<TrimResult> {
        let mut files = self.list_files()?;
        let mut total: u64 = files.iter().map(|f| f.len).sum();
        if total <= self.max_size_bytes {
            return Ok(TrimResult {
                size_after: total,
                ..TrimResult::default()
            });
        }

        files.sort_by_key(|f| f.modified);

        let mut result = TrimResult::default();
        for file in files {
            if total <= self.max_size_bytes {
                break;
            }
            if fs::remove_file(&file.path).is_ok() {
                total -= file.len;
                result.files_deleted += 1;
                result.bytes_freed += file.len;
            }
        }
        result.size_after = total;

        debug!(
            files_deleted = result.files_deleted,
            bytes_freed = result.bytes_freed,
            size_after = result.size_after,
            limit_bytes = self.max_size_bytes,
            "Trimmed disk cache"
        );
        Ok(result)
    }

    fn list_files(&self) -> io::Result<Vec<CacheFile>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let Ok(entry) = entry else { continue };
            let Ok(metadata) = entry.metadata() else { continue };
            if !metadata.is_file() {
                continue;
            }
            files.push(CacheFile {
                path: entry.path(),
                len: metadata.len(),
                modified: FileTime::from_last_modification_time(&metadata),
            });
        }
        Ok(files)
    }
}

struct CacheFile {
    path: PathBuf,
    len: u64,
    modified: FileTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecordHeader {
    created_at: i64,
    width: i32,
    height: i32,
}

impl RecordHeader {
    fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN || data[..4] != RECORD_MAGIC {
            return None;
        }
        Some(Self {
            created_at: i64::from_be_bytes(data[4..12].try_into().ok()?),
            width: i32::from_be_bytes(data[12..16].try_into().ok()?),
            height: i32::from_be_bytes(data[16..20].try_into().ok()?),
        })
    }
}

fn write_record<W: Write>(out: &mut W, created_at: i64, entry: &DiskEntry) -> io::Result<()> {
    out.write_all(&RECORD_MAGIC)?;
    out.write_all(&created_at.to_be_bytes())?;
    out.write_all(&entry.width.to_be_bytes())?;
    out.write_all(&entry.height.to_be_bytes())?;
    out.write_all(&entry.bytes)
}

fn set_mtime_millis(path: &Path, millis: i64) -> io::Result<()> {
    let seconds = millis.div_euclid(1_000);
    let nanos = (millis.rem_euclid(1_000) * 1_000_000) as u32;
    filetime::set_file_mtime(path, FileTime::from_unix_time(seconds, nanos))
}
