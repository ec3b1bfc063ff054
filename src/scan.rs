//! Directory scanning: walk, filter, classify, checksum
//!
//! One scan is a single sequential walk producing one consistent snapshot;
//! only the checksum computation for cache misses is parallelized, since
//! hashing dominates the cost of a scan.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;
use walkdir::WalkDir;

use crate::cache::ChecksumCache;
use crate::checksum::ChecksumEngine;
use crate::error::{ScanAborted, ScanError};
use crate::filter::{PathFilter, RESERVED_DIR};

/// Lock/journal sidecar extensions of a GeoPackage container; tracked for
/// existence but never content-hashed (case-insensitive)
pub const TRANSIENT_SUFFIXES: &[&str] = &["gpkg-wal", "gpkg-shm"];

/// One filesystem entry in the inventory.
///
/// `path` is relative to the scanned root with `/` separators; `checksum` is
/// empty for transient files (and when checksums were not requested),
/// otherwise a plain hex content digest or a `dbhash:<digest>` tagged string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    #[serde(rename = "hash")]
    pub checksum: String,
    pub size: u64,
    /// Seconds since the Unix epoch, as reported by the filesystem
    pub mtime: i64,
}

/// The two ordered result lists of a scan, both sorted by path.
///
/// Every included file appears exactly once, in exactly one list. An empty
/// root yields two empty lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanInventory {
    pub files: Vec<FileRecord>,
    pub temp_files: Vec<FileRecord>,
}

/// Directory scanner owning the checksum engine and cache.
///
/// The cache lives across scans of the same scanner, so rescanning a root
/// only re-hashes files whose size or mtime changed. A scanner is tied to
/// one root; scans of different roots should use separate scanners.
#[derive(Debug)]
pub struct Scanner {
    root: PathBuf,
    engine: ChecksumEngine,
    cache: ChecksumCache,
}

impl Scanner {
    /// Create a scanner for the given project root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            engine: ChecksumEngine::new(None),
            cache: ChecksumCache::new(),
        }
    }

    /// Configure the external GeoPackage hashing tool.
    #[must_use]
    pub fn dbhash(mut self, command: impl Into<PathBuf>) -> Self {
        self.engine.set_dbhash_command(Some(command.into()));
        self
    }

    /// Number of digests actually computed over this scanner's lifetime
    /// (cache hits excluded).
    pub fn computed_checksums(&self) -> u64 {
        self.engine.computed_count()
    }

    /// Drop all cached checksums, forcing the next scan to re-hash.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Walk the root and assemble the inventory.
    ///
    /// With `compute_checksums` set, regular files get a checksum from the
    /// cache or freshly computed; without it the field stays empty (sizes
    /// and mtimes are always populated). Entries vanishing mid-walk are
    /// logged and skipped; any other failure aborts and carries the partial
    /// inventory for diagnostics.
    pub fn scan(&mut self, compute_checksums: bool) -> Result<ScanInventory, ScanAborted> {
        let mut inventory = ScanInventory::default();

        let root = match std::fs::canonicalize(&self.root) {
            Ok(root) => root,
            Err(source) => {
                let error = ScanError::Io {
                    path: self.root.clone(),
                    source,
                };
                return Err(ScanAborted::new(error, inventory));
            }
        };

        let filter = match PathFilter::build(&root) {
            Ok(filter) => filter,
            Err(error) => return Err(ScanAborted::new(error, inventory)),
        };

        // Cache misses, hashed in parallel after the walk:
        // (index into inventory.files, absolute path, size, mtime)
        let mut pending: Vec<(usize, PathBuf, u64, i64)> = Vec::new();

        let walker = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() != 1 || e.file_name() != RESERVED_DIR);

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) if is_vanished(&err) => {
                    warn!("entry vanished during scan, skipping: {:?}", err.path());
                    continue;
                }
                Err(err) => {
                    inventory.sort();
                    return Err(ScanAborted::new(walk_error(&root, err), inventory));
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }
            let path = entry.path();

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) if is_vanished(&err) => {
                    warn!("entry vanished during scan, skipping: {}", path.display());
                    continue;
                }
                Err(err) => {
                    inventory.sort();
                    return Err(ScanAborted::new(walk_error(&root, err), inventory));
                }
            };

            let rel = match path.strip_prefix(&root) {
                Ok(rel) => rel_path_string(rel),
                // walkdir only yields paths under the root
                Err(_) => continue,
            };
            if filter.is_excluded(&rel) {
                continue;
            }

            let size = metadata.len();
            let mtime = match metadata.modified() {
                Ok(time) => unix_seconds(time),
                Err(source) => {
                    inventory.sort();
                    let error = ScanError::Io {
                        path: path.to_path_buf(),
                        source,
                    };
                    return Err(ScanAborted::new(error, inventory));
                }
            };

            if is_transient(path) {
                inventory.temp_files.push(FileRecord {
                    path: rel,
                    checksum: String::new(),
                    size,
                    mtime,
                });
                continue;
            }

            let mut checksum = String::new();
            if compute_checksums {
                match self.cache.lookup(path, size, mtime) {
                    Some(cached) => checksum = cached.to_string(),
                    None => pending.push((inventory.files.len(), path.to_path_buf(), size, mtime)),
                }
            }
            inventory.files.push(FileRecord {
                path: rel,
                checksum,
                size,
                mtime,
            });
        }

        if !pending.is_empty() {
            let engine = &self.engine;
            let computed: Result<Vec<(usize, String)>, ScanError> = pending
                .par_iter()
                .map(|(idx, path, _, _)| engine.checksum(path).map(|digest| (*idx, digest)))
                .collect();

            match computed {
                Ok(results) => {
                    for ((idx, digest), (_, path, size, mtime)) in
                        results.into_iter().zip(pending)
                    {
                        self.cache.store(path, digest.clone(), size, mtime);
                        inventory.files[idx].checksum = digest;
                    }
                }
                Err(error) => {
                    inventory.sort();
                    return Err(ScanAborted::new(error, inventory));
                }
            }
        }

        inventory.sort();
        Ok(inventory)
    }
}

impl ScanInventory {
    fn sort(&mut self) {
        self.files.sort_by(|a, b| a.path.cmp(&b.path));
        self.temp_files.sort_by(|a, b| a.path.cmp(&b.path));
    }
}

/// Whether a path carries a transient/lock sidecar extension.
fn is_transient(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        TRANSIENT_SUFFIXES
            .iter()
            .any(|suffix| ext.eq_ignore_ascii_case(suffix))
    })
}

/// Root-relative path with `/` separators on all platforms.
///
/// Non-UTF-8 names are recorded lossily; two such names can collapse to the
/// same record path, so the replacement is logged.
fn rel_path_string(rel: &Path) -> String {
    match rel.to_str() {
        Some(s) => s.replace('\\', "/"),
        None => {
            warn!(
                "non-UTF-8 file name recorded lossily: {}",
                rel.to_string_lossy()
            );
            rel.to_string_lossy().replace('\\', "/")
        }
    }
}

fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

fn is_vanished(err: &walkdir::Error) -> bool {
    err.io_error()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
}

fn walk_error(root: &Path, err: walkdir::Error) -> ScanError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let message = err.to_string();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other(message));
    ScanError::Io { path, source }
}
