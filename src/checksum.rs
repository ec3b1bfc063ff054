//! Format-aware checksum selection
//!
//! GeoPackage containers can hold identical semantic content in different
//! raw bytes (internal metadata, page layout), so diffing them by plain
//! content hash produces false positives. When an external `dbhash`-style
//! tool is configured it is used for `.gpkg` files and its digest is tagged;
//! everything else gets the generic content hash.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::ScanError;
use crate::hash;

/// Extension handled by the external tool (case-insensitive)
pub const GEOPACKAGE_EXT: &str = "gpkg";

/// Tag prefixed to digests produced by the external tool
pub const DBHASH_TAG: &str = "dbhash";

/// How a checksum is obtained for a given file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumStrategy {
    /// Generic streaming content hash
    Content,
    /// Invoke the configured tool as `<command> <path>` and tag its digest
    Dbhash { command: PathBuf },
}

/// Picks a checksum strategy per file and executes it.
///
/// Counts every digest it actually computes, so callers can verify that
/// cached checksums were reused rather than recomputed.
#[derive(Debug)]
pub struct ChecksumEngine {
    dbhash_command: Option<PathBuf>,
    computed: AtomicU64,
}

impl ChecksumEngine {
    pub fn new(dbhash_command: Option<PathBuf>) -> Self {
        Self {
            dbhash_command,
            computed: AtomicU64::new(0),
        }
    }

    /// Number of digests computed so far (cache hits don't count).
    pub fn computed_count(&self) -> u64 {
        self.computed.load(Ordering::Relaxed)
    }

    /// Reconfigure the external tool; the computed-digest count is kept.
    pub fn set_dbhash_command(&mut self, command: Option<PathBuf>) {
        self.dbhash_command = command;
    }

    fn strategy_for(&self, path: &Path) -> ChecksumStrategy {
        let is_geopackage = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(GEOPACKAGE_EXT));

        match (&self.dbhash_command, is_geopackage) {
            (Some(command), true) => ChecksumStrategy::Dbhash {
                command: command.clone(),
            },
            _ => ChecksumStrategy::Content,
        }
    }

    /// Compute the checksum for `path` using the strategy selected by its
    /// extension.
    ///
    /// A configured tool that fails to execute or exits abnormally is a hard
    /// error; falling back to a content hash would produce a checksum the
    /// remote side cannot compare against.
    pub fn checksum(&self, path: &Path) -> Result<String, ScanError> {
        self.computed.fetch_add(1, Ordering::Relaxed);

        match self.strategy_for(path) {
            ChecksumStrategy::Content => hash::hash_file(path),
            ChecksumStrategy::Dbhash { command } => run_dbhash(&command, path),
        }
    }
}

/// Run the external tool and normalize its output into `dbhash:<digest>`.
fn run_dbhash(command: &Path, path: &Path) -> Result<String, ScanError> {
    debug!("running {} on {}", command.display(), path.display());

    let tool_err = |reason: String, source: Option<std::io::Error>| ScanError::Tool {
        tool: command.to_path_buf(),
        path: path.to_path_buf(),
        reason,
        source,
    };

    let output = Command::new(command)
        .arg(path)
        .output()
        .map_err(|e| tool_err("failed to execute".into(), Some(e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(tool_err(
            format!("exited with {}: {}", output.status, stderr.trim()),
            None,
        ));
    }

    // Expected output shape: "<digest>  <filename>" on one line
    let stdout = String::from_utf8_lossy(&output.stdout);
    let digest = stdout
        .split_whitespace()
        .next()
        .ok_or_else(|| tool_err("no digest in output".into(), None))?;

    Ok(format!("{}:{}", DBHASH_TAG, digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_plain_file_uses_content_hash() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("notes.txt");
        fs::write(&file, "hello").unwrap();

        let engine = ChecksumEngine::new(None);
        let checksum = engine.checksum(&file).unwrap();

        assert_eq!(checksum, hash::hash_file(&file).unwrap());
        assert!(!checksum.contains(':'));
        assert_eq!(engine.computed_count(), 1);
    }

    #[test]
    fn test_gpkg_without_tool_falls_back_to_content_hash() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("data.gpkg");
        fs::write(&file, "not really a geopackage").unwrap();

        let engine = ChecksumEngine::new(None);
        let checksum = engine.checksum(&file).unwrap();
        assert_eq!(checksum, hash::hash_file(&file).unwrap());
    }

    #[test]
    #[cfg(unix)]
    fn test_gpkg_with_tool_gets_tagged_digest() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("data.gpkg");
        fs::write(&file, "payload").unwrap();
        let tool = write_script(temp_dir.path(), "fake-dbhash", "echo \"deadbeef  $1\"");

        let engine = ChecksumEngine::new(Some(tool));
        assert_eq!(engine.checksum(&file).unwrap(), "dbhash:deadbeef");
    }

    #[test]
    #[cfg(unix)]
    fn test_extension_match_is_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("DATA.GPKG");
        fs::write(&file, "payload").unwrap();
        let tool = write_script(temp_dir.path(), "fake-dbhash", "echo cafebabe");

        let engine = ChecksumEngine::new(Some(tool));
        assert_eq!(engine.checksum(&file).unwrap(), "dbhash:cafebabe");
    }

    #[test]
    fn test_missing_tool_is_tool_error() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("data.gpkg");
        fs::write(&file, "payload").unwrap();

        let engine = ChecksumEngine::new(Some(temp_dir.path().join("no-such-tool")));
        let err = engine.checksum(&file).unwrap_err();
        assert!(matches!(err, ScanError::Tool { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_nonzero_exit_is_tool_error() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("data.gpkg");
        fs::write(&file, "payload").unwrap();
        let tool = write_script(temp_dir.path(), "bad-dbhash", "echo broken >&2; exit 1");

        let engine = ChecksumEngine::new(Some(tool));
        let err = engine.checksum(&file).unwrap_err();
        match err {
            ScanError::Tool { reason, .. } => assert!(reason.contains("broken")),
            other => panic!("expected Tool error, got {other:?}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_empty_tool_output_is_tool_error() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("data.gpkg");
        fs::write(&file, "payload").unwrap();
        let tool = write_script(temp_dir.path(), "silent-dbhash", "true");

        let engine = ChecksumEngine::new(Some(tool));
        let err = engine.checksum(&file).unwrap_err();
        assert!(matches!(err, ScanError::Tool { .. }));
    }

    #[test]
    fn test_tool_only_applies_to_gpkg() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("notes.txt");
        fs::write(&file, "hello").unwrap();

        // Tool configured but extension doesn't match: content hash, and the
        // (nonexistent) tool is never invoked.
        let engine = ChecksumEngine::new(Some(temp_dir.path().join("no-such-tool")));
        let checksum = engine.checksum(&file).unwrap();
        assert_eq!(checksum, hash::hash_file(&file).unwrap());
    }
}
