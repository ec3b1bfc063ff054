//! Ignore-rule matching over root-relative paths

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::error::ScanError;

/// Per-project ignore-pattern file, looked up directly under the scanned root
pub const IGNORE_FILE: &str = ".gisyncignore";

/// Reserved bookkeeping directory at the top level of a project; never scanned
pub const RESERVED_DIR: &str = ".gisync";

/// Predicate deciding which root-relative paths are excluded from a scan.
///
/// Built-in rules (backup `~` suffix, the reserved metadata directory) always
/// apply; on top of those, patterns from [`IGNORE_FILE`] are matched with
/// gitignore semantics when the file is present. A missing ignore file is
/// fine; a malformed one fails the build rather than silently ignoring
/// nothing, since that could leak files expected to stay private.
#[derive(Debug)]
pub struct PathFilter {
    patterns: Option<Gitignore>,
}

impl PathFilter {
    /// Compile the filter for `root`.
    pub fn build(root: &Path) -> Result<Self, ScanError> {
        let ignore_path = root.join(IGNORE_FILE);

        match std::fs::metadata(&ignore_path) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self { patterns: None });
            }
            // Permission denied on the ignore file itself is treated as a
            // parse failure, not as "ignore nothing".
            Err(e) => {
                return Err(ScanError::IgnoreFile {
                    path: ignore_path,
                    source: ignore::Error::Io(e),
                });
            }
        }

        let mut builder = GitignoreBuilder::new(root);
        if let Some(source) = builder.add(&ignore_path) {
            return Err(ScanError::IgnoreFile {
                path: ignore_path,
                source,
            });
        }
        let patterns = builder.build().map_err(|source| ScanError::IgnoreFile {
            path: ignore_path,
            source,
        })?;

        Ok(Self {
            patterns: Some(patterns),
        })
    }

    /// Whether a root-relative path (with `/` separators) is excluded.
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        if rel_path.ends_with('~') {
            return true;
        }
        if rel_path
            .strip_prefix(RESERVED_DIR)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        {
            return true;
        }
        match &self.patterns {
            Some(patterns) => patterns
                .matched_path_or_any_parents(rel_path, false)
                .is_ignore(),
            None => false,
        }
    }
}
