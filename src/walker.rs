//! Repository traversal feeding multi-file scans.
//!
//! Discovers the source files a directory-level `scan`/`sync` should look
//! at: `.gitignore`-aware walking, a default set of build/VCS directories
//! that never get scanned, and user-configured include/exclude globs on
//! top.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::debug;

use crate::config::{default_ignore_dirs, default_ignore_files, ScanSettings};
use crate::error::{Result, SyncError};

/// Extensions that are never line-oriented source text.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "pdf", "zip", "gz", "tar", "jar", "class", "o", "so",
    "dylib", "dll", "exe", "bin", "wasm", "woff", "woff2", "ttf", "eot", "mp3", "mp4", "webm",
];

/// File discovery for directory-level scans.
#[derive(Debug)]
pub struct Walker {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl Walker {
    /// Build a walker from the configured scan globs.
    pub fn new(settings: &ScanSettings) -> Result<Self> {
        Ok(Self {
            include: build_globset(&settings.include, "scan.include")?,
            exclude: build_globset(&settings.exclude, "scan.exclude")?,
        })
    }

    /// Collect the files under `root` that should be scanned, in
    /// deterministic (sorted) order.
    #[must_use]
    pub fn walk(&self, root: &Path) -> Vec<PathBuf> {
        let ignore_dirs = default_ignore_dirs();
        let ignore_files = default_ignore_files();

        let walker = WalkBuilder::new(root)
            .hidden(false)
            .filter_entry(move |entry| {
                let name = entry.file_name().to_string_lossy();
                !(entry.file_type().is_some_and(|t| t.is_dir()) && ignore_dirs.contains(name.as_ref()))
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();

            let name = entry.file_name().to_string_lossy();
            if ignore_files.contains(name.as_ref()) {
                continue;
            }
            if path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            {
                continue;
            }

            // Globs match against the path relative to the walk root.
            let relative = path.strip_prefix(root).unwrap_or(path);
            if let Some(include) = &self.include {
                if !include.is_match(relative) {
                    continue;
                }
            }
            if let Some(exclude) = &self.exclude {
                if exclude.is_match(relative) {
                    continue;
                }
            }

            files.push(path.to_path_buf());
        }

        files.sort();
        files
    }
}

/// Compile a glob list, returning `None` for an empty list.
fn build_globset(patterns: &[String], field: &str) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| SyncError::InvalidConfig {
            field: field.to_string(),
            reason: format!("bad glob '{pattern}': {e}"),
        })?;
        builder.add(glob);
    }
    let set = builder.build().map_err(|e| SyncError::InvalidConfig {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some(set))
}
