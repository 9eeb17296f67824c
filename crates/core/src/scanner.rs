//! Single-level directory listing for the rename pass.

use crate::models::FileEntry;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// One pass over a directory: entries that are regular files, plus the
/// entries that could not be read.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub entries: Vec<FileEntry>,
    pub unreadable: Vec<(PathBuf, String)>,
}

/// Lists regular files directly inside `dir` in listing order. Symlinks are
/// followed; directories and other entry types are dropped.
pub fn scan_dir(dir: &Path) -> ScanResult {
    let mut result = ScanResult::default();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.path().is_some_and(is_broken_link) => {
                debug!("skipping unresolvable link: {}", e);
                continue;
            }
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| dir.to_path_buf());
                result.unreadable.push((path, e.to_string()));
                continue;
            }
        };

        if !entry.file_type().is_file() {
            debug!("skipping non-file entry {:?}", entry.path());
            continue;
        }

        result
            .entries
            .push(FileEntry::new(entry.file_name(), entry.path().to_path_buf()));
    }
    result
}

/// A symlink whose target cannot be resolved (dangling, or a loop).
fn is_broken_link(path: &Path) -> bool {
    let is_link = fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);
    is_link && fs::metadata(path).is_err()
}
