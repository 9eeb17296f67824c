//! Rename pass: appends a tag suffix to every eligible file in one directory.

use crate::error::TagError;
use crate::locator::LocationProvider;
use crate::models::{
    is_tagged, FileEntry, FileReport, LocationFix, RenameOutcome, RunSummary, SkipReason,
    TagSuffix,
};
use crate::scanner::scan_dir;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Filesystem operations the rename pass needs.
pub trait FileOps {
    /// True if anything (file, directory, dangling link) occupies `path`.
    fn exists(&self, path: &Path) -> bool;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileOps;

impl FileOps for StdFileOps {
    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}

/// Result of a full invocation: the fix that was used and what happened to
/// each file.
#[derive(Debug, Clone)]
pub struct TagRun {
    pub fix: LocationFix,
    pub suffix: TagSuffix,
    pub summary: RunSummary,
}

pub struct TaggingEngine<F = StdFileOps> {
    ops: F,
    exclude: GlobSet,
}

impl TaggingEngine<StdFileOps> {
    pub fn new() -> Self {
        Self::with_ops(StdFileOps)
    }
}

impl Default for TaggingEngine<StdFileOps> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FileOps> TaggingEngine<F> {
    pub fn with_ops(ops: F) -> Self {
        Self {
            ops,
            exclude: GlobSet::empty(),
        }
    }

    /// File-name globs that are never renamed.
    pub fn with_excludes(mut self, patterns: &[String]) -> Result<Self, TagError> {
        let mut builder = GlobSetBuilder::new();
        for pat in patterns {
            builder.add(Glob::new(pat)?);
        }
        self.exclude = builder.build()?;
        Ok(self)
    }

    /// Validates the directory, acquires a fix, then runs the rename pass.
    /// Nothing is touched unless a fix was obtained.
    pub async fn tag_directory(
        &self,
        provider: &LocationProvider,
        dir: &Path,
        timeout: Duration,
        dry_run: bool,
    ) -> Result<TagRun, TagError> {
        ensure_directory(dir)?;

        info!("acquiring location fix, please wait...");
        let fix = provider.acquire(timeout).await?;
        let suffix = fix.tag_suffix();
        info!("location tag: {}", suffix);

        let summary = self.run(dir, &suffix, dry_run)?;
        Ok(TagRun {
            fix,
            suffix,
            summary,
        })
    }

    pub fn run(
        &self,
        dir: &Path,
        suffix: &TagSuffix,
        dry_run: bool,
    ) -> Result<RunSummary, TagError> {
        ensure_directory(dir)?;
        if dry_run {
            warn!("dry run: no files will be modified");
        }

        let scan = scan_dir(dir);
        let mut summary = RunSummary::new(dry_run);
        for (path, cause) in scan.unreadable {
            error!("cannot read {}: {}", path.display(), cause);
            summary.record(FileReport {
                name: path.display().to_string(),
                target: None,
                outcome: RenameOutcome::Errored(cause),
            });
        }
        for entry in &scan.entries {
            summary.record(self.process(dir, entry, suffix, dry_run));
        }

        info!(
            "processing complete: {} {}, skipped {}, errors {}",
            if dry_run { "would rename" } else { "renamed" },
            summary.renamed,
            summary.skipped,
            summary.errors
        );
        Ok(summary)
    }

    fn process(
        &self,
        dir: &Path,
        entry: &FileEntry,
        suffix: &TagSuffix,
        dry_run: bool,
    ) -> FileReport {
        let skip = |reason| FileReport {
            name: entry.name.clone(),
            target: None,
            outcome: RenameOutcome::Skipped(reason),
        };

        if entry.is_hidden() {
            debug!("skipping hidden file {}", entry.name);
            return skip(SkipReason::Hidden);
        }
        if is_tagged(&entry.stem) {
            debug!("skipping {}: already tagged", entry.name);
            return skip(SkipReason::AlreadyTagged);
        }
        if self.exclude.is_match(Path::new(&entry.file_name)) {
            debug!("skipping {}: excluded", entry.name);
            return skip(SkipReason::Excluded);
        }

        let target_file = entry.tagged_name(suffix);
        let target = dir.join(&target_file);
        let target_name = target_file.to_string_lossy().into_owned();
        let report = |outcome| FileReport {
            name: entry.name.clone(),
            target: Some(target_name.clone()),
            outcome,
        };

        if self.ops.exists(&target) {
            warn!(
                "skipping {}: target {} already exists",
                entry.name, target_name
            );
            return report(RenameOutcome::Skipped(SkipReason::TargetCollision));
        }

        if dry_run {
            info!("[dry-run] would rename: {} -> {}", entry.name, target_name);
            return report(RenameOutcome::Renamed);
        }

        match self.ops.rename(&entry.path, &target) {
            Ok(()) => {
                info!("renamed: {} -> {}", entry.name, target_name);
                report(RenameOutcome::Renamed)
            }
            Err(e) => {
                error!("failed to rename {}: {}", entry.name, e);
                report(RenameOutcome::Errored(e.to_string()))
            }
        }
    }
}

/// Fails unless `dir` exists and is a directory.
pub fn ensure_directory(dir: &Path) -> Result<(), TagError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(TagError::NotADirectory(dir.to_path_buf())),
        Err(_) => Err(TagError::DirectoryNotFound(dir.to_path_buf())),
    }
}
