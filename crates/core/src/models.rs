use chrono::{DateTime, Utc};
use providers::{Reading, SourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::PathBuf;

pub type FixSource = SourceKind;

/// Marker substrings that identify an already tagged stem.
pub const LAT_MARKER: &str = "_Lat_";
pub const LNG_MARKER: &str = "_Lng_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    latitude: f64,
    longitude: f64,
    source: FixSource,
    provider: String,
    acquired_at: DateTime<Utc>,
}

impl LocationFix {
    /// Returns `None` unless both coordinates are finite numbers.
    pub fn new(latitude: f64, longitude: f64, source: FixSource, provider: &str) -> Option<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        Some(Self {
            latitude,
            longitude,
            source,
            provider: provider.to_string(),
            acquired_at: Utc::now(),
        })
    }

    pub fn from_reading(reading: &Reading, source: FixSource) -> Option<Self> {
        Self::new(reading.latitude, reading.longitude, source, &reading.provider)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn source(&self) -> FixSource {
        self.source
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn clamped(&self) -> Self {
        Self {
            latitude: self.latitude.clamp(-90.0, 90.0),
            longitude: self.longitude.clamp(-180.0, 180.0),
            ..self.clone()
        }
    }

    pub fn tag_suffix(&self) -> TagSuffix {
        TagSuffix::from_fix(self)
    }
}

/// `_Lat_<lat>_Lng_<lng>` with five decimals each.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagSuffix(String);

impl TagSuffix {
    pub fn from_fix(fix: &LocationFix) -> Self {
        Self::from_coordinates(fix.latitude, fix.longitude)
    }

    pub fn from_coordinates(latitude: f64, longitude: f64) -> Self {
        Self(format!("{LAT_MARKER}{latitude:.5}{LNG_MARKER}{longitude:.5}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// True when the stem already carries both coordinate markers.
pub fn is_tagged(stem: &str) -> bool {
    stem.contains(LAT_MARKER) && stem.contains(LNG_MARKER)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Display form of the name; lossy when the name is not valid UTF-8.
    pub name: String,
    pub stem: String,
    /// Includes the leading dot, empty when the name has none.
    pub extension: String,
    pub path: PathBuf,
    /// The name exactly as the filesystem reported it.
    pub file_name: OsString,
}

impl FileEntry {
    pub fn new(file_name: impl AsRef<OsStr>, path: PathBuf) -> Self {
        let file_name = file_name.as_ref().to_os_string();
        let name = file_name.to_string_lossy().into_owned();
        let (stem, extension) = split_name(&name);
        Self {
            stem: stem.to_string(),
            extension: extension.to_string(),
            name,
            path,
            file_name,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }

    /// `stem + suffix + extension`, built from the raw name so bytes that
    /// are not valid UTF-8 survive the rename.
    pub fn tagged_name(&self, suffix: &TagSuffix) -> OsString {
        match self.file_name.to_str() {
            Some(_) => format!("{}{}{}", self.stem, suffix, self.extension).into(),
            None => raw_tagged_name(&self.file_name, suffix),
        }
    }
}

#[cfg(unix)]
fn raw_tagged_name(name: &OsStr, suffix: &TagSuffix) -> OsString {
    use std::os::unix::ffi::{OsStrExt, OsStringExt};

    let bytes = name.as_bytes();
    let (stem, extension) = bytes.split_at(extension_start(bytes));
    let mut out = Vec::with_capacity(bytes.len() + suffix.as_str().len());
    out.extend_from_slice(stem);
    out.extend_from_slice(suffix.as_str().as_bytes());
    out.extend_from_slice(extension);
    OsString::from_vec(out)
}

#[cfg(not(unix))]
fn raw_tagged_name(name: &OsStr, suffix: &TagSuffix) -> OsString {
    let lossy = name.to_string_lossy();
    let (stem, extension) = split_name(&lossy);
    format!("{stem}{suffix}{extension}").into()
}

/// Byte offset of the extension's dot, or `name.len()` when there is none.
fn extension_start(name: &[u8]) -> usize {
    let body_start = name.iter().take_while(|&&b| b == b'.').count();
    name[body_start..]
        .iter()
        .rposition(|&b| b == b'.')
        .map_or(name.len(), |idx| body_start + idx)
}

/// Splits at the last `.`; leading dots never start an extension.
pub fn split_name(name: &str) -> (&str, &str) {
    name.split_at(extension_start(name.as_bytes()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyTagged,
    Hidden,
    Excluded,
    TargetCollision,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::AlreadyTagged => "already tagged",
            SkipReason::Hidden => "hidden",
            SkipReason::Excluded => "excluded",
            SkipReason::TargetCollision => "target exists",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RenameOutcome {
    /// Renamed, or would be renamed in a dry run.
    Renamed,
    Skipped(SkipReason),
    Errored(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub name: String,
    pub target: Option<String>,
    pub outcome: RenameOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub renamed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub skipped_by_reason: BTreeMap<SkipReason, usize>,
    pub files: Vec<FileReport>,
}

impl RunSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    pub fn record(&mut self, report: FileReport) {
        match &report.outcome {
            RenameOutcome::Renamed => self.renamed += 1,
            RenameOutcome::Skipped(reason) => {
                self.skipped += 1;
                *self.skipped_by_reason.entry(*reason).or_default() += 1;
            }
            RenameOutcome::Errored(_) => self.errors += 1,
        }
        self.files.push(report);
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped_by_reason.get(&reason).copied().unwrap_or(0)
    }
}
