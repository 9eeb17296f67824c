use std::path::PathBuf;
use thiserror::Error;

/// Terminal failure of the whole fallback chain.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("timed out waiting for a location fix (tried: {})", attempted.join(", "))]
    Timeout { attempted: Vec<String> },
    #[error("no location source produced a fix (tried: {})", display_attempts(attempted))]
    SourceUnavailable { attempted: Vec<String> },
}

fn display_attempts(attempted: &[String]) -> String {
    if attempted.is_empty() {
        "none available".to_string()
    } else {
        attempted.join(", ")
    }
}

#[derive(Debug, Error)]
pub enum TagError {
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error("invalid exclude pattern: {0}")]
    InvalidPattern(#[from] globset::Error),
}
