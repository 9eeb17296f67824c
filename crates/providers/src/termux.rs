//! Secondary source: the `termux-location` command-line utility.

use crate::{LocationSource, ProviderError, Reading, SourceKind};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub const DEFAULT_PROGRAM: &str = "termux-location";

/// Cached read first, then a blocking fresh fix. Each call has a fixed
/// sub-timeout independent of the overall budget.
#[derive(Debug, Clone)]
pub struct TermuxSource {
    program: PathBuf,
    provider: String,
    last_timeout: Duration,
    fresh_timeout: Duration,
}

impl TermuxSource {
    /// Resolves `program` through `PATH`. `None` when the utility is absent.
    pub fn probe(program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    pub fn new(
        program: PathBuf,
        provider: impl Into<String>,
        last_timeout: Duration,
        fresh_timeout: Duration,
    ) -> Self {
        Self {
            program,
            provider: provider.into(),
            last_timeout,
            fresh_timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn request(&self, mode: &str, limit: Duration) -> Result<Reading, ProviderError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-p", self.provider.as_str(), "-r", mode])
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = timeout(limit, cmd.output())
            .await
            .map_err(|_| ProviderError::Timeout(limit))??;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::RequestFailed(format!(
                "{} -r {} exited with {}: {}",
                self.program.display(),
                mode,
                output.status,
                stderr.trim()
            )));
        }
        parse_output(&output.stdout, &self.provider)
    }
}

/// Parses the JSON object the utility prints on success.
pub fn parse_output(stdout: &[u8], provider: &str) -> Result<Reading, ProviderError> {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    if text.is_empty() {
        return Err(ProviderError::NoFix);
    }
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    Reading::from_json(&value, "latitude", "longitude", provider)
}

#[async_trait::async_trait]
impl LocationSource for TermuxSource {
    fn name(&self) -> &str {
        "termux-location"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::SecondaryService
    }

    async fn locate(&self, _timeout: Duration) -> Result<Reading, ProviderError> {
        info!("trying {}", self.program.display());
        match self.request("last", self.last_timeout).await {
            Ok(reading) => {
                debug!("using cached {} reading", self.provider);
                return Ok(reading);
            }
            Err(ProviderError::Timeout(t)) => warn!("cached location request timed out after {:?}", t),
            Err(e) => debug!("no usable cached location: {}", e),
        }

        info!(
            "requesting fresh {} fix (up to {}s)",
            self.provider,
            self.fresh_timeout.as_secs()
        );
        self.request("once", self.fresh_timeout).await
    }
}
