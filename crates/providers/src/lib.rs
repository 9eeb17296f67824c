//! Location source abstractions: on-device service, command-line utility,
//! network estimate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod ip_api;
pub mod simulated;
pub mod sl4a;
pub mod termux;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("no fix available")]
    NoFix,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed location data: {0}")]
    Malformed(String),
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which tier of the fallback chain produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    PrimaryService,
    SecondaryService,
    NetworkEstimate,
}

/// A raw coordinate pair as reported by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub latitude: f64,
    pub longitude: f64,
    /// Provider tag reported alongside the fix (`gps`, `network`, `ip-api`, ...).
    pub provider: String,
}

impl Reading {
    /// Extracts numeric coordinates from a JSON object.
    ///
    /// Missing or non-numeric fields yield [`ProviderError::Malformed`].
    pub fn from_json(
        value: &Value,
        lat_key: &str,
        lng_key: &str,
        provider: &str,
    ) -> Result<Self, ProviderError> {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    ProviderError::Malformed(format!("{provider}: missing numeric `{key}`"))
                })
        };
        Ok(Self {
            latitude: field(lat_key)?,
            longitude: field(lng_key)?,
            provider: provider.to_string(),
        })
    }
}

#[async_trait::async_trait]
pub trait LocationSource: Send + Sync {
    /// Short name used in logs and failure reports.
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Attempts one fix. `timeout` is the overall budget of the run; sources
    /// with fixed sub-timeouts of their own may ignore it.
    async fn locate(&self, timeout: Duration) -> Result<Reading, ProviderError>;
}

/// Ordered list of sources, tried front to back.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn LocationSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: Arc<dyn LocationSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn LocationSource>> {
        self.sources.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
