//! Offline stand-in used only by the simulated variant.

use crate::{LocationSource, ProviderError, Reading, SourceKind};
use std::time::Duration;
use tracing::warn;

pub const DUMMY_LATITUDE: f64 = 51.5074;
pub const DUMMY_LONGITUDE: f64 = -0.1278;

/// Substitutes a fixed coordinate when the wrapped lookup fails, including an
/// unreadable reply. A lookup that answered "no fix" is passed through.
pub struct DummyFallback<S> {
    inner: S,
    latitude: f64,
    longitude: f64,
}

impl<S> DummyFallback<S> {
    pub fn new(inner: S) -> Self {
        Self::with_coordinates(inner, DUMMY_LATITUDE, DUMMY_LONGITUDE)
    }

    pub fn with_coordinates(inner: S, latitude: f64, longitude: f64) -> Self {
        Self {
            inner,
            latitude,
            longitude,
        }
    }
}

#[async_trait::async_trait]
impl<S: LocationSource> LocationSource for DummyFallback<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> SourceKind {
        self.inner.kind()
    }

    async fn locate(&self, timeout: Duration) -> Result<Reading, ProviderError> {
        match self.inner.locate(timeout).await {
            Err(
                e @ (ProviderError::RequestFailed(_)
                | ProviderError::Timeout(_)
                | ProviderError::Io(_)
                | ProviderError::Malformed(_)),
            ) => {
                warn!("{} lookup failed: {}", self.inner.name(), e);
                warn!("falling back to dummy coordinates for testing");
                Ok(Reading {
                    latitude: self.latitude,
                    longitude: self.longitude,
                    provider: "dummy".to_string(),
                })
            }
            other => other,
        }
    }
}
