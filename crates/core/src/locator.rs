//! Location fallback chain.
//!
//! Availability is probed once at startup into a [`SourceAvailability`]
//! value, turned into an ordered [`SourceRegistry`] for the chosen
//! [`Variant`], and walked front to back by [`LocationProvider::acquire`].

use crate::config::{LocationConfig, RangePolicy};
use crate::error::LocationError;
use crate::models::LocationFix;
use providers::ip_api::IpApiSource;
use providers::simulated::DummyFallback;
use providers::sl4a::{Sl4aClient, Sl4aEndpoint, Sl4aSource};
use providers::termux::TermuxSource;
use providers::{ProviderError, Reading, SourceKind, SourceRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// On-device service, then the command-line utility. Never estimates.
    Production,
    /// IP geolocation only, optionally with dummy coordinates when offline.
    Simulated,
}

/// Which sources the host offers, computed once and passed explicitly.
#[derive(Debug, Clone, Default)]
pub struct SourceAvailability {
    pub sl4a: Option<Sl4aEndpoint>,
    pub termux: Option<PathBuf>,
}

impl SourceAvailability {
    pub fn probe(cfg: &LocationConfig) -> Self {
        let availability = Self {
            sl4a: Sl4aEndpoint::from_env(),
            termux: TermuxSource::probe(&cfg.termux.program),
        };
        if availability.sl4a.is_none() {
            warn!("SL4A facade not found; on-device location service unavailable");
        }
        debug!("source availability: {:?}", availability);
        availability
    }
}

/// Builds the ordered source list for `variant`. Sources that fail to
/// initialise are logged and left out.
pub async fn build_registry(
    cfg: &LocationConfig,
    availability: &SourceAvailability,
    variant: Variant,
) -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    match variant {
        Variant::Production => {
            if let Some(endpoint) = &availability.sl4a {
                match Sl4aClient::connect(endpoint).await {
                    Ok(client) => {
                        registry = registry.with_source(Arc::new(Sl4aSource::new(
                            Arc::new(client),
                            cfg.poll_interval(),
                        )));
                    }
                    Err(e) => warn!("failed to initialise SL4A client: {}", e),
                }
            }
            if let Some(program) = &availability.termux {
                registry = registry.with_source(Arc::new(TermuxSource::new(
                    program.clone(),
                    cfg.termux.provider.clone(),
                    Duration::from_secs(cfg.termux.last_timeout_secs),
                    Duration::from_secs(cfg.termux.fresh_timeout_secs),
                )));
            }
        }
        Variant::Simulated => {
            let timeout = Duration::from_secs(cfg.network.timeout_secs);
            match IpApiSource::new(cfg.network.url.clone(), timeout) {
                Ok(source) if cfg.network.dummy_fallback => {
                    registry = registry.with_source(Arc::new(DummyFallback::new(source)));
                }
                Ok(source) => registry = registry.with_source(Arc::new(source)),
                Err(e) => warn!("failed to initialise network lookup: {}", e),
            }
        }
    }
    info!("location sources: {:?}", registry.names());
    registry
}

pub struct LocationProvider {
    registry: SourceRegistry,
    range_policy: RangePolicy,
}

impl LocationProvider {
    pub fn new(registry: SourceRegistry, range_policy: RangePolicy) -> Self {
        Self {
            registry,
            range_policy,
        }
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Returns the first valid fix from the chain. Every source is tried in
    /// order; the first reading that passes validation wins.
    pub async fn acquire(&self, timeout: Duration) -> Result<LocationFix, LocationError> {
        let mut attempted = Vec::new();
        let mut timed_out = false;

        for source in self.registry.iter() {
            attempted.push(source.name().to_string());
            match source.locate(timeout).await {
                Ok(reading) => match self.accept(&reading, source.kind()) {
                    Some(fix) => {
                        info!(
                            "fix from {} ({}): {:.5}, {:.5}",
                            source.name(),
                            fix.provider(),
                            fix.latitude(),
                            fix.longitude()
                        );
                        return Ok(fix);
                    }
                    None => warn!("discarding invalid reading from {}: {:?}", source.name(), reading),
                },
                Err(ProviderError::Timeout(after)) => {
                    timed_out = true;
                    warn!("{} timed out after {:?}", source.name(), after);
                }
                Err(e) => warn!("{} produced no fix: {}", source.name(), e),
            }
        }

        if timed_out {
            Err(LocationError::Timeout { attempted })
        } else {
            Err(LocationError::SourceUnavailable { attempted })
        }
    }

    fn accept(&self, reading: &Reading, kind: SourceKind) -> Option<LocationFix> {
        let fix = LocationFix::from_reading(reading, kind)?;
        if fix.in_range() {
            return Some(fix);
        }
        match self.range_policy {
            RangePolicy::PassThrough => {
                warn!(
                    "coordinates out of range ({}, {}); passing through",
                    fix.latitude(),
                    fix.longitude()
                );
                Some(fix)
            }
            RangePolicy::Clamp => Some(fix.clamped()),
            RangePolicy::Reject => None,
        }
    }
}
