use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub tagging: TaggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Overall budget in seconds; also the polling window of the primary service.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub range_policy: RangePolicy,
    #[serde(default)]
    pub termux: TermuxConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

/// What to do with coordinates outside [-90, 90] / [-180, 180].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePolicy {
    #[default]
    PassThrough,
    Clamp,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermuxConfig {
    #[serde(default = "default_termux_program")]
    pub program: String,
    #[serde(default = "default_termux_provider")]
    pub provider: String,
    #[serde(default = "default_last_timeout_secs")]
    pub last_timeout_secs: u64,
    #[serde(default = "default_fresh_timeout_secs")]
    pub fresh_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_network_url")]
    pub url: String,
    #[serde(default = "default_network_timeout_secs")]
    pub timeout_secs: u64,
    /// Substitute fixed coordinates when the lookup cannot reach the network.
    /// Only ever consulted by the simulated variant.
    #[serde(default = "default_true")]
    pub dummy_fallback: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaggingConfig {
    #[serde(default)]
    pub dry_run: bool,
    /// Glob patterns matched against file names; matches are never renamed.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl LocationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            range_policy: RangePolicy::default(),
            termux: TermuxConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl Default for TermuxConfig {
    fn default() -> Self {
        Self {
            program: default_termux_program(),
            provider: default_termux_provider(),
            last_timeout_secs: default_last_timeout_secs(),
            fresh_timeout_secs: default_fresh_timeout_secs(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            url: default_network_url(),
            timeout_secs: default_network_timeout_secs(),
            dummy_fallback: true,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_termux_program() -> String {
    providers::termux::DEFAULT_PROGRAM.to_string()
}

fn default_termux_provider() -> String {
    "gps".to_string()
}

fn default_last_timeout_secs() -> u64 {
    3
}

fn default_fresh_timeout_secs() -> u64 {
    25
}

fn default_network_url() -> String {
    providers::ip_api::DEFAULT_URL.to_string()
}

fn default_network_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(config::Environment::with_prefix("GEOTAG").separator("__"));
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();
        let cfg = load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(cfg.location.timeout_secs, 30);
        assert_eq!(cfg.location.poll_interval_ms, 1000);
        assert_eq!(cfg.location.termux.last_timeout_secs, 3);
        assert_eq!(cfg.location.termux.fresh_timeout_secs, 25);
        assert_eq!(cfg.location.range_policy, RangePolicy::PassThrough);
        assert!(cfg.location.network.dummy_fallback);
        assert!(!cfg.tagging.dry_run);
    }

    #[test]
    fn explicit_file_overrides_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geotag.toml");
        std::fs::write(
            &path,
            r#"
[location]
timeout_secs = 12
range_policy = "clamp"

[location.termux]
provider = "network"

[tagging]
exclude = ["*.part"]
"#,
        )
        .unwrap();
        let cfg = load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(cfg.location.timeout_secs, 12);
        assert_eq!(cfg.location.range_policy, RangePolicy::Clamp);
        assert_eq!(cfg.location.termux.provider, "network");
        assert_eq!(cfg.location.termux.program, "termux-location");
        assert_eq!(cfg.tagging.exclude, vec!["*.part".to_string()]);
    }
}
