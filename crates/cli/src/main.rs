use anyhow::{Context, Result};
use clap::Parser;
use cli::{paths, prime, report};
use geotag_core::config;
use geotag_core::error::TagError;
use geotag_core::locator::{self, LocationProvider, SourceAvailability, Variant};
use geotag_core::tagger::TaggingEngine;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[derive(Parser)]
#[command(name = "geotag")]
#[command(about = "Append the current GPS location to file names in a directory", long_about = None)]
struct Cli {
    /// Directory containing the files to tag
    #[arg(required_unless_present = "prime")]
    directory: Option<String>,

    /// Seconds to wait for a location fix (default: 30)
    #[arg(long)]
    timeout: Option<u64>,

    /// Report what would be renamed without touching any file
    #[arg(long)]
    dry_run: bool,

    /// Estimate the location from the public IP address instead of device sources
    #[arg(long)]
    simulate: bool,

    /// With --simulate, fail instead of using dummy coordinates when offline
    #[arg(long, requires = "simulate")]
    no_dummy_fallback: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Trigger the location permission dialog and exit
    #[arg(long, conflicts_with_all = ["directory", "simulate", "dry_run"])]
    prime: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut cfg = config::load(cli.config.as_deref())?;
    if let Some(timeout) = cli.timeout {
        cfg.location.timeout_secs = timeout;
    }
    if cli.no_dummy_fallback {
        cfg.location.network.dummy_fallback = false;
    }

    if cli.prime {
        return prime::run().await;
    }

    let directory = cli.directory.context("a directory is required")?;
    let dir = paths::expand_home(&directory);
    let dry_run = cli.dry_run || cfg.tagging.dry_run;

    let variant = if cli.simulate {
        info!("simulating GPS fix using IP geolocation");
        Variant::Simulated
    } else {
        Variant::Production
    };
    let availability = match variant {
        Variant::Production => SourceAvailability::probe(&cfg.location),
        Variant::Simulated => SourceAvailability::default(),
    };
    let registry = locator::build_registry(&cfg.location, &availability, variant).await;
    let provider = LocationProvider::new(registry, cfg.location.range_policy);
    let engine = TaggingEngine::new().with_excludes(&cfg.tagging.exclude)?;

    let run = match engine
        .tag_directory(&provider, &dir, cfg.location.timeout(), dry_run)
        .await
    {
        Ok(run) => run,
        Err(e @ TagError::Location(_)) => {
            return Err(e).context("no location data; aborting to prevent mislabelled files")
        }
        Err(e) => return Err(e.into()),
    };
    report::print(&run, cli.json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_the_documented_surface() {
        let cli = Cli::try_parse_from(["geotag", "/sdcard/DCIM"]).unwrap();
        assert_eq!(cli.directory.as_deref(), Some("/sdcard/DCIM"));
        assert_eq!(cli.timeout, None);
        assert!(!cli.dry_run);
        assert!(!cli.simulate);

        let cli =
            Cli::try_parse_from(["geotag", "photos", "--timeout", "45", "--dry-run"]).unwrap();
        assert_eq!(cli.timeout, Some(45));
        assert!(cli.dry_run);
    }

    #[test]
    fn directory_required_unless_priming() {
        assert!(Cli::try_parse_from(["geotag"]).is_err());
        assert!(Cli::try_parse_from(["geotag", "--prime"]).unwrap().prime);
        assert!(Cli::try_parse_from(["geotag", "--no-dummy-fallback", "dir"]).is_err());
        assert!(Cli::try_parse_from(["geotag", "--timeout", "abc", "dir"]).is_err());
    }
}
