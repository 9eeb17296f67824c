//! Permission priming: touch the location service once so the host shows
//! its permission dialog.

use anyhow::{Context, Result};
use providers::sl4a::{LocatingService, Sl4aClient, Sl4aEndpoint};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

pub async fn run() -> Result<()> {
    let endpoint = Sl4aEndpoint::from_env().context(
        "SL4A facade not found (AP_PORT is unset); install the SL4A repository plugin and retry",
    )?;
    let client = Sl4aClient::connect(&endpoint)
        .await
        .context("connecting to SL4A facade")?;
    prime(&client, BufReader::new(tokio::io::stdin())).await
}

/// Toasts, starts locating, waits for the user to confirm, then stops.
pub async fn prime<S, R>(service: &S, mut input: R) -> Result<()>
where
    S: LocatingService + ?Sized,
    R: AsyncBufRead + Unpin,
{
    info!("attempting to request permissions...");
    if let Err(e) = service.make_toast("Requesting Permissions...").await {
        warn!("could not show toast: {}", e);
    }

    match service.start_locating().await {
        Ok(()) => info!("location service started (permission check)"),
        Err(e) => warn!("error starting location: {}", e),
    }

    println!("Please check your screen for a permission dialog and click 'Allow'.");
    println!("Press Enter to continue...");
    let mut line = String::new();
    input
        .read_line(&mut line)
        .await
        .context("reading confirmation")?;

    if let Err(e) = service.stop_locating().await {
        warn!("failed to stop location service: {}", e);
    }
    Ok(())
}
