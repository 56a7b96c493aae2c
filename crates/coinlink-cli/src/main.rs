//! Coinlink kiosk binary.
//!
//! Wires storage, enforcement, GPIO and the background schedulers into one
//! running controller.

mod app;
mod cli;
mod shutdown;

use tracing_subscriber::EnvFilter;

use crate::app::Kiosk;
use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .init();

    tracing::info!("coinlink v{}", coinlink_core::VERSION);

    let kiosk = Kiosk::start(&cli).await?;
    kiosk.run().await
}
