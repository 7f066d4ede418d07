//! tw CLI binary.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tw::cli::Cli;

/// Main entry point for the tw CLI.
///
/// Uses tokio's current_thread runtime; every command is a short sequence
/// of store round-trips.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // RUST_LOG wins over --verbose, e.g. RUST_LOG=tw=trace
    let default_filter = if cli.verbose { "tw=debug" } else { "tw=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("starting tw");
    cli.execute().await?;
    Ok(())
}
