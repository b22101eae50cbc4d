use anyhow::Result;
use clap::Parser;
use skillkit::cli::confluence::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    skillkit::telemetry::init();

    let cli = Cli::parse();
    tracing::debug!(command = ?cli, "Arguments parsed");
    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("Completed successfully"),
        Err(e) => tracing::debug!(error = %e, "Exited with error"),
    }
    result
}
