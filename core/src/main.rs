/// ConvSync - replay driver for the conversation synchronizer
use convsync_core::{cli_app, Config};
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse configuration
    let args: Vec<String> = env::args().collect();
    let config = Config::from_args(&args)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    info!("🚀 Starting conversation sync");
    if let Some(user) = &config.current_user_id {
        info!("   User ID: {}", user);
    }
    info!("   Queue capacity: {}", config.queue_capacity);

    cli_app::run(config).await
        .map_err(|e| anyhow::anyhow!("Sync error: {:#}", e))?;

    Ok(())
}
