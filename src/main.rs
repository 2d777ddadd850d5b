mod bootstrap;
mod chain;
mod config;
mod error;
mod escrow;
mod notify;
mod settlement;

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,escrow_settlement=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("🚀 Starting OTC escrow settlement processor");

    dotenv::dotenv().ok();
    let config = config::Config::from_env()?;

    let state = bootstrap::initialize_processor(&config).await?;

    state.scheduler.start();
    info!("⚙️ Settlement processor running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;

    state.scheduler.stop().await;
    info!("👋 Shutdown complete");

    Ok(())
}
