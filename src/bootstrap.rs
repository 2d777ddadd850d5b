use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::chain::{
    BalanceInspector, SolanaRpc, SolanaRpcConfig, TokenMetadataResolver, TransferExecutor,
};
use crate::config::Config;
use crate::error::AppResult;
use crate::escrow::{TradeIntake, TradeRepository};
use crate::notify::NotificationSink;
use crate::settlement::{SettlementProcessor, SettlementScheduler};

/// Everything main needs to run the service
pub struct ProcessorState {
    pub scheduler: Arc<SettlementScheduler>,
    pub intake: Arc<TradeIntake>,
}

pub async fn initialize_processor(config: &Config) -> AppResult<ProcessorState> {
    info!("Initializing settlement components...");

    let pool = initialize_database(&config.database_url).await?;

    let trades = Arc::new(TradeRepository::new(pool.clone()));
    info!("✅ Trade repository initialized");

    let rpc = Arc::new(SolanaRpc::new(SolanaRpcConfig {
        rpc_url: config.solana_rpc_url.clone(),
        ..SolanaRpcConfig::default()
    }));
    info!("✅ Solana RPC client initialized ({})", config.solana_rpc_url);

    let metadata = Arc::new(TokenMetadataResolver::new(
        config.jupiter_token_api_url.clone(),
    ));
    let inspector = Arc::new(BalanceInspector::new(rpc.clone(), metadata.clone()));
    info!("✅ Balance inspector initialized");

    let executor = Arc::new(TransferExecutor::new(rpc.clone()));
    info!("✅ Transfer executor initialized");

    let notifier = Arc::new(NotificationSink::new(pool.clone()));
    info!("✅ Notification sink initialized");

    let processor = Arc::new(SettlementProcessor::new(
        trades.clone(),
        inspector,
        executor,
        notifier,
    ));
    let scheduler = Arc::new(SettlementScheduler::new(processor));
    info!("✅ Settlement processor initialized");

    let intake = Arc::new(TradeIntake::new(trades, metadata));
    info!("✅ Trade intake initialized");

    Ok(ProcessorState { scheduler, intake })
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await?;

    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("✓ Database initialized");
    Ok(pool)
}
