use std::sync::Arc;

use solana_sdk::signature::Keypair;
use tracing::info;

use crate::chain::metadata::TokenMetadataResolver;
use crate::error::AppResult;
use crate::escrow::models::{EscrowTrade, NewTrade};
use crate::escrow::repository::TradeRepository;

/// Creates trades in their initial awaiting_token state: resolves display
/// metadata for the traded mint, generates a fresh escrow wallet, persists
/// the record.
pub struct TradeIntake {
    trades: Arc<TradeRepository>,
    metadata: Arc<TokenMetadataResolver>,
}

impl TradeIntake {
    pub fn new(trades: Arc<TradeRepository>, metadata: Arc<TokenMetadataResolver>) -> Self {
        Self { trades, metadata }
    }

    pub async fn create_trade(&self, params: NewTrade) -> AppResult<EscrowTrade> {
        let metadata = self.metadata.resolve(&params.token_mint).await;
        let escrow = Keypair::new();

        let trade = EscrowTrade::new(params, metadata, &escrow);
        self.trades.insert(&trade).await?;

        info!(
            "💫 Created trade {} (escrow {})",
            trade.id, trade.escrow_wallet.public_address
        );

        Ok(trade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn test_intake_construction() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/escrow_settlement")
            .unwrap();
        let trades = Arc::new(TradeRepository::new(pool));
        let metadata = Arc::new(TokenMetadataResolver::new(
            "https://api.jup.ag/tokens/v1/token".to_string(),
        ));

        let _intake = TradeIntake::new(trades, metadata);
    }
}
