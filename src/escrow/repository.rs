use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::escrow::models::{EscrowTrade, TradeStatus};

/// Persistence for escrow trade records. Every mutation touches
/// `updated_at`; status transitions are single-row updates so a crash
/// between writes never loses a recorded signature.
pub struct TradeRepository {
    pool: PgPool,
}

impl TradeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, trade: &EscrowTrade) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO escrow_trades (
                id, creator_user_id, creator_wallet,
                token_mint, token_amount, token_recipient, token_name, token_symbol,
                native_amount, native_recipient,
                escrow_address, escrow_secret,
                status, status_message, token_received, native_received,
                token_tx_id, native_tx_id,
                created_at, updated_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(trade.id)
        .bind(trade.creator.user_id)
        .bind(&trade.creator.wallet_address)
        .bind(&trade.token.address)
        .bind(trade.token.amount.to_string())
        .bind(&trade.token.recipient)
        .bind(&trade.token.name)
        .bind(&trade.token.symbol)
        .bind(trade.native.amount.to_string())
        .bind(&trade.native.recipient)
        .bind(&trade.escrow_wallet.public_address)
        .bind(&trade.escrow_wallet.secret_base58)
        .bind(trade.status)
        .bind(&trade.status_message)
        .bind(trade.token_received)
        .bind(trade.native_received)
        .bind(&trade.token_tx_id)
        .bind(&trade.native_tx_id)
        .bind(trade.created_at)
        .bind(trade.updated_at)
        .bind(trade.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> AppResult<EscrowTrade> {
        let row = sqlx::query("SELECT * FROM escrow_trades WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Trade not found: {}", id)))?;

        EscrowTrade::from_row(&row)
    }

    /// Every trade the settlement cycle still needs to visit. Terminal
    /// trades are excluded here, not filtered by the caller.
    pub async fn active_trades(&self) -> AppResult<Vec<EscrowTrade>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM escrow_trades
            WHERE status IN ('awaiting_token', 'awaiting_native', 'transferring_funds')
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(EscrowTrade::from_row).collect()
    }

    pub async fn set_status_message(&self, id: Uuid, message: &str) -> AppResult<()> {
        sqlx::query("UPDATE escrow_trades SET status_message = $1, updated_at = $2 WHERE id = $3")
            .bind(message)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn mark_expired(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE escrow_trades SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(TradeStatus::Expired)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Token deposit cleared: advance to awaiting_native and clear the
    /// shortfall prompt.
    pub async fn mark_token_received(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE escrow_trades
            SET status = $1, token_received = TRUE, status_message = NULL, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(TradeStatus::AwaitingNative)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Native deposit cleared: advance to transferring_funds and clear the
    /// shortfall prompt.
    pub async fn mark_native_received(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE escrow_trades
            SET status = $1, native_received = TRUE, status_message = NULL, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(TradeStatus::TransferringFunds)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn record_token_tx(&self, id: Uuid, signature: &str) -> AppResult<()> {
        sqlx::query("UPDATE escrow_trades SET token_tx_id = $1, updated_at = $2 WHERE id = $3")
            .bind(signature)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn record_native_tx(&self, id: Uuid, signature: &str) -> AppResult<()> {
        sqlx::query("UPDATE escrow_trades SET native_tx_id = $1, updated_at = $2 WHERE id = $3")
            .bind(signature)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Both legs confirmed and recorded: the trade is done.
    pub async fn mark_transferred(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE escrow_trades
            SET status = $1, status_message = NULL, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(TradeStatus::TransferredFunds)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
