use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use solana_sdk::signature::Signer;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::chain::balances::BalanceInspector;
use crate::chain::transfer::TransferExecutor;
use crate::error::{AppError, AppResult, TransferError};
use crate::escrow::{EscrowTrade, TradeRepository, TradeStatus};
use crate::notify::NotificationSink;

/// Fraction of the expected deposit a trade may fall short by and still
/// clear (5%).
pub const RECEIPT_TOLERANCE: Decimal = dec!(0.05);

/// A deposit clears once it reaches the expected amount minus the tolerance
/// slack.
pub fn receipt_cleared(expected: Decimal, received: Decimal) -> bool {
    received >= expected - expected * RECEIPT_TOLERANCE
}

/// Amount still missing to reach the clearing threshold on the token leg.
pub fn token_shortfall(expected: Decimal, received: Decimal) -> Decimal {
    expected - expected * RECEIPT_TOLERANCE - received
}

/// Amount still missing relative to the full expected amount on the native
/// leg.
pub fn native_shortfall(expected: Decimal, received: Decimal) -> Decimal {
    expected - received
}

fn token_shortfall_message(expected: Decimal, received: Decimal) -> String {
    format!(
        "Please send {:.4} more tokens to complete the trade",
        token_shortfall(expected, received)
    )
}

fn native_shortfall_message(expected: Decimal, received: Decimal) -> String {
    format!(
        "Please send {:.4} more SOL to complete the trade",
        native_shortfall(expected, received)
    )
}

/// Drives every active trade through the escrow state machine:
/// awaiting_token -> awaiting_native -> transferring_funds ->
/// transferred_funds, with expiry able to interrupt any non-terminal state.
pub struct SettlementProcessor {
    trades: Arc<TradeRepository>,
    inspector: Arc<BalanceInspector>,
    executor: Arc<TransferExecutor>,
    notifier: Arc<NotificationSink>,
}

impl SettlementProcessor {
    pub fn new(
        trades: Arc<TradeRepository>,
        inspector: Arc<BalanceInspector>,
        executor: Arc<TransferExecutor>,
        notifier: Arc<NotificationSink>,
    ) -> Self {
        Self {
            trades,
            inspector,
            executor,
            notifier,
        }
    }

    /// One pass over the active trades, freshly read from the store. Trades
    /// are processed sequentially; a failure on one is logged and the rest
    /// of the batch continues.
    pub async fn run_cycle(&self, cancel: &watch::Receiver<bool>) -> AppResult<()> {
        let trades = self.trades.active_trades().await?;
        if trades.is_empty() {
            return Ok(());
        }

        info!("🔄 Settlement cycle: {} active trade(s)", trades.len());

        for trade in trades {
            if *cancel.borrow() {
                info!("🛑 Cancellation requested, stopping cycle early");
                break;
            }

            if let Err(e) = self.process_trade(&trade).await {
                error!("❌ Failed to process trade {}: {:?}", trade.id, e);
            }
        }

        Ok(())
    }

    async fn process_trade(&self, trade: &EscrowTrade) -> AppResult<()> {
        // Expiry wins over every other transition
        if trade.is_expired() {
            info!("⌛ Trade {} expired", trade.id);
            return self.trades.mark_expired(trade.id).await;
        }

        match trade.status {
            TradeStatus::AwaitingToken => self.check_token_receipt(trade).await,
            TradeStatus::AwaitingNative => self.check_native_receipt(trade).await,
            TradeStatus::TransferringFunds => self.execute_transfers(trade).await,
            TradeStatus::TransferredFunds | TradeStatus::Expired => Ok(()),
        }
    }

    async fn check_token_receipt(&self, trade: &EscrowTrade) -> AppResult<()> {
        debug!("🔍 Checking token receipt for trade {}", trade.id);
        let balances = self
            .inspector
            .wallet_balances(&trade.escrow_wallet.public_address)
            .await?;

        let entry = match balances.token(&trade.token.address) {
            Some(entry) => entry,
            // Nothing has arrived yet; leave the current prompt in place
            None => return Ok(()),
        };

        if receipt_cleared(trade.token.amount, entry.balance) {
            info!(
                "✅ Token received for trade {}: {} {}",
                trade.id, entry.balance, trade.token.symbol
            );
            self.trades.mark_token_received(trade.id).await
        } else {
            self.trades
                .set_status_message(
                    trade.id,
                    &token_shortfall_message(trade.token.amount, entry.balance),
                )
                .await
        }
    }

    async fn check_native_receipt(&self, trade: &EscrowTrade) -> AppResult<()> {
        debug!("🔍 Checking SOL receipt for trade {}", trade.id);
        let balances = self
            .inspector
            .wallet_balances(&trade.escrow_wallet.public_address)
            .await?;
        let received = balances.native;

        if receipt_cleared(trade.native.amount, received) {
            info!("✅ SOL received for trade {}: {} SOL", trade.id, received);
            self.trades.mark_native_received(trade.id).await
        } else if received > Decimal::ZERO {
            self.trades
                .set_status_message(
                    trade.id,
                    &native_shortfall_message(trade.native.amount, received),
                )
                .await
        } else {
            Ok(())
        }
    }

    /// Run the two outbound legs. Each signature is persisted the moment its
    /// leg confirms, and a leg with a recorded signature is never re-sent,
    /// so a failure or crash between legs cannot double-spend. The trade
    /// turns terminal only after both signatures are on record.
    async fn execute_transfers(&self, trade: &EscrowTrade) -> AppResult<()> {
        info!("⚙️ Executing transfers for trade {}", trade.id);
        let escrow = trade.signing_keypair();

        if let Err(e) = self
            .executor
            .check_fee_balance(&escrow.pubkey())
            .await
        {
            return self.handle_transfer_failure(trade, e).await;
        }

        if trade.token_leg_pending() {
            match self
                .executor
                .send_token(
                    &escrow,
                    &trade.token.address,
                    &trade.token.recipient,
                    trade.token.amount,
                )
                .await
            {
                Ok(signature) => {
                    self.trades.record_token_tx(trade.id, &signature).await?;
                    info!("✅ Token leg complete for trade {}: {}", trade.id, signature);
                }
                Err(e) => return self.handle_transfer_failure(trade, e).await,
            }
        } else {
            debug!("Token leg already recorded for trade {}, skipping", trade.id);
        }

        if trade.native_leg_pending() {
            match self
                .executor
                .send_native(&escrow, &trade.native.recipient)
                .await
            {
                Ok(signature) => {
                    self.trades.record_native_tx(trade.id, &signature).await?;
                    info!(
                        "✅ Native leg complete for trade {}: {}",
                        trade.id, signature
                    );
                }
                Err(e) => return self.handle_transfer_failure(trade, e).await,
            }
        } else {
            debug!(
                "Native leg already recorded for trade {}, skipping",
                trade.id
            );
        }

        self.trades.mark_transferred(trade.id).await?;
        info!("🚀 Trade {} settled", trade.id);

        self.notifier.trade_completed(trade.creator.user_id).await;
        Ok(())
    }

    /// Funding shortfalls surface to the user through status_message and
    /// wait for the next cycle; anything else propagates to the batch
    /// error log and the trade is retried as-is.
    async fn handle_transfer_failure(
        &self,
        trade: &EscrowTrade,
        error: AppError,
    ) -> AppResult<()> {
        match error {
            AppError::Transfer(
                err @ (TransferError::FeeBalanceTooLow { .. }
                | TransferError::InsufficientTokens { .. }),
            ) => {
                warn!("⚠️ Trade {} waiting on funds: {}", trade.id, err);
                self.trades
                    .set_status_message(trade.id, &err.to_string())
                    .await
            }
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_clears_within_tolerance() {
        // 96 of an expected 100 clears the 95 threshold
        assert!(receipt_cleared(dec!(100), dec!(96)));
        assert!(receipt_cleared(dec!(100), dec!(95)));
        assert!(receipt_cleared(dec!(100), dec!(100)));
        assert!(receipt_cleared(dec!(100), dec!(120)));
    }

    #[test]
    fn test_receipt_short_of_tolerance_does_not_clear() {
        assert!(!receipt_cleared(dec!(100), dec!(94.99)));
        assert!(!receipt_cleared(dec!(100), dec!(90)));
        assert!(!receipt_cleared(dec!(100), Decimal::ZERO));
    }

    #[test]
    fn test_tolerance_scales_with_expected_amount() {
        // 5% of the expected amount, not an absolute slack
        assert!(receipt_cleared(dec!(0.1), dec!(0.095)));
        assert!(!receipt_cleared(dec!(0.1), dec!(0.094)));
        assert!(receipt_cleared(dec!(1000000), dec!(950000)));
        assert!(!receipt_cleared(dec!(1000000), dec!(949999)));
    }

    #[test]
    fn test_token_shortfall_measures_to_threshold() {
        assert_eq!(token_shortfall(dec!(100), dec!(90)), dec!(5));
        assert_eq!(token_shortfall(dec!(100), Decimal::ZERO), dec!(95));
    }

    #[test]
    fn test_native_shortfall_measures_to_full_amount() {
        assert_eq!(native_shortfall(dec!(2), dec!(0.5)), dec!(1.5));
    }

    #[test]
    fn test_token_shortfall_message_wording() {
        assert_eq!(
            token_shortfall_message(dec!(100), dec!(90)),
            "Please send 5.0000 more tokens to complete the trade"
        );
    }

    #[test]
    fn test_native_shortfall_message_wording() {
        assert_eq!(
            native_shortfall_message(dec!(2), dec!(0.5)),
            "Please send 1.5000 more SOL to complete the trade"
        );
    }
}
