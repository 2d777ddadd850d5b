use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::signature::{Keypair, Signer};
use sqlx::Type;
use std::fmt;
use uuid::Uuid;

use crate::chain::metadata::TokenMetadata;
use crate::error::{AppError, AppResult};

/// How long a trade may sit unfunded before it expires
const TRADE_TTL_HOURS: i64 = 1;

/// Lifecycle state of an escrow trade. Expiry can interrupt any non-terminal
/// state; `TransferredFunds` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "trade_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    AwaitingToken,
    AwaitingNative,
    TransferringFunds,
    TransferredFunds,
    Expired,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::AwaitingToken => "awaiting_token",
            TradeStatus::AwaitingNative => "awaiting_native",
            TradeStatus::TransferringFunds => "transferring_funds",
            TradeStatus::TransferredFunds => "transferred_funds",
            TradeStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeStatus::TransferredFunds | TradeStatus::Expired)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeCreator {
    pub user_id: Uuid,
    pub wallet_address: String,
}

/// The token side of the trade: what the creator deposits and where it goes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLeg {
    pub address: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub recipient: String,
    pub name: String,
    pub symbol: String,
}

/// The SOL side of the trade: what the counterparty deposits and where it goes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeLeg {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub recipient: String,
}

/// Per-trade deposit wallet. The secret signs outbound transfers and must
/// never appear in logs or API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowWallet {
    pub public_address: String,
    #[serde(skip_serializing)]
    pub secret_base58: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowTrade {
    pub id: Uuid,
    pub creator: TradeCreator,
    pub token: TokenLeg,
    pub native: NativeLeg,
    pub escrow_wallet: EscrowWallet,
    pub status: TradeStatus,
    pub status_message: Option<String>,
    pub token_received: bool,
    pub native_received: bool,
    pub token_tx_id: Option<String>,
    pub native_tx_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Parameters for creating a trade
#[derive(Debug, Clone, Deserialize)]
pub struct NewTrade {
    pub creator: TradeCreator,
    pub token_mint: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub token_amount: Decimal,
    pub token_recipient: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub native_amount: Decimal,
    pub native_recipient: String,
}

impl EscrowTrade {
    /// Build a trade record in its initial state, bound to a fresh escrow
    /// wallet.
    pub fn new(params: NewTrade, metadata: TokenMetadata, escrow: &Keypair) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            creator: params.creator,
            token: TokenLeg {
                address: params.token_mint,
                amount: params.token_amount,
                recipient: params.token_recipient,
                name: metadata.name,
                symbol: metadata.symbol,
            },
            native: NativeLeg {
                amount: params.native_amount,
                recipient: params.native_recipient,
            },
            escrow_wallet: EscrowWallet {
                public_address: escrow.pubkey().to_string(),
                secret_base58: escrow.to_base58_string(),
            },
            status: TradeStatus::AwaitingToken,
            status_message: Some("Waiting for tokens...".to_string()),
            token_received: false,
            native_received: false,
            token_tx_id: None,
            native_tx_id: None,
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::hours(TRADE_TTL_HOURS),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// A leg whose signature is on record confirmed in an earlier cycle and
    /// must not be re-sent.
    pub fn token_leg_pending(&self) -> bool {
        self.token_tx_id.is_none()
    }

    pub fn native_leg_pending(&self) -> bool {
        self.native_tx_id.is_none()
    }

    /// Reconstruct the signing keypair from the stored secret.
    pub fn signing_keypair(&self) -> Keypair {
        Keypair::from_base58_string(&self.escrow_wallet.secret_base58)
    }

    pub fn from_row(row: &sqlx::postgres::PgRow) -> AppResult<Self> {
        use sqlx::Row;
        use std::str::FromStr;

        let token_amount: String = row.try_get("token_amount")?;
        let token_amount = Decimal::from_str(&token_amount)
            .map_err(|_| AppError::InvalidInput("Invalid token amount format".to_string()))?;
        let native_amount: String = row.try_get("native_amount")?;
        let native_amount = Decimal::from_str(&native_amount)
            .map_err(|_| AppError::InvalidInput("Invalid native amount format".to_string()))?;

        Ok(EscrowTrade {
            id: row.try_get("id")?,
            creator: TradeCreator {
                user_id: row.try_get("creator_user_id")?,
                wallet_address: row.try_get("creator_wallet")?,
            },
            token: TokenLeg {
                address: row.try_get("token_mint")?,
                amount: token_amount,
                recipient: row.try_get("token_recipient")?,
                name: row.try_get("token_name")?,
                symbol: row.try_get("token_symbol")?,
            },
            native: NativeLeg {
                amount: native_amount,
                recipient: row.try_get("native_recipient")?,
            },
            escrow_wallet: EscrowWallet {
                public_address: row.try_get("escrow_address")?,
                secret_base58: row.try_get("escrow_secret")?,
            },
            status: row.try_get("status")?,
            status_message: row.try_get("status_message")?,
            token_received: row.try_get("token_received")?,
            native_received: row.try_get("native_received")?,
            token_tx_id: row.try_get("token_tx_id")?,
            native_tx_id: row.try_get("native_tx_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_params() -> NewTrade {
        NewTrade {
            creator: TradeCreator {
                user_id: Uuid::new_v4(),
                wallet_address: "CreatorWallet111".to_string(),
            },
            token_mint: "So11111111111111111111111111111111111111112".to_string(),
            token_amount: dec!(100),
            token_recipient: "TokenRecipient111".to_string(),
            native_amount: dec!(2.5),
            native_recipient: "NativeRecipient111".to_string(),
        }
    }

    fn sample_metadata() -> TokenMetadata {
        TokenMetadata {
            name: "Wrapped SOL".to_string(),
            symbol: "wSOL".to_string(),
        }
    }

    #[test]
    fn test_new_trade_initial_state() {
        let escrow = Keypair::new();
        let trade = EscrowTrade::new(sample_params(), sample_metadata(), &escrow);

        assert_eq!(trade.status, TradeStatus::AwaitingToken);
        assert_eq!(trade.status_message.as_deref(), Some("Waiting for tokens..."));
        assert!(!trade.token_received);
        assert!(!trade.native_received);
        assert!(trade.token_tx_id.is_none());
        assert!(trade.native_tx_id.is_none());
        assert_eq!(trade.expires_at, trade.created_at + Duration::hours(1));
        assert_eq!(trade.escrow_wallet.public_address, escrow.pubkey().to_string());
    }

    #[test]
    fn test_stored_secret_round_trips_to_same_signer() {
        let escrow = Keypair::new();
        let trade = EscrowTrade::new(sample_params(), sample_metadata(), &escrow);

        let restored = trade.signing_keypair();
        assert_eq!(restored.pubkey(), escrow.pubkey());
    }

    #[test]
    fn test_fresh_trade_is_not_expired() {
        let escrow = Keypair::new();
        let trade = EscrowTrade::new(sample_params(), sample_metadata(), &escrow);
        assert!(!trade.is_expired());
    }

    #[test]
    fn test_past_deadline_is_expired() {
        let escrow = Keypair::new();
        let mut trade = EscrowTrade::new(sample_params(), sample_metadata(), &escrow);
        trade.expires_at = Utc::now() - Duration::seconds(1);
        assert!(trade.is_expired());
    }

    #[test]
    fn test_fresh_trade_has_both_legs_pending() {
        let escrow = Keypair::new();
        let trade = EscrowTrade::new(sample_params(), sample_metadata(), &escrow);

        assert!(trade.token_leg_pending());
        assert!(trade.native_leg_pending());
    }

    #[test]
    fn test_recorded_token_leg_is_not_resent() {
        let escrow = Keypair::new();
        let mut trade = EscrowTrade::new(sample_params(), sample_metadata(), &escrow);

        // Token leg confirmed in an earlier cycle; only the native leg remains
        trade.token_tx_id = Some("TokenLegSig111".to_string());

        assert!(!trade.token_leg_pending());
        assert!(trade.native_leg_pending());
    }

    #[test]
    fn test_recorded_native_leg_is_not_resent() {
        let escrow = Keypair::new();
        let mut trade = EscrowTrade::new(sample_params(), sample_metadata(), &escrow);

        trade.native_tx_id = Some("NativeLegSig111".to_string());

        assert!(trade.token_leg_pending());
        assert!(!trade.native_leg_pending());
    }

    #[test]
    fn test_terminal_states() {
        assert!(TradeStatus::TransferredFunds.is_terminal());
        assert!(TradeStatus::Expired.is_terminal());
        assert!(!TradeStatus::AwaitingToken.is_terminal());
        assert!(!TradeStatus::AwaitingNative.is_terminal());
        assert!(!TradeStatus::TransferringFunds.is_terminal());
    }

    #[test]
    fn test_status_serializes_as_snake_case() {
        assert_eq!(TradeStatus::AwaitingToken.as_str(), "awaiting_token");
        assert_eq!(TradeStatus::TransferringFunds.to_string(), "transferring_funds");
    }
}
