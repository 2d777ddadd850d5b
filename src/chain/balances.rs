use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use solana_sdk::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};
use tracing::debug;

use crate::chain::client::SolanaRpc;
use crate::chain::metadata::TokenMetadataResolver;
use crate::error::{AppResult, ChainError};

/// One non-empty token holding of a wallet
#[derive(Debug, Clone)]
pub struct TokenBalance {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub balance: Decimal,
    pub decimals: u8,
}

/// Full balance picture for one wallet: native SOL plus every token account
/// with a non-zero balance.
#[derive(Debug, Clone)]
pub struct WalletBalances {
    pub native: Decimal,
    pub tokens: Vec<TokenBalance>,
}

impl WalletBalances {
    pub fn token(&self, mint: &str) -> Option<&TokenBalance> {
        self.tokens.iter().find(|t| t.address == mint)
    }
}

/// Reads wallet balances over RPC and decorates token entries with display
/// metadata.
pub struct BalanceInspector {
    rpc: Arc<SolanaRpc>,
    metadata: Arc<TokenMetadataResolver>,
}

impl BalanceInspector {
    pub fn new(rpc: Arc<SolanaRpc>, metadata: Arc<TokenMetadataResolver>) -> Self {
        Self { rpc, metadata }
    }

    pub async fn wallet_balances(&self, address: &str) -> AppResult<WalletBalances> {
        let owner = Pubkey::from_str(address)
            .map_err(|_| ChainError::InvalidAddress(address.to_string()))?;

        let lamports = self.rpc.lamports(&owner).await?;
        let accounts = self.rpc.parsed_token_accounts(&owner).await?;

        let mut tokens = Vec::new();
        for account in accounts {
            if account.balance.is_zero() {
                continue;
            }

            let metadata = self.metadata.resolve(&account.mint).await;
            tokens.push(TokenBalance {
                address: account.mint,
                name: metadata.name,
                symbol: metadata.symbol,
                balance: account.balance,
                decimals: account.decimals,
            });
        }

        let native = Decimal::from(lamports) / Decimal::from(LAMPORTS_PER_SOL);
        debug!(
            "🔍 Balances for {}: {} SOL, {} token(s)",
            address,
            native,
            tokens.len()
        );

        Ok(WalletBalances { native, tokens })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_balances() -> WalletBalances {
        WalletBalances {
            native: dec!(1.5),
            tokens: vec![TokenBalance {
                address: "So11111111111111111111111111111111111111112".to_string(),
                name: "Wrapped SOL".to_string(),
                symbol: "wSOL".to_string(),
                balance: dec!(42),
                decimals: 9,
            }],
        }
    }

    #[test]
    fn test_token_lookup_by_mint() {
        let balances = sample_balances();
        let entry = balances
            .token("So11111111111111111111111111111111111111112")
            .unwrap();
        assert_eq!(entry.balance, dec!(42));
        assert_eq!(entry.symbol, "wSOL");
    }

    #[test]
    fn test_token_lookup_misses_unknown_mint() {
        let balances = sample_balances();
        assert!(balances.token("UnknownMint").is_none());
    }
}
