use std::str::FromStr;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use solana_account_decoder::UiAccountData;
use solana_client::{
    rpc_client::RpcClient, rpc_config::CommitmentConfig, rpc_request::TokenAccountsFilter,
};
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};

use crate::error::{AppResult, ChainError, TransferError};

#[derive(Debug, Clone)]
pub struct SolanaRpcConfig {
    pub rpc_url: String,
    pub commitment: CommitmentConfig,
    pub confirmation_timeout: Duration,
}

impl Default for SolanaRpcConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            commitment: CommitmentConfig::confirmed(),
            confirmation_timeout: Duration::from_secs(60),
        }
    }
}

/// One token account owned by a wallet, as reported by the RPC node
#[derive(Debug, Clone)]
pub struct ParsedTokenAccount {
    pub mint: String,
    pub balance: Decimal,
    pub decimals: u8,
}

/// Thin wrapper over the Solana JSON-RPC client. Reads raise `ChainError`;
/// the transaction path raises `TransferError` so callers can tell funding
/// problems from execution problems.
pub struct SolanaRpc {
    config: SolanaRpcConfig,
    client: RpcClient,
}

impl SolanaRpc {
    pub fn new(config: SolanaRpcConfig) -> Self {
        let client = RpcClient::new_with_commitment(config.rpc_url.clone(), config.commitment);
        Self { config, client }
    }

    pub async fn lamports(&self, address: &Pubkey) -> AppResult<u64> {
        let balance = self
            .client
            .get_balance(address)
            .map_err(|e| ChainError::Rpc(format!("Failed to get balance: {}", e)))?;
        Ok(balance)
    }

    /// All SPL token accounts owned by `owner`, with parsed balances.
    pub async fn parsed_token_accounts(
        &self,
        owner: &Pubkey,
    ) -> AppResult<Vec<ParsedTokenAccount>> {
        let accounts = self
            .client
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(spl_token::id()))
            .map_err(|e| ChainError::Rpc(format!("Failed to get token accounts: {}", e)))?;

        let mut parsed = Vec::with_capacity(accounts.len());
        for keyed in accounts {
            let account = match &keyed.account.data {
                UiAccountData::Json(account) => account,
                _ => {
                    return Err(ChainError::MalformedAccount {
                        account: keyed.pubkey.clone(),
                        message: "expected jsonParsed account data".to_string(),
                    }
                    .into());
                }
            };

            let info = &account.parsed["info"];
            let mint = info["mint"]
                .as_str()
                .ok_or_else(|| ChainError::MalformedAccount {
                    account: keyed.pubkey.clone(),
                    message: "missing mint".to_string(),
                })?
                .to_string();
            let ui_amount = info["tokenAmount"]["uiAmountString"]
                .as_str()
                .ok_or_else(|| ChainError::MalformedAccount {
                    account: keyed.pubkey.clone(),
                    message: "missing token amount".to_string(),
                })?;
            let balance =
                Decimal::from_str(ui_amount).map_err(|_| ChainError::MalformedAccount {
                    account: keyed.pubkey.clone(),
                    message: format!("unparseable token amount: {}", ui_amount),
                })?;
            let decimals = info["tokenAmount"]["decimals"].as_u64().unwrap_or(0) as u8;

            parsed.push(ParsedTokenAccount {
                mint,
                balance,
                decimals,
            });
        }

        Ok(parsed)
    }

    /// Raw base-unit balance of a specific token account.
    pub async fn token_account_balance(&self, account: &Pubkey) -> AppResult<u64> {
        let balance = self
            .client
            .get_token_account_balance(account)
            .map_err(|e| ChainError::Rpc(format!("Failed to get token balance: {}", e)))?;

        balance
            .amount
            .parse::<u64>()
            .map_err(|_| {
                ChainError::MalformedAccount {
                    account: account.to_string(),
                    message: format!("unparseable raw amount: {}", balance.amount),
                }
                .into()
            })
    }

    pub async fn mint_decimals(&self, mint: &Pubkey) -> AppResult<u8> {
        let supply = self
            .client
            .get_token_supply(mint)
            .map_err(|e| ChainError::Rpc(format!("Failed to get token supply: {}", e)))?;
        Ok(supply.decimals)
    }

    pub async fn account_exists(&self, address: &Pubkey) -> bool {
        self.client.get_account(address).is_ok()
    }

    pub async fn latest_blockhash(&self) -> AppResult<Hash> {
        let blockhash = self
            .client
            .get_latest_blockhash()
            .map_err(|e| ChainError::Rpc(format!("Failed to get blockhash: {}", e)))?;
        Ok(blockhash)
    }

    /// Dry-run a signed transaction and reject it if the node reports it
    /// would fail on-chain.
    pub async fn simulate(&self, transaction: &Transaction) -> AppResult<()> {
        let result = self
            .client
            .simulate_transaction(transaction)
            .map_err(|e| TransferError::SimulationFailed(format!("{}", e)))?;

        if let Some(err) = result.value.err {
            return Err(
                TransferError::SimulationFailed(format!("Transaction would fail: {:?}", err))
                    .into(),
            );
        }

        Ok(())
    }

    pub async fn send(&self, transaction: &Transaction) -> AppResult<Signature> {
        let signature = self
            .client
            .send_transaction(transaction)
            .map_err(|e| TransferError::BroadcastFailed(format!("{}", e)))?;
        Ok(signature)
    }

    /// Poll a signature until it reaches the configured commitment, the
    /// transaction fails, or the confirmation timeout elapses.
    pub async fn confirm(&self, signature: &Signature) -> AppResult<()> {
        let start = Instant::now();

        loop {
            if let Ok(response) = self.client.get_signature_statuses(&[*signature]) {
                if let Some(Some(status)) = response.value.first() {
                    if let Some(err) = &status.err {
                        return Err(TransferError::BroadcastFailed(format!(
                            "Transaction failed on-chain: {:?}",
                            err
                        ))
                        .into());
                    }
                    if status.confirmation_status.is_some() {
                        return Ok(());
                    }
                }
            }

            if start.elapsed() > self.config.confirmation_timeout {
                return Err(TransferError::ConfirmationTimeout(signature.to_string()).into());
            }

            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_targets_mainnet_at_confirmed() {
        let config = SolanaRpcConfig::default();

        assert_eq!(config.rpc_url, "https://api.mainnet-beta.solana.com");
        assert_eq!(config.commitment, CommitmentConfig::confirmed());
        assert_eq!(config.confirmation_timeout, Duration::from_secs(60));
    }
}
