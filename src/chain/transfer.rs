use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use solana_sdk::{
    instruction::Instruction,
    message::Message,
    native_token::LAMPORTS_PER_SOL,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::Transaction,
};
use solana_system_interface::instruction as system_instruction;
use tracing::info;

use crate::chain::client::SolanaRpc;
use crate::error::{AppResult, ChainError, TransferError};

/// Lamports kept behind in the escrow so the account stays rent-exempt
/// (~0.002 SOL).
pub const RENT_EXEMPTION_LAMPORTS: u64 = 2_049_280;

/// Minimum escrow SOL balance required before either leg is attempted
/// (0.01 SOL).
pub const MIN_FEE_LAMPORTS: u64 = 10_000_000;

/// Base-unit amount for a token leg: the expected UI amount scaled by the
/// mint's decimal count, floored.
pub fn token_raw_amount(expected: Decimal, decimals: u8) -> u64 {
    let scale = Decimal::from(10u64.saturating_pow(u32::from(decimals)));
    (expected * scale).floor().to_u64().unwrap_or(0)
}

/// Forward 98% of the amount; the 2% haircut stays with the operator.
pub fn apply_haircut(raw: u64) -> u64 {
    ((u128::from(raw) * 98) / 100) as u64
}

/// Lamports to forward on the native leg: everything above the rent buffer,
/// net of the haircut. Never leaves the escrow below the buffer.
pub fn native_send_lamports(balance: u64) -> u64 {
    let available = balance.saturating_sub(RENT_EXEMPTION_LAMPORTS);
    ((u128::from(available) * 98) / 100) as u64
}

/// Signs and submits the two outbound legs of a settled trade from the
/// escrow wallet. Every transaction is simulated before broadcast and polled
/// to confirmation.
pub struct TransferExecutor {
    rpc: Arc<SolanaRpc>,
}

impl TransferExecutor {
    pub fn new(rpc: Arc<SolanaRpc>) -> Self {
        Self { rpc }
    }

    /// Escrow must hold enough SOL to pay transaction fees before either leg
    /// runs.
    pub async fn check_fee_balance(&self, escrow: &Pubkey) -> AppResult<()> {
        let balance = self.rpc.lamports(escrow).await?;

        if balance < MIN_FEE_LAMPORTS {
            return Err(TransferError::FeeBalanceTooLow {
                required: Decimal::from(MIN_FEE_LAMPORTS) / Decimal::from(LAMPORTS_PER_SOL),
                available: Decimal::from(balance) / Decimal::from(LAMPORTS_PER_SOL),
            }
            .into());
        }

        Ok(())
    }

    /// Forward the traded token from the escrow to its recipient, creating
    /// the recipient's associated token account if needed. Returns the
    /// confirmed signature.
    pub async fn send_token(
        &self,
        escrow: &Keypair,
        mint: &str,
        recipient: &str,
        expected_amount: Decimal,
    ) -> AppResult<String> {
        let mint_pubkey =
            Pubkey::from_str(mint).map_err(|_| ChainError::InvalidAddress(mint.to_string()))?;
        let recipient_pubkey = Pubkey::from_str(recipient)
            .map_err(|_| ChainError::InvalidAddress(recipient.to_string()))?;
        let escrow_pubkey = escrow.pubkey();

        let decimals = self.rpc.mint_decimals(&mint_pubkey).await?;
        let transfer_amount = apply_haircut(token_raw_amount(expected_amount, decimals));

        let escrow_ata = spl_associated_token_account::get_associated_token_address(
            &escrow_pubkey,
            &mint_pubkey,
        );
        // A missing source account means no tokens have landed in it yet
        let available = if self.rpc.account_exists(&escrow_ata).await {
            self.rpc.token_account_balance(&escrow_ata).await?
        } else {
            0
        };
        if available < transfer_amount {
            return Err(TransferError::InsufficientTokens {
                available,
                needed: transfer_amount,
            }
            .into());
        }

        let recipient_ata = spl_associated_token_account::get_associated_token_address(
            &recipient_pubkey,
            &mint_pubkey,
        );

        let mut instructions = Vec::new();
        if !self.rpc.account_exists(&recipient_ata).await {
            info!(
                "Creating token account {} for recipient {}",
                recipient_ata, recipient_pubkey
            );
            instructions.push(
                spl_associated_token_account::instruction::create_associated_token_account(
                    &escrow_pubkey,
                    &recipient_pubkey,
                    &mint_pubkey,
                    &spl_token::id(),
                ),
            );
        }

        instructions.push(
            spl_token::instruction::transfer(
                &spl_token::ID,
                &escrow_ata,
                &recipient_ata,
                &escrow_pubkey,
                &[&escrow_pubkey],
                transfer_amount,
            )
            .map_err(|e| {
                TransferError::AccountResolution(format!(
                    "Failed to build token transfer: {:?}",
                    e
                ))
            })?,
        );

        info!(
            "📤 Token leg: {} base units of {} to {}",
            transfer_amount, mint, recipient
        );
        self.sign_and_send(escrow, &instructions).await
    }

    /// Forward escrow SOL to the native recipient, preserving the rent
    /// buffer. Returns the confirmed signature.
    pub async fn send_native(&self, escrow: &Keypair, recipient: &str) -> AppResult<String> {
        let recipient_pubkey = Pubkey::from_str(recipient)
            .map_err(|_| ChainError::InvalidAddress(recipient.to_string()))?;
        let escrow_pubkey = escrow.pubkey();

        let balance = self.rpc.lamports(&escrow_pubkey).await?;
        let lamports = native_send_lamports(balance);

        let instruction =
            system_instruction::transfer(&escrow_pubkey, &recipient_pubkey, lamports);

        info!("📤 Native leg: {} lamports to {}", lamports, recipient);
        self.sign_and_send(escrow, &[instruction]).await
    }

    async fn sign_and_send(
        &self,
        escrow: &Keypair,
        instructions: &[Instruction],
    ) -> AppResult<String> {
        let blockhash = self.rpc.latest_blockhash().await?;
        let message = Message::new(instructions, Some(&escrow.pubkey()));
        let mut transaction = Transaction::new_unsigned(message);
        transaction.sign(&[escrow], blockhash);

        self.rpc.simulate(&transaction).await?;

        let signature = self.rpc.send(&transaction).await?;
        self.rpc.confirm(&signature).await?;
        info!("✅ Transaction confirmed: {}", signature);

        Ok(signature.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_token_raw_amount_scales_by_decimals() {
        assert_eq!(token_raw_amount(dec!(100), 6), 100_000_000);
        assert_eq!(token_raw_amount(dec!(1.5), 9), 1_500_000_000);
        assert_eq!(token_raw_amount(dec!(0.000001), 6), 1);
    }

    #[test]
    fn test_token_raw_amount_floors_fractional_base_units() {
        assert_eq!(token_raw_amount(dec!(0.0000015), 6), 1);
    }

    #[test]
    fn test_haircut_is_two_percent() {
        assert_eq!(apply_haircut(100_000_000), 98_000_000);
        assert_eq!(apply_haircut(100), 98);
        assert_eq!(apply_haircut(99), 97);
        assert_eq!(apply_haircut(0), 0);
    }

    #[test]
    fn test_native_send_preserves_rent_buffer() {
        let balance = RENT_EXEMPTION_LAMPORTS + 1_000_000;
        assert_eq!(native_send_lamports(balance), 980_000);
    }

    #[test]
    fn test_native_send_zero_at_or_below_buffer() {
        assert_eq!(native_send_lamports(RENT_EXEMPTION_LAMPORTS), 0);
        assert_eq!(native_send_lamports(RENT_EXEMPTION_LAMPORTS - 1), 0);
        assert_eq!(native_send_lamports(0), 0);
    }

    #[test]
    fn test_native_send_never_drains_below_buffer() {
        for balance in [
            RENT_EXEMPTION_LAMPORTS + 1,
            MIN_FEE_LAMPORTS,
            1_000_000_000,
            u64::MAX / 2,
        ] {
            let sent = native_send_lamports(balance);
            assert!(balance - sent >= RENT_EXEMPTION_LAMPORTS);
        }
    }

    #[test]
    fn test_native_transfer_instruction_shape() {
        let from = Pubkey::new_unique();
        let to = Pubkey::new_unique();

        let instruction: Instruction = system_instruction::transfer(&from, &to, 980_000);

        assert_eq!(instruction.program_id, solana_system_interface::program::ID);
        assert_eq!(instruction.accounts.len(), 2);
        assert_eq!(instruction.accounts[0].pubkey, from);
        assert!(instruction.accounts[0].is_signer);
        assert_eq!(instruction.accounts[1].pubkey, to);
        assert!(!instruction.accounts[1].is_signer);
    }
}
