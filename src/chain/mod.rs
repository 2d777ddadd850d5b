// Solana chain access: RPC wrapper, balance reads, metadata, transfers
pub mod balances;
pub mod client;
pub mod metadata;
pub mod transfer;

pub use balances::BalanceInspector;
pub use client::{SolanaRpc, SolanaRpcConfig};
pub use metadata::TokenMetadataResolver;
pub use transfer::TransferExecutor;
