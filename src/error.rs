use rust_decimal::Decimal;
use sqlx::migrate::MigrateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External error: {0}")]
    ExternalError(String),
}

/// Failures reading chain state over RPC
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("Malformed account data for {account}: {message}")]
    MalformedAccount { account: String, message: String },
}

/// Failures moving funds out of an escrow wallet. The first two variants are
/// funding shortfalls the settlement cycle surfaces to the user and retries;
/// the rest are execution failures.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("The escrow wallet needs at least {required} SOL, has {available}")]
    FeeBalanceTooLow { required: Decimal, available: Decimal },

    #[error("Insufficient Tokens: {available} available, {needed} needed")]
    InsufficientTokens { available: u64, needed: u64 },

    #[error("Failed to resolve token accounts: {0}")]
    AccountResolution(String),

    #[error("Transaction simulation failed: {0}")]
    SimulationFailed(String),

    #[error("Failed to send transaction: {0}")]
    BroadcastFailed(String),

    #[error("Confirmation timed out for {0}")]
    ConfirmationTimeout(String),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<rust_decimal::Error> for AppError {
    fn from(err: rust_decimal::Error) -> Self {
        AppError::InvalidInput(format!("Decimal conversion error: {:?}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalError(format!("HTTP request error: {:?}", err))
    }
}

impl From<MigrateError> for AppError {
    fn from(err: MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;
