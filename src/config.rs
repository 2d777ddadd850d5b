use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    pub solana_rpc_url: String,
    pub jupiter_token_api_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/escrow_settlement".to_string()),
            solana_rpc_url: std::env::var("SOLANA_RPC_URL")
                .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string()),
            jupiter_token_api_url: std::env::var("JUPITER_TOKEN_API_URL")
                .unwrap_or_else(|_| "https://api.jup.ag/tokens/v1/token".to_string()),
        })
    }
}
