use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AppError, AppResult};

/// Display metadata for a token mint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
}

impl TokenMetadata {
    fn from_response(response: JupiterTokenResponse) -> Self {
        Self {
            name: response.name.unwrap_or_else(|| "Unknown Token".to_string()),
            symbol: response.symbol.unwrap_or_else(|| "???".to_string()),
        }
    }

    fn unavailable() -> Self {
        Self {
            name: "Unavailable (Rate Limited)".to_string(),
            symbol: "...".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JupiterTokenResponse {
    name: Option<String>,
    symbol: Option<String>,
}

/// Resolves token names and symbols from the Jupiter token API. Metadata is
/// cosmetic: lookup failures degrade to placeholders and never fail the
/// caller.
pub struct TokenMetadataResolver {
    base_url: String,
    client: reqwest::Client,
}

impl TokenMetadataResolver {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub async fn resolve(&self, mint: &str) -> TokenMetadata {
        match self.fetch(mint).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("⚠️ Metadata lookup failed for {}: {}", mint, e);
                TokenMetadata::unavailable()
            }
        }
    }

    async fn fetch(&self, mint: &str) -> AppResult<TokenMetadata> {
        let url = format!("{}/{}", self.base_url, mint);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalError(format!(
                "Token API returned {}",
                response.status()
            )));
        }

        let token: JupiterTokenResponse = response.json().await?;
        Ok(TokenMetadata::from_response(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_from_full_response() {
        let response: JupiterTokenResponse =
            serde_json::from_str(r#"{"name": "Wrapped SOL", "symbol": "wSOL", "decimals": 9}"#)
                .unwrap();
        let metadata = TokenMetadata::from_response(response);
        assert_eq!(metadata.name, "Wrapped SOL");
        assert_eq!(metadata.symbol, "wSOL");
    }

    #[test]
    fn test_metadata_placeholders_for_missing_fields() {
        let response: JupiterTokenResponse = serde_json::from_str(r#"{}"#).unwrap();
        let metadata = TokenMetadata::from_response(response);
        assert_eq!(metadata.name, "Unknown Token");
        assert_eq!(metadata.symbol, "???");
    }

    #[test]
    fn test_metadata_unavailable_placeholder() {
        let metadata = TokenMetadata::unavailable();
        assert_eq!(metadata.name, "Unavailable (Rate Limited)");
        assert_eq!(metadata.symbol, "...");
    }
}
