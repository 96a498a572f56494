use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::exceptions::RouterError;
use crate::router::chain::{ChainConfig, Token, TokenConfiguration};

/// Vault snapshot cached by the router
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VaultState {
    pub chain_id: u64,
    pub account: Option<String>,
    /// RFC 3339 time of the fetch
    pub fetched_at: String,
    /// Feed-specific pool contents
    pub data: serde_json::Value,
}

/// Fresh on-chain values for one token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenUpdate {
    pub address: String,
    #[serde(default)]
    pub configuration: Option<TokenConfiguration>,
    /// Balance of the selected account
    #[serde(default)]
    pub balance: Option<String>,
    #[serde(default)]
    pub allowance: Option<String>,
}

/// Result of one vault read
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VaultFetch {
    /// Stored as [`VaultState::data`]
    pub data: serde_json::Value,
    /// Merged into the router's token list
    pub tokens: Vec<TokenUpdate>,
}

/// PLP price for both directions, as decimal integers
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlpPrice {
    pub buy: String,
    pub sell: String,
}

impl PlpPrice {
    pub fn side(&self, is_buy: bool) -> &str {
        if is_buy { &self.buy } else { &self.sell }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SwapDetails {
    pub amount_out: String,
    pub fee_amount: String,
    pub fees_bps: String,
}

/// Market data and pricing engine supplied by the embedder
///
/// The router only orchestrates: it validates input, keeps the last vault
/// snapshot and price, and leaves the numbers to the feed.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Reads the vault of `chain` (see [`ChainConfig::vault_address`]) and the
    /// token configurations, plus balances and allowances of `account` when given.
    async fn fetch_vault(
        &self,
        chain: &ChainConfig,
        account: Option<&str>,
    ) -> Result<VaultFetch, RouterError>;

    fn plp_price(&self, vault: &VaultState) -> Result<PlpPrice, RouterError>;

    fn swap_details(
        &self,
        vault: &VaultState,
        token_in: &Token,
        token_out: &Token,
        amount_in: &str,
    ) -> Result<SwapDetails, RouterError>;
}
