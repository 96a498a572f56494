//! The callee side of the bridge: chain configuration, token list, selected
//! account and the cached vault snapshot and PLP price.

/// Chain definitions and token lookup
pub mod chain;
/// Pricing seam implemented by the embedder
pub mod feed;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::exceptions::RouterError;
use crate::router::chain::{ChainConfig, ChainRegistry, ChainSummary, Token};
use crate::router::feed::{MarketFeed, PlpPrice, SwapDetails, TokenUpdate, VaultFetch, VaultState};
use crate::utils::time::now_rfc3339;

/// Longest decimal representation of a 256-bit unsigned integer
const MAX_AMOUNT_DIGITS: usize = 78;

/// Reply of `get_router`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RouterView {
    pub chain: Option<ChainSummary>,
    pub account: Option<String>,
    pub vault_loaded: bool,
    pub fetched_at: Option<String>,
    pub plp_price: Option<PlpPrice>,
}

/// Reply of `set_account`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccountAck {
    pub account: String,
}

/// Operations the bridge dispatches to
///
/// Async methods may do I/O and run on the worker pool. The plain methods read
/// cached state and back the synchronous entry points.
#[async_trait]
pub trait RouterService: Send + Sync {
    async fn initialize(&self, chain_id: u64) -> Result<ChainSummary, RouterError>;
    async fn load_tokens(&self) -> Result<Vec<Token>, RouterError>;
    async fn get_router(&self) -> Result<RouterView, RouterError>;
    async fn set_account(&self, account: String) -> Result<AccountAck, RouterError>;
    async fn calculate_price_plp(&self) -> Result<PlpPrice, RouterError>;
    async fn fetch_data(&self) -> Result<VaultState, RouterError>;
    async fn get_swap_details(
        &self,
        token_in: String,
        token_out: String,
        amount_in: String,
    ) -> Result<SwapDetails, RouterError>;
    /// Initialize, select the account (if any), fetch and price in one go.
    async fn fetch_async(&self, chain_id: u64, account: String) -> Result<PlpPrice, RouterError>;

    fn price_plp(&self, is_buy: bool) -> Result<String, RouterError>;
    fn vault_state(&self) -> Result<VaultState, RouterError>;
    fn find_token(&self, address: &str) -> Result<Token, RouterError>;
}

#[derive(Default)]
struct RouterState {
    chain: Option<ChainConfig>,
    /// Chain tokens enriched by the last fetch
    tokens: Vec<Token>,
    account: Option<String>,
    vault: Option<VaultState>,
    price: Option<PlpPrice>,
}

/// Router driven by the chain registry, with pricing delegated to a [`MarketFeed`]
pub struct ConfigRouter {
    registry: ChainRegistry,
    feed: Option<Arc<dyn MarketFeed>>,
    // Never held across an await, so the synchronous reads can take it too
    state: RwLock<RouterState>,
}

impl ConfigRouter {
    pub fn new(registry: ChainRegistry) -> Self {
        Self {
            registry,
            feed: None,
            state: RwLock::new(RouterState::default()),
        }
    }

    /// Uses `chains_file` from the config, or the bundled chains.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, RouterError> {
        let registry = match &config.chains_file {
            Some(path) => ChainRegistry::from_file(path)?,
            None => ChainRegistry::bundled()?,
        };
        Ok(Self::new(registry))
    }

    pub fn with_feed(mut self, feed: Arc<dyn MarketFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    fn read(&self) -> RwLockReadGuard<'_, RouterState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RouterState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn feed(&self) -> Result<&Arc<dyn MarketFeed>, RouterError> {
        self.feed.as_ref().ok_or(RouterError::FeedUnavailable)
    }

    fn token(&self, address: &str) -> Result<Token, RouterError> {
        let state = self.read();
        if state.chain.is_none() {
            return Err(RouterError::NotInitialized);
        }
        let address = address.trim();
        state
            .tokens
            .iter()
            .find(|t| t.address.eq_ignore_ascii_case(address))
            .cloned()
            .ok_or_else(|| RouterError::TokenNotFound(address.to_string()))
    }
}

fn merge_token_updates(tokens: &mut [Token], account: Option<&str>, updates: &[TokenUpdate]) {
    for update in updates {
        let Some(token) = tokens
            .iter_mut()
            .find(|t| t.address.eq_ignore_ascii_case(&update.address))
        else {
            warn!(address = %update.address, "Feed returned an unknown token");
            continue;
        };
        if let Some(config) = &update.configuration {
            token.apply_configuration(config);
        }
        if let Some(account) = account {
            if let Some(balance) = &update.balance {
                token.update_balance(account, balance.clone());
            }
            if let Some(allowance) = &update.allowance {
                token.update_allowance(account, allowance.clone());
            }
        }
    }
}

/// `0x` followed by 40 hex digits
pub fn validate_account(account: &str) -> Result<String, RouterError> {
    let trimmed = account.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| RouterError::InvalidAccount(account.to_string()))?;

    if digits.len() != 40 || hex::decode(digits).is_err() {
        return Err(RouterError::InvalidAccount(account.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Non-empty unsigned decimal that fits in 256 bits by length
pub fn validate_amount(amount: &str) -> Result<String, RouterError> {
    let trimmed = amount.trim();
    if trimmed.is_empty()
        || trimmed.len() > MAX_AMOUNT_DIGITS
        || !trimmed.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(RouterError::InvalidAmount(amount.to_string()));
    }
    Ok(trimmed.to_string())
}

#[async_trait]
impl RouterService for ConfigRouter {
    async fn initialize(&self, chain_id: u64) -> Result<ChainSummary, RouterError> {
        let chain = self
            .registry
            .get(chain_id)
            .cloned()
            .ok_or(RouterError::UnsupportedChain(chain_id))?;
        let summary = chain.summary();

        *self.write() = RouterState {
            tokens: chain.tokens.clone(),
            chain: Some(chain),
            ..RouterState::default()
        };

        info!(chain_id, tokens = summary.token_count, "Router initialized");
        Ok(summary)
    }

    async fn load_tokens(&self) -> Result<Vec<Token>, RouterError> {
        Ok(self.read().tokens.clone())
    }

    async fn get_router(&self) -> Result<RouterView, RouterError> {
        let state = self.read();
        Ok(RouterView {
            chain: state.chain.as_ref().map(ChainConfig::summary),
            account: state.account.clone(),
            vault_loaded: state.vault.is_some(),
            fetched_at: state.vault.as_ref().map(|v| v.fetched_at.clone()),
            plp_price: state.price.clone(),
        })
    }

    async fn set_account(&self, account: String) -> Result<AccountAck, RouterError> {
        let account = validate_account(&account)?;
        let mut state = self.write();
        if state.account.as_deref() != Some(account.as_str()) {
            // Balances in the cached vault belong to the previous account
            state.vault = None;
            state.price = None;
        }
        state.account = Some(account.clone());
        debug!(account = %account, "Account selected");
        Ok(AccountAck { account })
    }

    async fn calculate_price_plp(&self) -> Result<PlpPrice, RouterError> {
        let feed = self.feed()?;
        let vault = self.read().vault.clone().ok_or(RouterError::VaultNotLoaded)?;
        let price = feed.plp_price(&vault)?;

        let mut state = self.write();
        if state.vault.as_ref() == Some(&vault) {
            state.price = Some(price.clone());
        }
        Ok(price)
    }

    async fn fetch_data(&self) -> Result<VaultState, RouterError> {
        let feed = self.feed()?.clone();
        let (chain, account) = {
            let state = self.read();
            let chain = state.chain.clone().ok_or(RouterError::NotInitialized)?;
            (chain, state.account.clone())
        };

        let VaultFetch { data, tokens } = feed.fetch_vault(&chain, account.as_deref()).await?;
        let vault = VaultState {
            chain_id: chain.chain_id,
            account,
            fetched_at: now_rfc3339(),
            data,
        };

        let mut state = self.write();
        let still_current = state.chain.as_ref().map(|c| c.chain_id) == Some(vault.chain_id)
            && state.account == vault.account;
        if still_current {
            merge_token_updates(&mut state.tokens, vault.account.as_deref(), &tokens);
            state.vault = Some(vault.clone());
            state.price = None;
            debug!(chain_id = vault.chain_id, updated = tokens.len(), "Vault snapshot cached");
        } else {
            warn!(chain_id = vault.chain_id, "Router changed during fetch, snapshot not cached");
        }
        Ok(vault)
    }

    async fn get_swap_details(
        &self,
        token_in: String,
        token_out: String,
        amount_in: String,
    ) -> Result<SwapDetails, RouterError> {
        let token_in = self.token(&token_in)?;
        let token_out = self.token(&token_out)?;
        let amount_in = validate_amount(&amount_in)?;

        let feed = self.feed()?;
        let vault = self.read().vault.clone().ok_or(RouterError::VaultNotLoaded)?;
        feed.swap_details(&vault, &token_in, &token_out, &amount_in)
    }

    async fn fetch_async(&self, chain_id: u64, account: String) -> Result<PlpPrice, RouterError> {
        self.initialize(chain_id).await?;
        if !account.trim().is_empty() {
            self.set_account(account).await?;
        }
        self.fetch_data().await?;
        self.calculate_price_plp().await
    }

    fn price_plp(&self, is_buy: bool) -> Result<String, RouterError> {
        self.read()
            .price
            .as_ref()
            .map(|p| p.side(is_buy).to_string())
            .ok_or(RouterError::PriceNotCalculated)
    }

    fn vault_state(&self) -> Result<VaultState, RouterError> {
        self.read().vault.clone().ok_or(RouterError::VaultNotLoaded)
    }

    fn find_token(&self, address: &str) -> Result<Token, RouterError> {
        self.token(address)
    }
}
