use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::exceptions::RouterError;

/// Chain definitions shipped with the library
const BUNDLED_CHAINS: &str = include_str!("../../conf/chains.yaml");

/// ERC-20 token known to the router
///
/// The registry provides the static part; vault configuration, balances and
/// allowances are filled in by `fetch_data`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Token {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default)]
    pub is_stable_token: bool,
    #[serde(default)]
    pub is_native_token: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_weight: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_whitelisted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_shortable_token: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_profit_basis_points: Option<u64>,
    /// Decimal integer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_usdp_amount: Option<String>,
    /// Decimal amounts keyed by lowercase account address
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub balances: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub allowances: BTreeMap<String, String>,
}

/// Per-token settings read from the vault
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenConfiguration {
    pub token_weight: u64,
    pub is_whitelisted: bool,
    pub is_stable_token: bool,
    pub is_shortable_token: bool,
    pub min_profit_basis_points: u64,
    pub max_usdp_amount: String,
}

impl Token {
    pub fn apply_configuration(&mut self, config: &TokenConfiguration) {
        self.token_weight = Some(config.token_weight);
        self.is_whitelisted = Some(config.is_whitelisted);
        self.is_stable_token = config.is_stable_token;
        self.is_shortable_token = Some(config.is_shortable_token);
        self.min_profit_basis_points = Some(config.min_profit_basis_points);
        self.max_usdp_amount = Some(config.max_usdp_amount.clone());
    }

    pub fn update_balance(&mut self, account: &str, amount: String) {
        self.balances.insert(account.to_ascii_lowercase(), amount);
    }

    pub fn update_allowance(&mut self, account: &str, amount: String) {
        self.allowances.insert(account.to_ascii_lowercase(), amount);
    }

    /// `"0"` for an account never fetched
    pub fn balance_of(&self, account: &str) -> &str {
        self.balances
            .get(&account.to_ascii_lowercase())
            .map_or("0", String::as_str)
    }

    pub fn allowance_of(&self, account: &str) -> &str {
        self.allowances
            .get(&account.to_ascii_lowercase())
            .map_or("0", String::as_str)
    }
}

/// Protocol contracts deployed on a chain
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ContractAddresses {
    pub vault: Option<String>,
    pub plp_manager: Option<String>,
    pub plp_token: Option<String>,
    pub reward_router: Option<String>,
    pub futurx_gateway: Option<String>,
    pub reward_tracker_fee_plp: Option<String>,
    pub vester_plp: Option<String>,
}

/// Contract that may spend tokens on behalf of the account
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Spender {
    pub address: String,
    pub name: String,
}

/// Everything the router needs to know about one network
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChainConfig {
    pub chain_id: u64,
    #[serde(default)]
    pub name: String,
    pub rpc_urls: Vec<String>,
    pub multicall_address: String,
    #[serde(default)]
    pub contracts: ContractAddresses,
    #[serde(default)]
    pub spenders: Vec<Spender>,
    #[serde(default)]
    pub tokens: Vec<Token>,
}

impl ChainConfig {
    /// Addresses are compared without regard to checksum casing.
    pub fn token_by_address(&self, address: &str) -> Option<&Token> {
        let address = address.trim();
        self.tokens
            .iter()
            .find(|t| t.address.eq_ignore_ascii_case(address))
    }

    /// Vault the feed reads pool state from
    pub fn vault_address(&self) -> Result<&str, RouterError> {
        self.contracts
            .vault
            .as_deref()
            .ok_or(RouterError::ContractNotConfigured {
                chain_id: self.chain_id,
                contract: "vault",
            })
    }

    pub fn spender(&self, name: &str) -> Option<&Spender> {
        self.spenders.iter().find(|s| s.name == name)
    }

    pub fn summary(&self) -> ChainSummary {
        ChainSummary {
            chain_id: self.chain_id,
            name: self.name.clone(),
            rpc_urls: self.rpc_urls.clone(),
            multicall_address: self.multicall_address.clone(),
            vault: self.contracts.vault.clone(),
            token_count: self.tokens.len(),
        }
    }
}

/// Reply of `initialize`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChainSummary {
    pub chain_id: u64,
    pub name: String,
    pub rpc_urls: Vec<String>,
    pub multicall_address: String,
    #[serde(default)]
    pub vault: Option<String>,
    pub token_count: usize,
}

#[derive(Deserialize)]
struct ChainsFile {
    chains: Vec<ChainConfig>,
}

/// Supported chains by id
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: HashMap<u64, ChainConfig>,
}

impl ChainRegistry {
    pub fn bundled() -> Result<Self, RouterError> {
        Self::from_yaml(BUNDLED_CHAINS)
    }

    pub fn from_file(path: &Path) -> Result<Self, RouterError> {
        let content = fs::read_to_string(path)
            .map_err(|e| RouterError::Registry(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, RouterError> {
        let file: ChainsFile =
            serde_yaml::from_str(content).map_err(|e| RouterError::Registry(e.to_string()))?;

        let mut chains = HashMap::with_capacity(file.chains.len());
        for chain in file.chains {
            let id = chain.chain_id;
            if chains.insert(id, chain).is_some() {
                return Err(RouterError::Registry(format!("chain {} defined twice", id)));
            }
        }
        Ok(Self { chains })
    }

    pub fn get(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.get(&chain_id)
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.chains.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
