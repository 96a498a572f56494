#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use router_bridge::bridge::Bridge;
use router_bridge::bridge::catalog::CatalogKind;
use router_bridge::bridge::port::PortId;
use router_bridge::bridge::sink::{Reply, ReplySink};
use router_bridge::config::BridgeConfig;
use router_bridge::exceptions::{ErrorPayload, RouterError};
use router_bridge::router::ConfigRouter;
use router_bridge::router::chain::{ChainConfig, ChainRegistry, Token, TokenConfiguration};
use router_bridge::router::feed::{
    MarketFeed, PlpPrice, SwapDetails, TokenUpdate, VaultFetch, VaultState,
};
use router_bridge::utils::serialization::Codec;

pub const ACCOUNT: &str = "0xaC7c1a2fFb8b3f3bEa3e6aB4bC8b1A2Ff4Bb4Aa4";
pub const USDT: &str = "0x38193a1c61b2b44446289265580f73746f5bb5ae";
pub const BTC: &str = "0xa8cc0c527a271c7d196f12c23a65dbfb58c033f5";
pub const WAIT: Duration = Duration::from_secs(5);

/// Sink forwarding every reply to a channel
pub struct ChannelSink {
    tx: Mutex<Sender<(PortId, Reply)>>,
}

impl ChannelSink {
    pub fn new() -> (Arc<Self>, Receiver<(PortId, Reply)>) {
        let (tx, rx) = channel();
        (Arc::new(Self { tx: Mutex::new(tx) }), rx)
    }
}

impl ReplySink for ChannelSink {
    fn post(&self, port: PortId, reply: &Reply) -> bool {
        self.tx.lock().unwrap().send((port, reply.clone())).is_ok()
    }
}

/// Feed returning constant numbers
pub struct FixedFeed {
    pub delay: Duration,
}

#[async_trait]
impl MarketFeed for FixedFeed {
    async fn fetch_vault(
        &self,
        chain: &ChainConfig,
        account: Option<&str>,
    ) -> Result<VaultFetch, RouterError> {
        tokio::time::sleep(self.delay).await;
        let tokens = chain
            .tokens
            .iter()
            .map(|token| TokenUpdate {
                address: token.address.clone(),
                configuration: Some(TokenConfiguration {
                    token_weight: 1000,
                    is_whitelisted: true,
                    is_stable_token: token.is_stable_token,
                    is_shortable_token: false,
                    min_profit_basis_points: 0,
                    max_usdp_amount: "0".into(),
                }),
                balance: account.map(|_| "1000".into()),
                allowance: None,
            })
            .collect();
        Ok(VaultFetch {
            data: serde_json::json!({ "chain": chain.chain_id, "account": account }),
            tokens,
        })
    }

    fn plp_price(&self, _vault: &VaultState) -> Result<PlpPrice, RouterError> {
        Ok(PlpPrice {
            buy: "1010".into(),
            sell: "990".into(),
        })
    }

    fn swap_details(
        &self,
        _vault: &VaultState,
        _token_in: &Token,
        _token_out: &Token,
        amount_in: &str,
    ) -> Result<SwapDetails, RouterError> {
        Ok(SwapDetails {
            amount_out: amount_in.to_string(),
            fee_amount: "0".into(),
            fees_bps: "30".into(),
        })
    }
}

/// Feed that fetches fine and blows up while pricing
pub struct PanickingFeed;

#[async_trait]
impl MarketFeed for PanickingFeed {
    async fn fetch_vault(
        &self,
        _chain: &ChainConfig,
        _account: Option<&str>,
    ) -> Result<VaultFetch, RouterError> {
        Ok(VaultFetch::default())
    }

    fn plp_price(&self, _vault: &VaultState) -> Result<PlpPrice, RouterError> {
        panic!("division by zero supply")
    }

    fn swap_details(
        &self,
        _vault: &VaultState,
        _token_in: &Token,
        _token_out: &Token,
        _amount_in: &str,
    ) -> Result<SwapDetails, RouterError> {
        panic!("not priced")
    }
}

pub fn config(catalog: CatalogKind, codec: Codec) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.catalog = catalog;
    config.codec = codec;
    config
}

pub fn bridge_with(config: &BridgeConfig, feed: Option<Arc<dyn MarketFeed>>) -> Bridge {
    let mut router = ConfigRouter::new(ChainRegistry::bundled().unwrap());
    if let Some(feed) = feed {
        router = router.with_feed(feed);
    }
    Bridge::new(config, Arc::new(router)).unwrap()
}

/// Bridge over the full catalog with a fast fixed feed and a registered sink
pub fn registered_bridge() -> (Bridge, Receiver<(PortId, Reply)>) {
    let feed = Arc::new(FixedFeed {
        delay: Duration::from_millis(0),
    });
    let bridge = bridge_with(&config(CatalogKind::Full, Codec::Json), Some(feed));
    let (sink, rx) = ChannelSink::new();
    bridge.register_sink(sink).unwrap();
    (bridge, rx)
}

pub fn text(s: &str) -> router_bridge::RawArg {
    router_bridge::RawArg::Bytes(s.as_bytes().to_vec())
}

pub fn error_of(reply: &Reply) -> ErrorPayload {
    assert!(!reply.success, "expected a failed reply");
    serde_json::from_slice(&reply.payload).unwrap()
}

pub fn value_of(reply: &Reply) -> serde_json::Value {
    assert!(reply.success, "unexpected failure: {}", String::from_utf8_lossy(&reply.payload));
    serde_json::from_slice(&reply.payload).unwrap()
}

/// Feed whose data source cannot be reached
pub struct UnreachableFeed;

#[async_trait]
impl MarketFeed for UnreachableFeed {
    async fn fetch_vault(
        &self,
        _chain: &ChainConfig,
        _account: Option<&str>,
    ) -> Result<VaultFetch, RouterError> {
        Err(RouterError::Feed("rpc unreachable".into()))
    }

    fn plp_price(&self, _vault: &VaultState) -> Result<PlpPrice, RouterError> {
        Err(RouterError::Feed("rpc unreachable".into()))
    }

    fn swap_details(
        &self,
        _vault: &VaultState,
        _token_in: &Token,
        _token_out: &Token,
        _amount_in: &str,
    ) -> Result<SwapDetails, RouterError> {
        Err(RouterError::Feed("rpc unreachable".into()))
    }
}
