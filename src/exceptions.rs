use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bridge::port::PortId;
use crate::utils::serialization::SerializationError;

/// Root error of the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Post-message callback is not registered")]
    CallbackNotRegistered,

    #[error("Post-message callback is already registered")]
    CallbackAlreadyRegistered,

    #[error("Port {0} already has a call in flight")]
    PortInFlight(PortId),

    #[error("Operation `{0}` is not part of the active catalog")]
    UnknownOperation(&'static str),

    #[error("Operation `{0}` cannot be called synchronously")]
    NotSynchronous(&'static str),

    #[error("Operation `{0}` returns synchronously and has no port reply")]
    NotAsynchronous(&'static str),

    #[error("Callee panicked: {0}")]
    Panicked(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Errors while turning wire arguments into an operation
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("`{op}` expects {expected} arguments, got {actual}")]
    Arity {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("argument `{name}` of `{op}` must be {expected}")]
    ArgKind {
        op: &'static str,
        name: &'static str,
        expected: &'static str,
    },

    #[error("argument `{name}` is not valid UTF-8")]
    Utf8 { name: &'static str },

    #[error("null buffer with non-zero length {0}")]
    NullBuffer(i32),

    #[error("negative buffer length {0}")]
    NegativeLength(i32),
}

/// Errors raised by the router service
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Router is not initialized with a chain")]
    NotInitialized,

    #[error("Chain {0} is not supported")]
    UnsupportedChain(u64),

    #[error("Invalid account `{0}`")]
    InvalidAccount(String),

    #[error("Token `{0}` not found")]
    TokenNotFound(String),

    #[error("Invalid amount `{0}`")]
    InvalidAmount(String),

    #[error("Vault state has not been fetched")]
    VaultNotLoaded,

    #[error("PLP price has not been calculated")]
    PriceNotCalculated,

    #[error("No market feed attached")]
    FeedUnavailable,

    #[error("Market feed failed: {0}")]
    Feed(String),

    #[error("Chain registry error: {0}")]
    Registry(String),

    #[error("Chain {chain_id} has no `{contract}` contract configured")]
    ContractNotConfigured {
        chain_id: u64,
        contract: &'static str,
    },
}

impl BridgeError {
    /// Stable code carried in error payloads
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Decode(_) => "decode",
            BridgeError::Router(e) => e.code(),
            BridgeError::Serialization(_) => "serialization",
            BridgeError::CallbackNotRegistered => "callback_not_registered",
            BridgeError::CallbackAlreadyRegistered => "callback_already_registered",
            BridgeError::PortInFlight(_) => "port_in_flight",
            BridgeError::UnknownOperation(_) => "unknown_operation",
            BridgeError::NotSynchronous(_) => "not_synchronous",
            BridgeError::NotAsynchronous(_) => "not_asynchronous",
            BridgeError::Panicked(_) => "panic",
            BridgeError::Runtime(_) => "runtime",
        }
    }
}

impl RouterError {
    pub fn code(&self) -> &'static str {
        match self {
            RouterError::NotInitialized => "not_initialized",
            RouterError::UnsupportedChain(_) => "unsupported_chain",
            RouterError::InvalidAccount(_) => "invalid_account",
            RouterError::TokenNotFound(_) => "token_not_found",
            RouterError::InvalidAmount(_) => "invalid_amount",
            RouterError::VaultNotLoaded => "vault_not_loaded",
            RouterError::PriceNotCalculated => "price_not_calculated",
            RouterError::FeedUnavailable => "feed_unavailable",
            RouterError::Feed(_) => "feed",
            RouterError::Registry(_) => "registry",
            RouterError::ContractNotConfigured { .. } => "contract_not_configured",
        }
    }
}

/// Error as it travels back to the caller
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl From<&BridgeError> for ErrorPayload {
    fn from(err: &BridgeError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Convenient Result type for the bridge
pub type Result<T> = std::result::Result<T, BridgeError>;
