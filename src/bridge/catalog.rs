//! Operation catalog.
//!
//! Both wire variants (routing / PLP oriented and swap / account oriented) are
//! described by one table of opcodes. Each opcode carries its name, argument
//! shape, reply shape and return mode; [`CatalogKind`] picks which of them a
//! bridge accepts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::exceptions::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Initialize,
    LoadTokens,
    GetRouter,
    SetAccount,
    CalculatePricePlp,
    FetchData,
    GetSwapDetails,
    FetchAsync,
    GetPricePlp,
    GetVaultState,
    FindToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    U64,
    Bool,
    /// UTF-8 text passed as a byte buffer
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
}

const fn arg(name: &'static str, kind: ArgKind) -> ArgSpec {
    ArgSpec { name, kind }
}

const INITIALIZE_ARGS: &[ArgSpec] = &[arg("chain_id", ArgKind::U64)];
const SET_ACCOUNT_ARGS: &[ArgSpec] = &[arg("account", ArgKind::Text)];
const SWAP_DETAILS_ARGS: &[ArgSpec] = &[
    arg("token_in", ArgKind::Text),
    arg("token_out", ArgKind::Text),
    arg("amount_in", ArgKind::Text),
];
const FETCH_ASYNC_ARGS: &[ArgSpec] = &[
    arg("chain_id", ArgKind::U64),
    arg("account", ArgKind::Text),
];
const PRICE_PLP_ARGS: &[ArgSpec] = &[arg("is_buy", ArgKind::Bool)];
const FIND_TOKEN_ARGS: &[ArgSpec] = &[arg("address", ArgKind::Text)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    ChainSummary,
    Tokens,
    RouterView,
    AccountAck,
    PlpPrice,
    VaultState,
    SwapDetails,
    /// Decimal string
    Price,
    Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnMode {
    /// Reply posted to a port later
    Async,
    /// Result returned from the call itself
    Sync,
}

impl OpCode {
    pub const ALL: [OpCode; 11] = [
        OpCode::Initialize,
        OpCode::LoadTokens,
        OpCode::GetRouter,
        OpCode::SetAccount,
        OpCode::CalculatePricePlp,
        OpCode::FetchData,
        OpCode::GetSwapDetails,
        OpCode::FetchAsync,
        OpCode::GetPricePlp,
        OpCode::GetVaultState,
        OpCode::FindToken,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OpCode::Initialize => "initialize",
            OpCode::LoadTokens => "load_tokens",
            OpCode::GetRouter => "get_router",
            OpCode::SetAccount => "set_account",
            OpCode::CalculatePricePlp => "calculate_price_plp",
            OpCode::FetchData => "fetch_data",
            OpCode::GetSwapDetails => "get_swap_details",
            OpCode::FetchAsync => "fetch_async",
            OpCode::GetPricePlp => "get_price_plp",
            OpCode::GetVaultState => "get_vault_state",
            OpCode::FindToken => "find_token",
        }
    }

    pub fn from_name(name: &str) -> Option<OpCode> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    pub fn args(self) -> &'static [ArgSpec] {
        match self {
            OpCode::Initialize => INITIALIZE_ARGS,
            OpCode::SetAccount => SET_ACCOUNT_ARGS,
            OpCode::GetSwapDetails => SWAP_DETAILS_ARGS,
            OpCode::FetchAsync => FETCH_ASYNC_ARGS,
            OpCode::GetPricePlp => PRICE_PLP_ARGS,
            OpCode::FindToken => FIND_TOKEN_ARGS,
            OpCode::LoadTokens
            | OpCode::GetRouter
            | OpCode::CalculatePricePlp
            | OpCode::FetchData
            | OpCode::GetVaultState => &[],
        }
    }

    pub fn reply(self) -> ReplyShape {
        match self {
            OpCode::Initialize => ReplyShape::ChainSummary,
            OpCode::LoadTokens => ReplyShape::Tokens,
            OpCode::GetRouter => ReplyShape::RouterView,
            OpCode::SetAccount => ReplyShape::AccountAck,
            OpCode::CalculatePricePlp | OpCode::FetchAsync => ReplyShape::PlpPrice,
            OpCode::FetchData | OpCode::GetVaultState => ReplyShape::VaultState,
            OpCode::GetSwapDetails => ReplyShape::SwapDetails,
            OpCode::GetPricePlp => ReplyShape::Price,
            OpCode::FindToken => ReplyShape::Token,
        }
    }

    pub fn mode(self) -> ReturnMode {
        match self {
            OpCode::GetPricePlp | OpCode::GetVaultState | OpCode::FindToken => ReturnMode::Sync,
            _ => ReturnMode::Async,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which wire variant a bridge serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    /// `get_router`, `set_account`, `calculate_price_plp`, `fetch_data`
    Routing,
    /// `get_swap_details`, `fetch_async`
    Swap,
    /// Both variants side by side
    #[default]
    Full,
}

impl CatalogKind {
    pub fn contains(self, op: OpCode) -> bool {
        match op {
            OpCode::Initialize
            | OpCode::LoadTokens
            | OpCode::GetPricePlp
            | OpCode::GetVaultState
            | OpCode::FindToken => true,
            OpCode::GetRouter
            | OpCode::SetAccount
            | OpCode::CalculatePricePlp
            | OpCode::FetchData => matches!(self, CatalogKind::Routing | CatalogKind::Full),
            OpCode::GetSwapDetails | OpCode::FetchAsync => {
                matches!(self, CatalogKind::Swap | CatalogKind::Full)
            }
        }
    }

    pub fn operations(self) -> impl Iterator<Item = OpCode> {
        OpCode::ALL.into_iter().filter(move |op| self.contains(*op))
    }
}

impl FromStr for CatalogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "routing" => Ok(CatalogKind::Routing),
            "swap" => Ok(CatalogKind::Swap),
            "full" => Ok(CatalogKind::Full),
            other => Err(format!("unknown catalog `{}`", other)),
        }
    }
}

/// Argument as copied out of caller memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawArg {
    U64(u64),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl RawArg {
    fn kind_name(&self) -> &'static str {
        match self {
            RawArg::U64(_) => "u64",
            RawArg::Bool(_) => "bool",
            RawArg::Bytes(_) => "bytes",
        }
    }
}

/// A decoded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Initialize {
        chain_id: u64,
    },
    LoadTokens,
    GetRouter,
    SetAccount {
        account: String,
    },
    CalculatePricePlp,
    FetchData,
    GetSwapDetails {
        token_in: String,
        token_out: String,
        amount_in: String,
    },
    FetchAsync {
        chain_id: u64,
        account: String,
    },
    GetPricePlp {
        is_buy: bool,
    },
    GetVaultState,
    FindToken {
        address: String,
    },
}

struct ArgReader {
    op: OpCode,
    specs: std::slice::Iter<'static, ArgSpec>,
    values: std::vec::IntoIter<RawArg>,
}

impl ArgReader {
    fn new(op: OpCode, values: Vec<RawArg>) -> Result<Self, DecodeError> {
        let specs = op.args();
        if specs.len() != values.len() {
            return Err(DecodeError::Arity {
                op: op.name(),
                expected: specs.len(),
                actual: values.len(),
            });
        }
        Ok(Self {
            op,
            specs: specs.iter(),
            values: values.into_iter(),
        })
    }

    fn next(&mut self, kind: ArgKind) -> Result<(&'static str, RawArg), DecodeError> {
        let (spec, value) = match (self.specs.next(), self.values.next()) {
            (Some(spec), Some(value)) if spec.kind == kind => (spec, value),
            (Some(spec), _) => return Err(self.mismatch(spec.name, spec.kind)),
            (None, _) => return Err(self.mismatch("<missing>", kind)),
        };
        Ok((spec.name, value))
    }

    fn mismatch(&self, name: &'static str, kind: ArgKind) -> DecodeError {
        DecodeError::ArgKind {
            op: self.op.name(),
            name,
            expected: match kind {
                ArgKind::U64 => "u64",
                ArgKind::Bool => "bool",
                ArgKind::Text => "bytes",
            },
        }
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        match self.next(ArgKind::U64)? {
            (_, RawArg::U64(v)) => Ok(v),
            (name, _) => Err(self.mismatch(name, ArgKind::U64)),
        }
    }

    fn boolean(&mut self) -> Result<bool, DecodeError> {
        match self.next(ArgKind::Bool)? {
            (_, RawArg::Bool(v)) => Ok(v),
            (name, _) => Err(self.mismatch(name, ArgKind::Bool)),
        }
    }

    fn text(&mut self) -> Result<String, DecodeError> {
        match self.next(ArgKind::Text)? {
            (name, RawArg::Bytes(bytes)) => {
                String::from_utf8(bytes).map_err(|_| DecodeError::Utf8 { name })
            }
            (name, _) => Err(self.mismatch(name, ArgKind::Text)),
        }
    }
}

impl Operation {
    /// Checks `args` against the argument shape of `op` and builds the call.
    pub fn decode(op: OpCode, args: Vec<RawArg>) -> Result<Operation, DecodeError> {
        let kinds: Vec<&'static str> = args.iter().map(RawArg::kind_name).collect();
        tracing::trace!(op = op.name(), args = ?kinds, "Decoding call");

        let mut r = ArgReader::new(op, args)?;
        let operation = match op {
            OpCode::Initialize => Operation::Initialize { chain_id: r.u64()? },
            OpCode::LoadTokens => Operation::LoadTokens,
            OpCode::GetRouter => Operation::GetRouter,
            OpCode::SetAccount => Operation::SetAccount { account: r.text()? },
            OpCode::CalculatePricePlp => Operation::CalculatePricePlp,
            OpCode::FetchData => Operation::FetchData,
            OpCode::GetSwapDetails => Operation::GetSwapDetails {
                token_in: r.text()?,
                token_out: r.text()?,
                amount_in: r.text()?,
            },
            OpCode::FetchAsync => Operation::FetchAsync {
                chain_id: r.u64()?,
                account: r.text()?,
            },
            OpCode::GetPricePlp => Operation::GetPricePlp {
                is_buy: r.boolean()?,
            },
            OpCode::GetVaultState => Operation::GetVaultState,
            OpCode::FindToken => Operation::FindToken { address: r.text()? },
        };
        Ok(operation)
    }

    pub fn opcode(&self) -> OpCode {
        match self {
            Operation::Initialize { .. } => OpCode::Initialize,
            Operation::LoadTokens => OpCode::LoadTokens,
            Operation::GetRouter => OpCode::GetRouter,
            Operation::SetAccount { .. } => OpCode::SetAccount,
            Operation::CalculatePricePlp => OpCode::CalculatePricePlp,
            Operation::FetchData => OpCode::FetchData,
            Operation::GetSwapDetails { .. } => OpCode::GetSwapDetails,
            Operation::FetchAsync { .. } => OpCode::FetchAsync,
            Operation::GetPricePlp { .. } => OpCode::GetPricePlp,
            Operation::GetVaultState => OpCode::GetVaultState,
            Operation::FindToken { .. } => OpCode::FindToken,
        }
    }
}
