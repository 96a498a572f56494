//! Router Bridge
//!
//! Native side of the boundary between a mobile application shell and the DEX
//! router core. The shell calls plain C functions; the bridge copies the
//! arguments, runs the requested operation and hands the result back, either
//! directly or as a single message posted to the port the shell supplied.
//!
//! ## Features
//! - C ABI with `wire_*` entry points, buffer allocation and release, and
//!   callback registration.
//! - Asynchronous calls run on a tokio worker pool; every port receives exactly
//!   one reply, success or typed error.
//! - Both wire variants (routing/PLP and swap/account) are served from one
//!   operation catalog, selectable by configuration.
//! - Panics and malformed arguments become error payloads instead of crossing
//!   the boundary.
//!
//! ## Using it from Rust
//!
//! ```no_run
//! use std::sync::Arc;
//! use router_bridge::bridge::Bridge;
//! use router_bridge::config::BridgeConfig;
//! use router_bridge::router::ConfigRouter;
//!
//! let config = BridgeConfig::from_file(None);
//! let router = ConfigRouter::from_config(&config).expect("chains");
//! let bridge = Bridge::new(&config, Arc::new(router)).expect("runtime");
//! // attach a MarketFeed with `ConfigRouter::with_feed` before building the bridge,
//! // then make it the one behind the C ABI:
//! let _ = router_bridge::ffi::install_bridge(bridge);
//! ```

/// Buffers, ports, catalog and dispatcher
pub mod bridge;
/// Configuration Module
pub mod config;
/// Bridge Exceptions Module
pub mod exceptions;
/// Exported C functions
pub mod ffi;
/// Module for logging and registration of events
pub mod logger;
/// Chain registry and the router state behind the operations
pub mod router;
/// Serialization and time helpers
pub mod utils;

pub use bridge::Bridge;
pub use bridge::catalog::{CatalogKind, OpCode, RawArg};
pub use bridge::sink::{Reply, ReplySink};
pub use config::BridgeConfig;
pub use exceptions::{BridgeError, ErrorPayload, Result};
pub use router::{ConfigRouter, RouterService};
