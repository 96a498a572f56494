//! The call bridge: turns `(opcode, arguments)` from the caller into an
//! invocation of the [`RouterService`] and routes the result back, either as
//! a return value or as one message posted to the caller's port.

/// Byte buffers owned across the boundary
pub mod buffer;
/// Operation table for both wire variants
pub mod catalog;
/// In-flight call bookkeeping
pub mod port;
/// Reply delivery
pub mod sink;

use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, error, info, warn};

use crate::bridge::catalog::{CatalogKind, OpCode, Operation, RawArg, ReturnMode};
use crate::bridge::port::{CallState, PortId, PortRegistry};
use crate::bridge::sink::{Reply, ReplySink};
use crate::config::BridgeConfig;
use crate::exceptions::{BridgeError, DecodeError, Result};
use crate::router::RouterService;
use crate::utils::serialization::Codec;

pub struct Bridge {
    /// Worker pool for asynchronous calls; taken on shutdown or drop
    runtime: Option<Runtime>,
    handle: Handle,
    service: Arc<dyn RouterService>,
    /// Written once, read by every asynchronous call
    sink: OnceLock<Arc<dyn ReplySink>>,
    ports: Arc<PortRegistry>,
    codec: Codec,
    catalog: CatalogKind,
}

impl Bridge {
    pub fn new(config: &BridgeConfig, service: Arc<dyn RouterService>) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.runtime.worker_threads.max(1))
            .thread_name(config.runtime.thread_name.clone())
            .enable_all()
            .build()
            .map_err(|e| BridgeError::Runtime(e.to_string()))?;

        info!(
            workers = config.runtime.worker_threads,
            codec = %config.codec,
            catalog = ?config.catalog,
            "Bridge created"
        );

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            service,
            sink: OnceLock::new(),
            ports: Arc::new(PortRegistry::new()),
            codec: config.codec,
            catalog: config.catalog,
        })
    }

    /// Installs the reply sink. The first registration wins; later ones are
    /// rejected and leave the installed sink untouched.
    pub fn register_sink(&self, sink: Arc<dyn ReplySink>) -> Result<()> {
        self.sink
            .set(sink)
            .map_err(|_| BridgeError::CallbackAlreadyRegistered)?;
        info!("Reply sink registered");
        Ok(())
    }

    pub fn is_registered(&self) -> bool {
        self.sink.get().is_some()
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn catalog(&self) -> CatalogKind {
        self.catalog
    }

    pub fn service(&self) -> &Arc<dyn RouterService> {
        &self.service
    }

    pub fn in_flight(&self) -> usize {
        self.ports.in_flight()
    }

    pub fn call_state(&self, port: PortId) -> Option<CallState> {
        self.ports.state(port)
    }

    /// Issues `op` and returns immediately; exactly one reply reaches `port`.
    ///
    /// Fails without side effects when no sink is registered or `port` is
    /// still waiting for a previous reply. Any other failure, including bad
    /// arguments or a synchronous opcode, arrives as an error reply.
    pub fn call_async(&self, port: PortId, op: OpCode, args: Vec<RawArg>) -> Result<()> {
        self.submit(port, op, Ok(args))
    }

    /// Like [`Bridge::call_async`], for callers whose argument copy already failed.
    pub(crate) fn submit(
        &self,
        port: PortId,
        op: OpCode,
        args: std::result::Result<Vec<RawArg>, DecodeError>,
    ) -> Result<()> {
        let Some(sink) = self.sink.get().cloned() else {
            error!(port, op = op.name(), "Async call issued before callback registration");
            return Err(BridgeError::CallbackNotRegistered);
        };

        self.ports.issue(port).inspect_err(|_| {
            warn!(port, op = op.name(), "Port already has a call in flight");
        })?;
        debug!(port, op = op.name(), reply = ?op.reply(), "Call issued");

        let decoded = if op.mode() == ReturnMode::Sync {
            Err(BridgeError::NotAsynchronous(op.name()))
        } else {
            self.decode(op, args)
        };
        let service = self.service.clone();
        let ports = self.ports.clone();
        let codec = self.codec;

        self.handle.spawn(async move {
            ports.start(port);

            let outcome = match decoded {
                Ok(operation) => AssertUnwindSafe(execute(service.as_ref(), operation, codec))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(BridgeError::Panicked(panic_message(panic)))),
                Err(e) => Err(e),
            };

            if let Err(e) = &outcome {
                warn!(port, op = op.name(), code = e.code(), error = %e, "Call failed");
            }
            let reply = Reply::from_outcome(codec, outcome);

            if ports.complete(port) {
                sink.post(port, &reply);
                debug!(port, op = op.name(), success = reply.success, "Reply delivered");
            }
        });

        Ok(())
    }

    /// Runs a synchronous operation on the calling thread.
    pub fn call_sync(&self, op: OpCode, args: Vec<RawArg>) -> Reply {
        self.run_sync(op, Ok(args))
    }

    pub(crate) fn run_sync(
        &self,
        op: OpCode,
        args: std::result::Result<Vec<RawArg>, DecodeError>,
    ) -> Reply {
        let outcome = if op.mode() != ReturnMode::Sync {
            Err(BridgeError::NotSynchronous(op.name()))
        } else {
            self.decode(op, args).and_then(|operation| {
                panic::catch_unwind(AssertUnwindSafe(|| {
                    execute_sync(self.service.as_ref(), operation, self.codec)
                }))
                .unwrap_or_else(|panic| Err(BridgeError::Panicked(panic_message(panic))))
            })
        };

        if let Err(e) = &outcome {
            warn!(op = op.name(), code = e.code(), error = %e, "Sync call failed");
        }
        Reply::from_outcome(self.codec, outcome)
    }

    fn decode(
        &self,
        op: OpCode,
        args: std::result::Result<Vec<RawArg>, DecodeError>,
    ) -> Result<Operation> {
        if !self.catalog.contains(op) {
            return Err(BridgeError::UnknownOperation(op.name()));
        }
        Ok(Operation::decode(op, args?)?)
    }

    /// Waits up to `timeout` for running calls, then stops the worker pool.
    ///
    /// Calls still running at that point never reply. Inside an async context
    /// the pool is released without waiting.
    pub fn shutdown(mut self, timeout: Duration) {
        let pending = self.ports.in_flight();
        if pending > 0 {
            warn!(pending, "Shutting down with calls in flight");
        }
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        if Handle::try_current().is_ok() {
            runtime.shutdown_background();
        } else {
            runtime.shutdown_timeout(timeout);
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            debug!(pending = self.ports.in_flight(), "Bridge dropped");
            runtime.shutdown_background();
        }
    }
}

fn encode<T: Serialize>(codec: Codec, value: &T) -> Result<Vec<u8>> {
    Ok(codec.encode(value)?)
}

async fn execute(service: &dyn RouterService, op: Operation, codec: Codec) -> Result<Vec<u8>> {
    match op {
        Operation::Initialize { chain_id } => encode(codec, &service.initialize(chain_id).await?),
        Operation::LoadTokens => encode(codec, &service.load_tokens().await?),
        Operation::GetRouter => encode(codec, &service.get_router().await?),
        Operation::SetAccount { account } => encode(codec, &service.set_account(account).await?),
        Operation::CalculatePricePlp => encode(codec, &service.calculate_price_plp().await?),
        Operation::FetchData => encode(codec, &service.fetch_data().await?),
        Operation::GetSwapDetails {
            token_in,
            token_out,
            amount_in,
        } => encode(
            codec,
            &service
                .get_swap_details(token_in, token_out, amount_in)
                .await?,
        ),
        Operation::FetchAsync { chain_id, account } => {
            encode(codec, &service.fetch_async(chain_id, account).await?)
        }
        sync => Err(BridgeError::NotAsynchronous(sync.opcode().name())),
    }
}

fn execute_sync(service: &dyn RouterService, op: Operation, codec: Codec) -> Result<Vec<u8>> {
    match op {
        Operation::GetPricePlp { is_buy } => encode(codec, &service.price_plp(is_buy)?),
        Operation::GetVaultState => encode(codec, &service.vault_state()?),
        Operation::FindToken { address } => encode(codec, &service.find_token(&address)?),
        other => Err(BridgeError::NotSynchronous(other.opcode().name())),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
