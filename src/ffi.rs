//! C ABI of the library.
//!
//! Every asynchronous entry point takes the reply port first. Buffer arguments
//! are consumed: the library frees them after copying, whatever the outcome.
//! Nothing unwinds out of this module; panics are caught and logged, and
//! synchronous entry points turn them into a failed [`SyncResult`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};

use crate::bridge::Bridge;
use crate::bridge::buffer::{self, ByteBuffer, SyncResult};
use crate::bridge::catalog::{OpCode, RawArg};
use crate::bridge::port::PortId;
use crate::bridge::sink::{CallbackSink, PostMessageFn, Reply};
use crate::config::BridgeConfig;
use crate::exceptions::{BridgeError, DecodeError};
use crate::logger::setup_logging;
use crate::router::ConfigRouter;
use crate::utils::serialization::Codec;

static BRIDGE: OnceLock<Option<Bridge>> = OnceLock::new();

/// Makes `bridge` the one served by the C ABI.
///
/// Must run before the first wire call; once the default bridge has been
/// built (or another one installed) the argument is handed back.
pub fn install_bridge(bridge: Bridge) -> Result<(), Bridge> {
    match BRIDGE.set(Some(bridge)) {
        Ok(()) => Ok(()),
        Err(Some(bridge)) => Err(bridge),
        Err(None) => Ok(()),
    }
}

fn build_default() -> Option<Bridge> {
    let config = BridgeConfig::from_file(None);
    setup_logging(&config.log_level, config.log_file.as_deref(), Some("ffi"));

    let router = match ConfigRouter::from_config(&config) {
        Ok(router) => router,
        Err(e) => {
            error!(error = %e, "Failed to load chain registry");
            return None;
        }
    };

    match Bridge::new(&config, Arc::new(router)) {
        Ok(bridge) => Some(bridge),
        Err(e) => {
            error!(error = %e, "Failed to start bridge");
            None
        }
    }
}

fn global() -> Option<&'static Bridge> {
    BRIDGE.get_or_init(build_default).as_ref()
}

fn guarded<R>(entry: &'static str, body: impl FnOnce() -> R, on_panic: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => value,
        Err(_) => {
            error!(entry, "Panic caught at the C boundary");
            on_panic()
        }
    }
}

fn dispatch(port: PortId, op: OpCode, args: Result<Vec<RawArg>, DecodeError>) {
    guarded(
        op.name(),
        || {
            let Some(bridge) = global() else {
                error!(port, op = op.name(), "Bridge unavailable, call dropped");
                return;
            };
            // Already logged by the bridge; the caller gets no reply for this port
            let _ = bridge.submit(port, op, args);
        },
        || (),
    );
}

fn unavailable() -> SyncResult {
    let err = BridgeError::Runtime("bridge unavailable".to_string());
    SyncResult::from_reply(Reply::error(Codec::default(), &err))
}

fn dispatch_sync(op: OpCode, args: Result<Vec<RawArg>, DecodeError>) -> SyncResult {
    guarded(
        op.name(),
        || match global() {
            Some(bridge) => SyncResult::from_reply(bridge.run_sync(op, args)),
            None => unavailable(),
        },
        || {
            let err = BridgeError::Panicked(op.name().to_string());
            SyncResult::from_reply(Reply::error(Codec::default(), &err))
        },
    )
}

/// # Safety
/// `buffer` must be null or come from `new_uint_8_list` and not be reused.
unsafe fn text_arg(buffer: *mut ByteBuffer) -> Result<RawArg, DecodeError> {
    unsafe { buffer::take_buffer(buffer) }.map(RawArg::Bytes)
}

#[unsafe(no_mangle)]
pub extern "C" fn wire_initialize(port_: PortId, chain_id: u64) {
    dispatch(port_, OpCode::Initialize, Ok(vec![RawArg::U64(chain_id)]));
}

#[unsafe(no_mangle)]
pub extern "C" fn wire_load_tokens(port_: PortId) {
    dispatch(port_, OpCode::LoadTokens, Ok(vec![]));
}

#[unsafe(no_mangle)]
pub extern "C" fn wire_get_router(port_: PortId) {
    dispatch(port_, OpCode::GetRouter, Ok(vec![]));
}

/// # Safety
/// `account` must be null or come from `new_uint_8_list`; it is consumed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wire_set_account(port_: PortId, account: *mut ByteBuffer) {
    let args = unsafe { text_arg(account) }.map(|a| vec![a]);
    dispatch(port_, OpCode::SetAccount, args);
}

#[unsafe(no_mangle)]
pub extern "C" fn wire_calculate_price_plp(port_: PortId) {
    dispatch(port_, OpCode::CalculatePricePlp, Ok(vec![]));
}

#[unsafe(no_mangle)]
pub extern "C" fn wire_fetch_data(port_: PortId) {
    dispatch(port_, OpCode::FetchData, Ok(vec![]));
}

/// # Safety
/// Each buffer must be null or come from `new_uint_8_list`; all are consumed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wire_get_swap_details(
    port_: PortId,
    token_in: *mut ByteBuffer,
    token_out: *mut ByteBuffer,
    amount_in: *mut ByteBuffer,
) {
    // Take all three first so none leaks when an earlier one is bad
    let token_in = unsafe { text_arg(token_in) };
    let token_out = unsafe { text_arg(token_out) };
    let amount_in = unsafe { text_arg(amount_in) };
    let args = token_in.and_then(|a| Ok(vec![a, token_out?, amount_in?]));
    dispatch(port_, OpCode::GetSwapDetails, args);
}

/// # Safety
/// `account` must be null or come from `new_uint_8_list`; it is consumed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wire_fetch_async(port_: PortId, chain_id: u64, account: *mut ByteBuffer) {
    let args = unsafe { text_arg(account) }.map(|a| vec![RawArg::U64(chain_id), a]);
    dispatch(port_, OpCode::FetchAsync, args);
}

#[unsafe(no_mangle)]
pub extern "C" fn wire_get_price_plp(is_buy: bool) -> SyncResult {
    dispatch_sync(OpCode::GetPricePlp, Ok(vec![RawArg::Bool(is_buy)]))
}

#[unsafe(no_mangle)]
pub extern "C" fn wire_get_vault_state() -> SyncResult {
    dispatch_sync(OpCode::GetVaultState, Ok(vec![]))
}

/// # Safety
/// `address` must be null or come from `new_uint_8_list`; it is consumed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wire_find_token(address: *mut ByteBuffer) -> SyncResult {
    let args = unsafe { text_arg(address) }.map(|a| vec![a]);
    dispatch_sync(OpCode::FindToken, args)
}

#[unsafe(no_mangle)]
pub extern "C" fn new_uint_8_list(len: i32) -> *mut ByteBuffer {
    guarded("new_uint_8_list", || buffer::new_buffer(len), std::ptr::null_mut)
}

/// # Safety
/// `ptr` must be null or come from `new_uint_8_list` and not have been passed
/// to a wire function.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free_uint_8_list(ptr: *mut ByteBuffer) {
    guarded("free_uint_8_list", || unsafe { buffer::free_buffer(ptr) }, || ());
}

/// # Safety
/// `val` must be a result returned by a `wire_*` function, freed only once.
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free_WireSyncReturnStruct(val: SyncResult) {
    guarded(
        "free_WireSyncReturnStruct",
        || unsafe { buffer::free_sync_result(val) },
        || (),
    );
}

/// Installs the post-message function. Only the first registration is kept.
#[unsafe(no_mangle)]
pub extern "C" fn store_dart_post_cobject(ptr: Option<PostMessageFn>) {
    guarded(
        "store_dart_post_cobject",
        || {
            let Some(post) = ptr else {
                error!("Null post-message function");
                return;
            };
            let Some(bridge) = global() else {
                error!("Bridge unavailable, callback not stored");
                return;
            };
            match bridge.register_sink(Arc::new(CallbackSink::new(post))) {
                Ok(()) => info!("Post-message callback stored"),
                Err(e) => warn!(error = %e, "Callback registration ignored"),
            }
        },
        || (),
    );
}

/// References every exported symbol so the linker keeps them all.
#[unsafe(no_mangle)]
pub extern "C" fn dummy_method_to_enforce_bundling() -> i64 {
    let mut dummy_var: i64 = 0;
    dummy_var ^= wire_initialize as usize as i64;
    dummy_var ^= wire_load_tokens as usize as i64;
    dummy_var ^= wire_get_router as usize as i64;
    dummy_var ^= wire_set_account as usize as i64;
    dummy_var ^= wire_calculate_price_plp as usize as i64;
    dummy_var ^= wire_fetch_data as usize as i64;
    dummy_var ^= wire_get_swap_details as usize as i64;
    dummy_var ^= wire_fetch_async as usize as i64;
    dummy_var ^= wire_get_price_plp as usize as i64;
    dummy_var ^= wire_get_vault_state as usize as i64;
    dummy_var ^= wire_find_token as usize as i64;
    dummy_var ^= new_uint_8_list as usize as i64;
    dummy_var ^= free_uint_8_list as usize as i64;
    dummy_var ^= free_WireSyncReturnStruct as usize as i64;
    dummy_var ^= store_dart_post_cobject as usize as i64;
    dummy_var
}
