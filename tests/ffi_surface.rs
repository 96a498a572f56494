//! Drives the exported C functions the way the mobile shell does. The C ABI
//! serves one process-wide bridge, so the whole sequence is a single test.

use std::ffi::c_void;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use router_bridge::bridge::buffer::{ByteBuffer, SyncResult, live_buffers};
use router_bridge::exceptions::ErrorPayload;
use router_bridge::ffi::*;

const ACCOUNT: &str = "0xaC7c1a2fFb8b3f3bEa3e6aB4bC8b1A2Ff4Bb4Aa4";
const ARB_USDT: &str = "0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9";

static REPLIES: Mutex<Vec<(i64, bool, Vec<u8>)>> = Mutex::new(Vec::new());
static STRAY: Mutex<Vec<i64>> = Mutex::new(Vec::new());

unsafe extern "C" fn collect(port_id: i64, message: *mut c_void) -> bool {
    let result = unsafe { &*(message as *const SyncResult) };
    let bytes = unsafe { result.as_bytes() }.to_vec();
    REPLIES.lock().unwrap().push((port_id, result.success, bytes));
    true
}

unsafe extern "C" fn stray(port_id: i64, _message: *mut c_void) -> bool {
    STRAY.lock().unwrap().push(port_id);
    true
}

fn buffer_with(bytes: &[u8]) -> *mut ByteBuffer {
    let buffer = new_uint_8_list(bytes.len() as i32);
    assert!(!buffer.is_null());
    unsafe {
        std::slice::from_raw_parts_mut((*buffer).ptr, bytes.len()).copy_from_slice(bytes);
    }
    buffer
}

fn wait_for(port: i64) -> (bool, Vec<u8>) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        {
            let replies = REPLIES.lock().unwrap();
            if let Some((_, success, bytes)) = replies.iter().find(|(p, _, _)| *p == port) {
                return (*success, bytes.clone());
            }
        }
        assert!(Instant::now() < deadline, "no reply for port {}", port);
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn error_code(bytes: &[u8]) -> String {
    serde_json::from_slice::<ErrorPayload>(bytes).unwrap().code
}

fn take_sync(result: SyncResult) -> (bool, Vec<u8>) {
    let out = (result.success, unsafe { result.as_bytes() }.to_vec());
    unsafe { free_WireSyncReturnStruct(result) };
    out
}

#[test]
fn wire_surface() {
    assert_ne!(dummy_method_to_enforce_bundling(), 0);

    // Before registration: refused, buffers still released, nothing delivered
    wire_load_tokens(99);
    unsafe { wire_set_account(98, buffer_with(ACCOUNT.as_bytes())) };
    assert_eq!(live_buffers(), 0);

    store_dart_post_cobject(None);
    store_dart_post_cobject(Some(collect));
    store_dart_post_cobject(Some(stray));

    wire_initialize(1, 42161);
    let (success, bytes) = wait_for(1);
    assert!(success);
    let summary: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(summary["chain_id"], 42161);

    // A 16-byte descriptor: ownership moves to the callee with the call
    let descriptor = new_uint_8_list(16);
    unsafe {
        std::slice::from_raw_parts_mut((*descriptor).ptr, 16).copy_from_slice(b"acct:0123456789a");
        wire_set_account(7, descriptor);
    }
    assert_eq!(live_buffers(), 0);
    let (success, bytes) = wait_for(7);
    assert!(!success);
    assert_eq!(error_code(&bytes), "invalid_account");

    unsafe { wire_set_account(8, buffer_with(ACCOUNT.as_bytes())) };
    let (success, bytes) = wait_for(8);
    assert!(success);
    assert_eq!(serde_json::from_slice::<serde_json::Value>(&bytes).unwrap()["account"], ACCOUNT);

    // No market feed is attached to the default bridge
    wire_calculate_price_plp(3);
    wire_calculate_price_plp(4);
    for port in [3, 4] {
        let (success, bytes) = wait_for(port);
        assert!(!success);
        assert_eq!(error_code(&bytes), "feed_unavailable");
    }

    // A null argument is a decode error; the other buffers are still consumed
    unsafe {
        wire_get_swap_details(
            5,
            buffer_with(ARB_USDT.as_bytes()),
            std::ptr::null_mut(),
            buffer_with(b"1000"),
        )
    };
    assert_eq!(live_buffers(), 0);
    let (success, bytes) = wait_for(5);
    assert!(!success);
    assert_eq!(error_code(&bytes), "decode");

    let (success, bytes) = take_sync(unsafe { wire_find_token(buffer_with(&[0xc3, 0x28])) });
    assert!(!success);
    assert!(!bytes.is_empty());
    assert_eq!(error_code(&bytes), "decode");

    let (success, bytes) = take_sync(unsafe { wire_find_token(buffer_with(ARB_USDT.as_bytes())) });
    assert!(success);
    assert_eq!(serde_json::from_slice::<serde_json::Value>(&bytes).unwrap()["decimals"], 6);

    let (success, bytes) = take_sync(wire_get_price_plp(true));
    assert!(!success);
    assert_eq!(error_code(&bytes), "price_not_calculated");

    let (success, bytes) = take_sync(wire_get_vault_state());
    assert!(!success);
    assert_eq!(error_code(&bytes), "vault_not_loaded");

    assert_eq!(live_buffers(), 0);

    std::thread::sleep(Duration::from_millis(200));
    let replies = REPLIES.lock().unwrap();
    let mut ports: Vec<i64> = replies.iter().map(|(p, _, _)| *p).collect();
    ports.sort();
    assert_eq!(ports, vec![1, 3, 4, 5, 7, 8]);
    assert!(STRAY.lock().unwrap().is_empty());
}
