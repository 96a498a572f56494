//! Byte buffers crossing the C boundary.
//!
//! Every byte array handed to the caller is a leaked `Box<[u8]>`; it comes back
//! exactly once, either consumed by a wire function or released by one of the
//! free functions. Buffers built by anything other than [`new_buffer`] or a
//! returned [`SyncResult`] must never be passed back.

use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::bridge::sink::Reply;
use crate::exceptions::DecodeError;

/// Number of byte arrays currently owned by the caller
static LIVE_BUFFERS: AtomicUsize = AtomicUsize::new(0);

/// `wire_uint_8_list` in the C header
#[repr(C)]
#[derive(Debug)]
pub struct ByteBuffer {
    pub ptr: *mut u8,
    pub len: i32,
}

/// `WireSyncReturnStruct` in the C header
///
/// When `success` is false the bytes hold an encoded error payload.
#[repr(C)]
#[derive(Debug)]
pub struct SyncResult {
    pub ptr: *mut u8,
    pub len: i32,
    pub success: bool,
}

/// Byte arrays handed out and not yet reclaimed
pub fn live_buffers() -> usize {
    LIVE_BUFFERS.load(Ordering::SeqCst)
}

fn leak_bytes(bytes: Vec<u8>) -> Option<(*mut u8, i32)> {
    let len = i32::try_from(bytes.len()).ok()?;
    let raw = Box::into_raw(bytes.into_boxed_slice());
    LIVE_BUFFERS.fetch_add(1, Ordering::SeqCst);
    Some((raw as *mut u8, len))
}

/// # Safety
/// `ptr`/`len` must come from [`leak_bytes`] and not have been reclaimed yet.
unsafe fn reclaim_bytes(ptr: *mut u8, len: i32) -> Vec<u8> {
    LIVE_BUFFERS.fetch_sub(1, Ordering::SeqCst);
    let slice = ptr::slice_from_raw_parts_mut(ptr, len as usize);
    unsafe { Box::from_raw(slice) }.into_vec()
}

/// Allocates a zeroed buffer of `len` bytes owned by the caller.
///
/// Returns null for a negative length or when the allocation cannot be made.
pub fn new_buffer(len: i32) -> *mut ByteBuffer {
    let Ok(size) = usize::try_from(len) else {
        return ptr::null_mut();
    };

    let mut data = Vec::new();
    if data.try_reserve_exact(size).is_err() {
        return ptr::null_mut();
    }
    data.resize(size, 0);

    match leak_bytes(data) {
        Some((ptr, len)) => Box::into_raw(Box::new(ByteBuffer { ptr, len })),
        None => ptr::null_mut(),
    }
}

/// Takes ownership of a buffer passed as a wire argument and copies it out.
///
/// The buffer is released whether or not its contents are valid.
///
/// # Safety
/// `buffer` must be null or a pointer returned by [`new_buffer`] that has not
/// been consumed or freed.
pub unsafe fn take_buffer(buffer: *mut ByteBuffer) -> Result<Vec<u8>, DecodeError> {
    if buffer.is_null() {
        return Err(DecodeError::NullBuffer(0));
    }
    let wrapper = unsafe { Box::from_raw(buffer) };

    if wrapper.len < 0 {
        return Err(DecodeError::NegativeLength(wrapper.len));
    }
    if wrapper.ptr.is_null() {
        return if wrapper.len == 0 {
            Ok(Vec::new())
        } else {
            Err(DecodeError::NullBuffer(wrapper.len))
        };
    }

    Ok(unsafe { reclaim_bytes(wrapper.ptr, wrapper.len) })
}

/// Releases a buffer the caller allocated but never passed across.
///
/// # Safety
/// Same contract as [`take_buffer`].
pub unsafe fn free_buffer(buffer: *mut ByteBuffer) {
    let _ = unsafe { take_buffer(buffer) };
}

impl SyncResult {
    /// Hands the reply bytes over to the caller.
    ///
    /// A payload too large for an `i32` length is replaced by an empty failure.
    pub fn from_reply(reply: Reply) -> Self {
        match leak_bytes(reply.payload) {
            Some((ptr, len)) => Self {
                ptr,
                len,
                success: reply.success,
            },
            None => Self {
                ptr: ptr::null_mut(),
                len: 0,
                success: false,
            },
        }
    }

    /// Non-owning view used while a callback runs
    pub(crate) fn borrowed(payload: &[u8], success: bool) -> Self {
        Self {
            ptr: payload.as_ptr() as *mut u8,
            len: i32::try_from(payload.len()).unwrap_or(i32::MAX),
            success,
        }
    }

    /// Copies the payload without taking ownership.
    ///
    /// # Safety
    /// `ptr`/`len` must describe readable memory.
    pub unsafe fn as_bytes(&self) -> &[u8] {
        if self.ptr.is_null() || self.len <= 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr, self.len as usize) }
    }
}

/// Releases a result returned by a synchronous call.
///
/// # Safety
/// `result` must come from [`SyncResult::from_reply`] and be freed only once.
pub unsafe fn free_sync_result(result: SyncResult) {
    if result.ptr.is_null() || result.len < 0 {
        return;
    }
    drop(unsafe { reclaim_bytes(result.ptr, result.len) });
}
