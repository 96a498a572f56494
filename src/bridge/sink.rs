use std::ffi::c_void;
use tracing::warn;

use crate::bridge::buffer::SyncResult;
use crate::bridge::port::PortId;
use crate::exceptions::{BridgeError, ErrorPayload};
use crate::utils::serialization::Codec;

/// Outcome of one call, ready to cross the boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// False when `payload` is an encoded [`ErrorPayload`]
    pub success: bool,
    pub payload: Vec<u8>,
}

impl Reply {
    pub fn ok(payload: Vec<u8>) -> Self {
        Self {
            success: true,
            payload,
        }
    }

    /// Failed reply; the payload is never empty.
    pub fn error(codec: Codec, err: &BridgeError) -> Self {
        let payload = ErrorPayload::from(err);
        let bytes = codec
            .encode(&payload)
            .unwrap_or_else(|_| payload.message.clone().into_bytes());
        Self {
            success: false,
            payload: bytes,
        }
    }

    pub fn from_outcome(codec: Codec, outcome: Result<Vec<u8>, BridgeError>) -> Self {
        match outcome {
            Ok(payload) => Self::ok(payload),
            Err(e) => Self::error(codec, &e),
        }
    }
}

/// Delivery path for asynchronous replies
///
/// Installed once per bridge; `post` is called from worker threads.
pub trait ReplySink: Send + Sync {
    /// Delivers `reply` to `port`; returns whether the receiver accepted it.
    fn post(&self, port: PortId, reply: &Reply) -> bool;
}

/// `DartPostCObjectFnType` in the C header
pub type PostMessageFn = unsafe extern "C" fn(port_id: PortId, message: *mut c_void) -> bool;

/// Sink backed by the caller's post-message function.
///
/// The message is a pointer to a [`SyncResult`] that stays valid only while the
/// function runs; the receiver copies the bytes it needs.
pub struct CallbackSink {
    post: PostMessageFn,
}

impl CallbackSink {
    pub fn new(post: PostMessageFn) -> Self {
        Self { post }
    }
}

impl ReplySink for CallbackSink {
    fn post(&self, port: PortId, reply: &Reply) -> bool {
        let mut view = SyncResult::borrowed(&reply.payload, reply.success);
        let message = &mut view as *mut SyncResult as *mut c_void;
        let accepted = unsafe { (self.post)(port, message) };
        if !accepted {
            warn!(port, "Receiver rejected reply");
        }
        accepted
    }
}
