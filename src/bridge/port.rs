use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::exceptions::BridgeError;

/// `DartPort` in the C header
pub type PortId = i64;

/// Observable stage of an in-flight call
///
/// A port missing from the registry has either never been used or already
/// received its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Issued,
    Executing,
}

/// Ports that are owed a reply
#[derive(Default)]
pub struct PortRegistry {
    calls: Mutex<HashMap<PortId, CallState>>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn calls(&self) -> MutexGuard<'_, HashMap<PortId, CallState>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `port` as issued; a port can carry one call at a time.
    pub fn issue(&self, port: PortId) -> Result<(), BridgeError> {
        let mut calls = self.calls();
        if calls.contains_key(&port) {
            return Err(BridgeError::PortInFlight(port));
        }
        calls.insert(port, CallState::Issued);
        Ok(())
    }

    pub fn start(&self, port: PortId) {
        if let Some(state) = self.calls().get_mut(&port) {
            *state = CallState::Executing;
        }
    }

    /// Releases `port`. Only the first completion returns true, which is what
    /// entitles the caller to post the reply.
    pub fn complete(&self, port: PortId) -> bool {
        self.calls().remove(&port).is_some()
    }

    pub fn state(&self, port: PortId) -> Option<CallState> {
        self.calls().get(&port).copied()
    }

    pub fn in_flight(&self) -> usize {
        self.calls().len()
    }
}
