//! # Registries
//!
//! The four symbol tables of a context. Every table has a fixed capacity and
//! reports `Error::CapacityExhausted` when full; the context decides whether that
//! is fatal.
//!
//! ## Invariants
//! - **Last Wins**: `ServerFunctions::find` returns the newest registration of a name.
//! - **At Most Once**: A callback is removed from `CallbackTable` when it is taken,
//!   so a reference is honoured at most once.
//! - **Bounded Slots**: `CallbackTable` reuses the first free slot before growing.

use std::sync::Arc;

use castwire::CallbackRef;
use castwire::NodeId;
use castwire::StubId;

use crate::error::Error;
use crate::error::Result;
use crate::handler::HandlerRef;

/// Functions this node serves, by name.
pub struct ServerFunctions {
    entries: Vec<(String, HandlerRef)>,
    capacity: usize,
}

impl ServerFunctions {
    pub fn new(capacity: usize) -> Self {
        Self { entries: Vec::new(), capacity }
    }

    /// Adds a function. Re-registering a name shadows the earlier entry.
    pub fn register(&mut self, name: &str, handler: HandlerRef) -> Result<()> {
        if self.entries.len() >= self.capacity {
            return Err(Error::CapacityExhausted { table: "server_functions", capacity: self.capacity });
        }
        self.entries.push((name.to_owned(), handler));
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<HandlerRef> {
        self.entries.iter().rev().find(|(n, _)| n == name).map(|(_, h)| Arc::clone(h))
    }

    /// Distinct names, newest registration first.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (name, _) in self.entries.iter().rev() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Remote functions this node has declared it will call.
pub struct ClientStubs {
    entries: Vec<(StubId, String)>,
    capacity: usize,
}

impl ClientStubs {
    pub fn new(capacity: usize) -> Self {
        Self { entries: Vec::new(), capacity }
    }

    pub fn register(&mut self, id: StubId, name: &str) -> Result<()> {
        if self.entries.len() >= self.capacity {
            return Err(Error::CapacityExhausted { table: "client_stubs", capacity: self.capacity });
        }
        self.entries.push((id, name.to_owned()));
        Ok(())
    }

    pub fn name_of(&self, id: StubId) -> Option<&str> {
        self.entries.iter().find(|(i, _)| *i == id).map(|(_, n)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Callbacks activated on this node and waiting to be invoked.
pub struct CallbackTable {
    slots: Vec<Option<(CallbackRef, HandlerRef)>>,
    capacity: usize,
}

impl CallbackTable {
    pub fn new(capacity: usize) -> Self {
        Self { slots: Vec::new(), capacity }
    }

    /// Makes `handler` invocable through `callback_ref`.
    ///
    /// Zero and references that are already live are rejected.
    pub fn activate(&mut self, callback_ref: CallbackRef, handler: HandlerRef) -> Result<()> {
        if callback_ref.is_null() {
            return Err(Error::InvalidArgument("callback reference zero is reserved".into()));
        }
        if self.contains(callback_ref) {
            return Err(Error::InvalidArgument(format!("callback {} is already active", callback_ref)));
        }

        let entry = Some((callback_ref, handler));
        if let Some(slot) = self.slots.iter_mut().find(|s| s.is_none()) {
            *slot = entry;
            return Ok(());
        }
        if self.slots.len() >= self.capacity {
            return Err(Error::CapacityExhausted { table: "callbacks", capacity: self.capacity });
        }
        self.slots.push(entry);
        Ok(())
    }

    /// Removes and returns the handler for `callback_ref`.
    pub fn take_by_ref(&mut self, callback_ref: CallbackRef) -> Option<HandlerRef> {
        let slot = self.slots.iter_mut().find(|s| matches!(s, Some((r, _)) if *r == callback_ref))?;
        slot.take().map(|(_, h)| h)
    }

    /// Removes the callback registered with this exact handler, returning its reference.
    pub fn take_by_handler(&mut self, handler: &HandlerRef) -> Option<CallbackRef> {
        let slot = self.slots.iter_mut().find(|s| matches!(s, Some((_, h)) if Arc::ptr_eq(h, handler)))?;
        slot.take().map(|(r, _)| r)
    }

    /// Drops a pending callback. Unknown or consumed references are ignored.
    pub fn cancel(&mut self, callback_ref: CallbackRef) -> bool {
        self.take_by_ref(callback_ref).is_some()
    }

    pub fn contains(&self, callback_ref: CallbackRef) -> bool {
        self.slots.iter().flatten().any(|(r, _)| *r == callback_ref)
    }

    /// Number of callbacks still waiting.
    pub fn live(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Allocated slots, live or free.
    pub fn slots(&self) -> usize {
        self.slots.len()
    }
}

/// Outcome of recording a remote function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registered {
    New,
    Duplicate,
}

/// Functions served by remote nodes, as learned from control messages.
pub struct RemoteNodes {
    entries: Vec<(NodeId, String)>,
    capacity: usize,
}

impl RemoteNodes {
    pub fn new(capacity: usize) -> Self {
        Self { entries: Vec::new(), capacity }
    }

    pub fn register(&mut self, node: NodeId, name: &str) -> Result<Registered> {
        if self.entries.iter().any(|(n, f)| *n == node && f == name) {
            return Ok(Registered::Duplicate);
        }
        if self.entries.len() >= self.capacity {
            return Err(Error::CapacityExhausted { table: "remote_nodes", capacity: self.capacity });
        }
        self.entries.push((node, name.to_owned()));
        Ok(Registered::New)
    }

    /// Forgets every function served by `node`. Returns how many were removed.
    pub fn unregister_node(&mut self, node: NodeId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| *n != node);
        before - self.entries.len()
    }

    /// True if any remote node serves `name`.
    pub fn serves(&self, name: &str) -> bool {
        self.entries.iter().any(|(_, f)| f == name)
    }

    pub fn functions_of(&self, node: NodeId) -> Vec<&str> {
        self.entries.iter().filter(|(n, _)| *n == node).map(|(_, f)| f.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
