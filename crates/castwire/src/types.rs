//! Strongly typed identifiers carried on the wire.

/// Identifies one participating process on the multicast group.
#[derive(Copy, Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node-{:#010x}", self.0)
    }
}

/// Opaque reference to a one-shot callback activated on the calling node.
///
/// Zero is reserved: it never names a live callback and marks a named call
/// in handler invocations.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CallbackRef(pub u64);

impl CallbackRef {
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for CallbackRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cb-{}", self.0)
    }
}

/// Identity of a client stub declared on this node.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct StubId(pub u64);

impl std::fmt::Display for StubId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stub-{}", self.0)
    }
}
