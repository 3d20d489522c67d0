//! # Transport Boundary
//!
//! The reliable multicast transport the context drives. The context never touches
//! sockets itself: it hands each session a `Registrar` for descriptor registration,
//! forwards readiness back by connection index, and drains the events the session
//! produced.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: Sessions move opaque payloads. They know nothing about
//!   call frames, names or callbacks.
//! - **Event Queue**: Sessions report subscription changes, control messages and
//!   delivered packets through `take_events` instead of calling back into the
//!   context. The context processes them after the session call returns.
//! - **Object-Safe**: Sessions are held as `Box<dyn Publisher>` / `Box<dyn Subscriber>`.

use std::fmt;
use std::time::Duration;
use std::time::Instant;

use castwire::NodeId;

use crate::config::TransportSettings;
use crate::mux::Registrar;

/// Errors that occur at the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The peer is unreachable or the connection was dropped.
    ConnectionLost(String),
    /// The operation cannot make progress right now.
    WouldBlock,
    /// Generic I/O error or internal transport failure.
    Io(String),
    /// The session has been shut down.
    Closed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::WouldBlock => write!(f, "Operation would block"),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
            Self::Closed => write!(f, "Session closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::WouldBlock {
            Self::WouldBlock
        } else {
            Self::Io(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of servicing a writable connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    /// Nothing was queued for the connection. Not an error.
    NoData,
}

/// Outcome of timeout processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Done,
    /// Retransmissions hit full queues; keep processing events to drain them.
    Backlogged,
}

/// Identifies a delivered packet until it is acknowledged as dispatched.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct PacketId(pub u64);

/// A packet whose payload is ready to be dispatched.
#[derive(Debug, Clone)]
pub struct InboundPacket {
    pub id: PacketId,
    pub payload: Vec<u8>,
}

/// Something a session wants the context to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The subscriber finished subscribing to a remote publisher.
    SubscriptionComplete { node: NodeId },
    /// A remote subscriber went away.
    SubscriberDisconnect { node: NodeId },
    /// The publisher received a control message from a remote subscriber.
    ControlMessage { payload: Vec<u8> },
    /// The subscriber has packets waiting in `next_dispatch_ready`.
    PacketsReady,
}

/// Operations shared by both halves of a transport.
pub trait Session: Send {
    fn node_id(&self) -> NodeId;

    /// Starts listening or announcing. Called once, right after creation.
    fn activate(&mut self) -> Result<()>;

    /// Services a readable connection.
    fn read(&mut self, index: u16) -> Result<()>;

    /// Services a writable connection.
    fn write(&mut self, index: u16) -> Result<WriteStatus>;

    fn close_connection(&mut self, index: u16);

    /// The next instant at which `process_timeout` must run, if any.
    fn next_timeout(&self) -> Option<Instant>;

    fn process_timeout(&mut self) -> Result<Progress>;

    /// Number of descriptors the session currently holds open.
    fn socket_count(&self) -> usize;

    /// Drains queued events in the order they were produced.
    fn take_events(&mut self) -> Vec<TransportEvent>;
}

/// The sending half: multicasts payloads to every subscriber of this node.
pub trait Publisher: Session {
    /// Queues one payload as a single packet.
    fn queue_packet(&mut self, payload: Vec<u8>) -> Result<()>;

    /// True while too many packets are unacknowledged to accept more.
    fn is_congested(&self) -> bool;

    /// Periodically announce this publisher so remote subscribers find it.
    fn set_announce_interval(&mut self, interval: Option<Duration>);
}

/// The receiving half: delivers packets from every publisher on the group.
pub trait Subscriber: Session {
    fn next_dispatch_ready(&mut self) -> Option<InboundPacket>;

    /// Acknowledges a packet returned by `next_dispatch_ready`.
    fn packet_dispatched(&mut self, id: PacketId);

    /// Sends an out-of-band message to the publisher on `node`.
    fn write_control_message(&mut self, node: NodeId, payload: &[u8]) -> Result<()>;
}

/// Creates the publisher and subscriber sessions of one context.
pub trait TransportFactory: Send + Sync {
    fn open(
        &self,
        settings: &TransportSettings,
        node_id: NodeId,
        publisher: Registrar,
        subscriber: Registrar,
    ) -> Result<(Box<dyn Publisher>, Box<dyn Subscriber>)>;
}
