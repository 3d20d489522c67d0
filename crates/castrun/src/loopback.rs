//! # Loopback Transport
//!
//! An in-process call group. Every context opened through the same
//! `LoopbackGroup` sees every other one, with reliable ordered delivery.
//!
//! Each session owns the receiving end of a `UnixDatagram` pair and registers it
//! with its context's multiplexer. Whoever queues an event for the session writes
//! one byte to the other end, so the real event loop wakes up and drives the
//! session exactly as it would a network transport.
//!
//! Subscriptions are not announce-driven: when a subscriber activates it completes
//! a subscription with every active member, in both directions.

use std::collections::VecDeque;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixDatagram;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use castwire::NodeId;
use parking_lot::Mutex;

use crate::config::TransportSettings;
use crate::mux::Interest;
use crate::mux::Registrar;
use crate::transport;
use crate::transport::InboundPacket;
use crate::transport::PacketId;
use crate::transport::Progress;
use crate::transport::Publisher;
use crate::transport::Session;
use crate::transport::Subscriber;
use crate::transport::TransportEvent;
use crate::transport::TransportFactory;
use crate::transport::WriteStatus;

/// Every session registers its doorbell under this connection index.
const DOORBELL_INDEX: u16 = 0;

/// Write end of a session's doorbell.
struct Bell(UnixDatagram);

impl Bell {
    fn ring(&self) {
        match self.0.send(&[1]) {
            Ok(_) => {}
            // A pending byte already wakes the reader.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => tracing::warn!(error = %e, "loopback doorbell failed"),
        }
    }
}

fn doorbell() -> io::Result<(Bell, UnixDatagram)> {
    let (tx, rx) = UnixDatagram::pair()?;
    tx.set_nonblocking(true)?;
    rx.set_nonblocking(true)?;
    Ok((Bell(tx), rx))
}

/// Drains every pending byte. Returns the number of datagrams read.
fn drain(rx: &UnixDatagram) -> io::Result<usize> {
    let mut buf = [0u8; 16];
    let mut n = 0;
    loop {
        match rx.recv(&mut buf) {
            Ok(_) => n += 1,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(n),
            Err(e) => return Err(e),
        }
    }
}

struct Member {
    node: NodeId,
    active: bool,
    pub_bell: Bell,
    sub_bell: Bell,
    pub_events: Vec<TransportEvent>,
    sub_events: Vec<TransportEvent>,
    inbound: VecDeque<InboundPacket>,
    congested: bool,
    published: Vec<Vec<u8>>,
    dispatched: u64,
    announce: Option<Duration>,
    next_timeout: Option<Instant>,
    timeouts: u64,
}

impl Member {
    fn notify_sub(&mut self, event: TransportEvent) {
        self.sub_events.push(event);
        self.sub_bell.ring();
    }

    fn notify_pub(&mut self, event: TransportEvent) {
        self.pub_events.push(event);
        self.pub_bell.ring();
    }
}

#[derive(Default)]
struct Group {
    members: Vec<Member>,
    next_packet_id: u64,
}

impl Group {
    fn member(&self, node: NodeId) -> Option<&Member> {
        self.members.iter().find(|m| m.node == node)
    }

    fn member_mut(&mut self, node: NodeId) -> transport::Result<&mut Member> {
        self.members
            .iter_mut()
            .find(|m| m.node == node)
            .ok_or_else(|| transport::Error::ConnectionLost(format!("{} is not in the group", node)))
    }

    fn deliver(&mut self, to: NodeId, payload: Vec<u8>) -> transport::Result<()> {
        self.next_packet_id += 1;
        let id = PacketId(self.next_packet_id);
        let member = self.member_mut(to)?;
        member.inbound.push_back(InboundPacket { id, payload });
        member.notify_sub(TransportEvent::PacketsReady);
        Ok(())
    }
}

/// An in-process multicast group. Cloning shares the group.
#[derive(Clone, Default)]
pub struct LoopbackGroup {
    group: Arc<Mutex<Group>>,
}

impl LoopbackGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes currently in the group, in join order.
    pub fn members(&self) -> Vec<NodeId> {
        self.group.lock().members.iter().map(|m| m.node).collect()
    }

    /// Removes `node`, telling every remaining publisher its subscriber is gone.
    pub fn leave(&self, node: NodeId) -> bool {
        let mut group = self.group.lock();
        let Some(pos) = group.members.iter().position(|m| m.node == node) else {
            return false;
        };
        group.members.remove(pos);
        for member in group.members.iter_mut().filter(|m| m.active) {
            member.notify_pub(TransportEvent::SubscriberDisconnect { node });
        }
        tracing::debug!(%node, "left loopback group");
        true
    }

    /// Makes the publisher of `node` report congestion. Clearing it wakes the node.
    pub fn set_congested(&self, node: NodeId, congested: bool) {
        let mut group = self.group.lock();
        if let Ok(member) = group.member_mut(node) {
            member.congested = congested;
            member.pub_bell.ring();
        }
    }

    /// Packets the publisher of `node` has accepted.
    pub fn handoffs(&self, node: NodeId) -> usize {
        self.group.lock().member(node).map(|m| m.published.len()).unwrap_or(0)
    }

    /// Copies of every packet `node` published, oldest first.
    pub fn published(&self, node: NodeId) -> Vec<Vec<u8>> {
        self.group.lock().member(node).map(|m| m.published.clone()).unwrap_or_default()
    }

    /// Packets `node` has acknowledged as dispatched.
    pub fn dispatched(&self, node: NodeId) -> u64 {
        self.group.lock().member(node).map(|m| m.dispatched).unwrap_or(0)
    }

    /// The announce interval the context of `node` configured.
    pub fn announce_interval(&self, node: NodeId) -> Option<Duration> {
        self.group.lock().member(node).and_then(|m| m.announce)
    }

    /// Schedules timeout processing for the publisher of `node`.
    pub fn set_next_timeout(&self, node: NodeId, at: Option<Instant>) {
        let mut group = self.group.lock();
        if let Ok(member) = group.member_mut(node) {
            member.next_timeout = at;
        }
    }

    /// How often the publisher of `node` processed a due timeout.
    pub fn timeouts(&self, node: NodeId) -> u64 {
        self.group.lock().member(node).map(|m| m.timeouts).unwrap_or(0)
    }

    /// Hands a raw payload to the subscriber of `node` as if it came off the wire.
    pub fn deliver(&self, to: NodeId, payload: Vec<u8>) -> transport::Result<()> {
        self.group.lock().deliver(to, payload)
    }
}

impl TransportFactory for LoopbackGroup {
    fn open(
        &self,
        _settings: &TransportSettings,
        node_id: NodeId,
        publisher: Registrar,
        subscriber: Registrar,
    ) -> transport::Result<(Box<dyn Publisher>, Box<dyn Subscriber>)> {
        let (pub_bell, pub_rx) = doorbell()?;
        let (sub_bell, sub_rx) = doorbell()?;

        {
            let mut group = self.group.lock();
            if group.member(node_id).is_some() {
                return Err(transport::Error::Io(format!("{} already joined the group", node_id)));
            }
            group.members.push(Member {
                node: node_id,
                active: false,
                pub_bell,
                sub_bell,
                pub_events: Vec::new(),
                sub_events: Vec::new(),
                inbound: VecDeque::new(),
                congested: false,
                published: Vec::new(),
                dispatched: 0,
                announce: None,
                next_timeout: None,
                timeouts: 0,
            });
        }

        publisher.add(pub_rx.as_raw_fd(), DOORBELL_INDEX, Interest::READ);
        subscriber.add(sub_rx.as_raw_fd(), DOORBELL_INDEX, Interest::READ);
        tracing::debug!(node = %node_id, "joined loopback group");

        let publisher = LoopbackPublisher {
            node: node_id,
            group: Arc::clone(&self.group),
            rx: pub_rx,
            registrar: publisher,
        };
        let subscriber = LoopbackSubscriber {
            node: node_id,
            group: Arc::clone(&self.group),
            rx: sub_rx,
            registrar: subscriber,
        };
        Ok((Box::new(publisher), Box::new(subscriber)))
    }
}

pub struct LoopbackPublisher {
    node: NodeId,
    group: Arc<Mutex<Group>>,
    rx: UnixDatagram,
    registrar: Registrar,
}

impl Session for LoopbackPublisher {
    fn node_id(&self) -> NodeId {
        self.node
    }

    fn activate(&mut self) -> transport::Result<()> {
        Ok(())
    }

    fn read(&mut self, _index: u16) -> transport::Result<()> {
        drain(&self.rx)?;
        Ok(())
    }

    fn write(&mut self, _index: u16) -> transport::Result<WriteStatus> {
        Ok(WriteStatus::NoData)
    }

    fn close_connection(&mut self, index: u16) {
        tracing::debug!(node = %self.node, index, "loopback publisher connection closed");
    }

    fn next_timeout(&self) -> Option<Instant> {
        self.group.lock().member(self.node).and_then(|m| m.next_timeout)
    }

    fn process_timeout(&mut self) -> transport::Result<Progress> {
        let mut group = self.group.lock();
        let member = group.member_mut(self.node)?;
        if member.next_timeout.is_some_and(|t| t <= Instant::now()) {
            member.next_timeout = None;
            member.timeouts += 1;
        }
        Ok(Progress::Done)
    }

    fn socket_count(&self) -> usize {
        1
    }

    fn take_events(&mut self) -> Vec<TransportEvent> {
        let mut group = self.group.lock();
        match group.member_mut(self.node) {
            Ok(member) => std::mem::take(&mut member.pub_events),
            Err(_) => Vec::new(),
        }
    }
}

impl Publisher for LoopbackPublisher {
    fn queue_packet(&mut self, payload: Vec<u8>) -> transport::Result<()> {
        let mut group = self.group.lock();
        let member = group.member_mut(self.node)?;
        if member.congested {
            return Err(transport::Error::WouldBlock);
        }
        member.published.push(payload.clone());

        let targets: Vec<NodeId> =
            group.members.iter().filter(|m| m.active && m.node != self.node).map(|m| m.node).collect();
        for node in targets {
            group.deliver(node, payload.clone())?;
        }
        Ok(())
    }

    fn is_congested(&self) -> bool {
        self.group.lock().member(self.node).is_some_and(|m| m.congested)
    }

    fn set_announce_interval(&mut self, interval: Option<Duration>) {
        let mut group = self.group.lock();
        if let Ok(member) = group.member_mut(self.node) {
            member.announce = interval;
        }
    }
}

impl Drop for LoopbackPublisher {
    fn drop(&mut self) {
        self.registrar.remove(self.rx.as_raw_fd(), DOORBELL_INDEX);
    }
}

pub struct LoopbackSubscriber {
    node: NodeId,
    group: Arc<Mutex<Group>>,
    rx: UnixDatagram,
    registrar: Registrar,
}

impl Session for LoopbackSubscriber {
    fn node_id(&self) -> NodeId {
        self.node
    }

    /// Completes a subscription with every active member, both ways.
    fn activate(&mut self) -> transport::Result<()> {
        let mut group = self.group.lock();
        let me = self.node;
        let peers: Vec<NodeId> = group.members.iter().filter(|m| m.active && m.node != me).map(|m| m.node).collect();

        for node in &peers {
            group.member_mut(*node)?.notify_sub(TransportEvent::SubscriptionComplete { node: me });
        }
        let member = group.member_mut(me)?;
        for node in peers {
            member.notify_sub(TransportEvent::SubscriptionComplete { node });
        }
        member.active = true;
        Ok(())
    }

    fn read(&mut self, _index: u16) -> transport::Result<()> {
        drain(&self.rx)?;
        Ok(())
    }

    fn write(&mut self, _index: u16) -> transport::Result<WriteStatus> {
        Ok(WriteStatus::NoData)
    }

    fn close_connection(&mut self, index: u16) {
        tracing::debug!(node = %self.node, index, "loopback subscriber connection closed");
    }

    fn next_timeout(&self) -> Option<Instant> {
        None
    }

    fn process_timeout(&mut self) -> transport::Result<Progress> {
        Ok(Progress::Done)
    }

    fn socket_count(&self) -> usize {
        1
    }

    fn take_events(&mut self) -> Vec<TransportEvent> {
        let mut group = self.group.lock();
        match group.member_mut(self.node) {
            Ok(member) => std::mem::take(&mut member.sub_events),
            Err(_) => Vec::new(),
        }
    }
}

impl Subscriber for LoopbackSubscriber {
    fn next_dispatch_ready(&mut self) -> Option<InboundPacket> {
        self.group.lock().member_mut(self.node).ok()?.inbound.pop_front()
    }

    fn packet_dispatched(&mut self, _id: PacketId) {
        let mut group = self.group.lock();
        if let Ok(member) = group.member_mut(self.node) {
            member.dispatched += 1;
        }
    }

    fn write_control_message(&mut self, node: NodeId, payload: &[u8]) -> transport::Result<()> {
        let mut group = self.group.lock();
        group.member_mut(node)?.notify_pub(TransportEvent::ControlMessage { payload: payload.to_vec() });
        Ok(())
    }
}

impl Drop for LoopbackSubscriber {
    fn drop(&mut self) {
        self.registrar.remove(self.rx.as_raw_fd(), DOORBELL_INDEX);
        let group = LoopbackGroup { group: Arc::clone(&self.group) };
        group.leave(self.node);
    }
}
