//! # Outbound Buffer
//!
//! Every call a context makes is appended to one shared buffer. Unbuffered, the
//! buffer is handed to the publisher after each call; in buffered mode calls
//! accumulate until an explicit flush, so they leave as a single packet.
//!
//! ## Invariants
//! - **Bounded**: The buffer never grows past its capacity; a call that does not
//!   fit is refused with `Error::Busy` and nothing is written.
//! - **Whole Packets**: A flush hands off the entire buffer or nothing. The cursor
//!   resets only after the publisher accepted the packet.
//! - **Congestion**: No hand-off happens while the publisher reports congestion.

use castwire::CallEncoder;
use castwire::NodeId;
use castwire::Target;

use crate::error::Error;
use crate::error::Result;
use crate::transport::Publisher;

/// What `enqueue` did with the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Written and should be handed off now.
    Immediate,
    /// Written and held for an explicit flush.
    Held,
}

/// Outcome of a flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flushed {
    /// Nothing was buffered.
    Empty,
    /// The buffer went out as one packet of this many bytes.
    Sent(usize),
    /// The publisher is congested; the data stays buffered.
    Congested,
}

pub struct OutboundBuffer {
    buf: Vec<u8>,
    capacity: usize,
    buffering: bool,
    handoffs: u64,
}

impl OutboundBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity), capacity, buffering: false, handoffs: 0 }
    }

    /// Validates and appends one call frame.
    pub fn enqueue(&mut self, node_id: NodeId, target: Target<'_>, args: &[u8]) -> Result<Enqueued> {
        let encoder = CallEncoder::new(node_id, target, args);
        let needed = encoder.encoded_len().map_err(|e| Error::InvalidArgument(e.to_string()))?;

        if needed > self.free() {
            tracing::debug!(needed, free = self.free(), "outbound buffer full");
            return Err(Error::Busy);
        }

        encoder.encode(&mut self.buf)?;
        tracing::trace!(name = target.name(), len = needed, used = self.buf.len(), "enqueued call");

        Ok(if self.buffering { Enqueued::Held } else { Enqueued::Immediate })
    }

    /// Hands the buffered bytes to `publisher` as a single packet.
    pub fn flush(&mut self, publisher: &mut dyn Publisher) -> Result<Flushed> {
        if self.buf.is_empty() {
            return Ok(Flushed::Empty);
        }
        if publisher.is_congested() {
            tracing::debug!(pending = self.buf.len(), "publisher congested, holding outbound data");
            return Ok(Flushed::Congested);
        }

        let len = self.buf.len();
        publisher.queue_packet(self.buf.clone())?;
        self.buf.clear();
        self.handoffs += 1;
        tracing::debug!(len, "handed off outbound packet");
        Ok(Flushed::Sent(len))
    }

    pub fn set_buffering(&mut self, buffering: bool) {
        self.buffering = buffering;
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// Packets handed to the publisher so far.
    pub fn handoffs(&self) -> u64 {
        self.handoffs
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}
