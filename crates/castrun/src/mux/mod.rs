//! # Event Multiplexer
//!
//! Waits for readiness on every descriptor the transport sessions register, under
//! one of two back ends:
//!
//! - **Epoll** (Linux): the kernel stores each descriptor's `EventTag` and hands it
//!   back with the event, so results are addressed by connection index directly.
//! - **Poll** (any unix): a side table maps descriptors to tags; each wait snapshots
//!   it into a `pollfd` array.
//!
//! ## Tag Layout
//!
//! ```text
//! bit 31      bit 15          bits 0..15
//! [EVENT_FLAG][PUBLISHER_FLAG][connection index]
//! ```
//!
//! `EVENT_FLAG` marks events owned by a context. An application sharing its own
//! epoll descriptor forwards every event; those without the flag are its own.

#[cfg(any(target_os = "linux", target_os = "android"))]
pub mod epoll;
pub mod poll;

use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::Duration;

use crate::error::fatal;

pub const EVENT_FLAG: u32 = 0x8000_0000;
pub const PUBLISHER_FLAG: u32 = 0x8000;
pub const INDEX_MASK: u32 = 0x7fff;

/// Which transport session owns a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Publisher,
    Subscriber,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Publisher => write!(f, "pub"),
            Self::Subscriber => write!(f, "sub"),
        }
    }
}

/// Identifies a registered descriptor by session and connection index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventTag {
    pub index: u16,
    pub side: Side,
}

impl EventTag {
    pub fn new(index: u16, side: Side) -> Self {
        Self { index, side }
    }

    pub fn encode(&self) -> u32 {
        let side = match self.side {
            Side::Publisher => PUBLISHER_FLAG,
            Side::Subscriber => 0,
        };
        EVENT_FLAG | side | (self.index as u32 & INDEX_MASK)
    }

    /// `None` for values this library did not produce.
    pub fn decode(value: u32) -> Option<Self> {
        if value & EVENT_FLAG == 0 {
            return None;
        }
        let side = if value & PUBLISHER_FLAG != 0 { Side::Publisher } else { Side::Subscriber };
        Some(Self { index: (value & INDEX_MASK) as u16, side })
    }
}

/// Which directions a descriptor is watched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interest {
    pub read: bool,
    pub write: bool,
}

impl Interest {
    pub const NONE: Self = Self { read: false, write: false };
    pub const READ: Self = Self { read: true, write: false };
    pub const WRITE: Self = Self { read: false, write: true };
    pub const BOTH: Self = Self { read: true, write: true };
}

/// One readiness result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub tag: EventTag,
    pub readable: bool,
    pub writable: bool,
    pub hangup: bool,
}

impl Readiness {
    /// Translates a raw epoll result taken from an application-owned descriptor.
    ///
    /// Returns `None` for events that do not belong to a context.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn from_epoll(data: u64, events: u32) -> Option<Self> {
        let tag = EventTag::decode(data as u32)?;
        Some(epoll::readiness(tag, events))
    }
}

/// The selected back end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxKind {
    Epoll,
    Poll,
}

impl Default for MuxKind {
    fn default() -> Self {
        if cfg!(all(any(target_os = "linux", target_os = "android"), not(feature = "poll"))) {
            Self::Epoll
        } else {
            Self::Poll
        }
    }
}

/// A readiness back end.
///
/// All methods take `&self`: registration happens from inside transport calls
/// while another thread may be blocked in `wait`.
pub trait Backend: Send + Sync {
    fn add(&self, fd: RawFd, tag: EventTag, interest: Interest) -> io::Result<()>;
    fn modify(&self, fd: RawFd, tag: EventTag, interest: Interest) -> io::Result<()>;
    fn remove(&self, fd: RawFd) -> io::Result<()>;

    /// Blocks until readiness or `timeout` (`None` waits forever). Appends results to `out`.
    ///
    /// Returns how many events woke the wait, counting those on descriptors that
    /// produced no `Readiness`. Zero means the timeout expired.
    fn wait(&self, timeout: Option<Duration>, out: &mut Vec<Readiness>) -> io::Result<usize>;

    /// Descriptors currently registered.
    fn len(&self) -> usize;
}

/// Shared front end over the selected back end.
pub struct Multiplexer {
    kind: MuxKind,
    backend: Box<dyn Backend>,
    interests: dashmap::DashMap<RawFd, Interest>,
}

impl Multiplexer {
    /// Creates the back end `kind`, wrapping `external_epoll_fd` when given.
    pub fn new(kind: MuxKind, external_epoll_fd: Option<RawFd>) -> io::Result<Self> {
        let backend: Box<dyn Backend> = match kind {
            #[cfg(any(target_os = "linux", target_os = "android"))]
            MuxKind::Epoll => match external_epoll_fd {
                Some(fd) => Box::new(epoll::EpollBackend::from_raw_fd(fd)),
                None => Box::new(epoll::EpollBackend::new()?),
            },
            #[cfg(not(any(target_os = "linux", target_os = "android")))]
            MuxKind::Epoll => {
                let _ = external_epoll_fd;
                return Err(io::Error::new(io::ErrorKind::Unsupported, "epoll is not available"));
            }
            MuxKind::Poll => Box::new(poll::PollBackend::new()),
        };
        Ok(Self { kind, backend, interests: dashmap::DashMap::new() })
    }

    pub fn kind(&self) -> MuxKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&self, fd: RawFd, tag: EventTag, interest: Interest) -> io::Result<()> {
        self.backend.add(fd, tag, interest)?;
        self.interests.insert(fd, interest);
        tracing::debug!(fd, side = %tag.side, index = tag.index, ?interest, "registered descriptor");
        Ok(())
    }

    /// Changes the watched directions. A no-op when `interest` is unchanged.
    pub fn modify(&self, fd: RawFd, tag: EventTag, interest: Interest) -> io::Result<()> {
        if self.interests.get(&fd).is_some_and(|current| *current == interest) {
            return Ok(());
        }
        self.backend.modify(fd, tag, interest)?;
        self.interests.insert(fd, interest);
        tracing::debug!(fd, side = %tag.side, index = tag.index, ?interest, "modified descriptor");
        Ok(())
    }

    pub fn remove(&self, fd: RawFd) -> io::Result<()> {
        self.interests.remove(&fd);
        self.backend.remove(fd)?;
        tracing::debug!(fd, "removed descriptor");
        Ok(())
    }

    /// Waits for readiness, retrying when interrupted by a signal.
    pub fn wait(&self, timeout: Option<Duration>, out: &mut Vec<Readiness>) -> io::Result<usize> {
        loop {
            match self.backend.wait(timeout, out) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }
}

/// A transport session's handle for registering its descriptors.
///
/// Failing to add or modify a descriptor leaves the event loop blind to it, so
/// both are fatal.
#[derive(Clone)]
pub struct Registrar {
    mux: Arc<Multiplexer>,
    side: Side,
}

impl Registrar {
    pub fn new(mux: Arc<Multiplexer>, side: Side) -> Self {
        Self { mux, side }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn add(&self, fd: RawFd, index: u16, interest: Interest) {
        if let Err(e) = self.mux.add(fd, EventTag::new(index, self.side), interest) {
            fatal("multiplexer add", format_args!("{} fd {} index {}: {}", self.side, fd, index, e));
        }
    }

    pub fn modify(&self, fd: RawFd, index: u16, interest: Interest) {
        if let Err(e) = self.mux.modify(fd, EventTag::new(index, self.side), interest) {
            fatal("multiplexer modify", format_args!("{} fd {} index {}: {}", self.side, fd, index, e));
        }
    }

    /// Unregisters `fd`. The poll side table must know the descriptor; epoll only warns.
    pub fn remove(&self, fd: RawFd, index: u16) {
        let Err(e) = self.mux.remove(fd) else {
            return;
        };
        match self.mux.kind() {
            MuxKind::Poll => fatal("multiplexer remove", format_args!("{} fd {} index {}: {}", self.side, fd, index, e)),
            MuxKind::Epoll => tracing::warn!(side = %self.side, fd, index, error = %e, "failed to remove descriptor"),
        }
    }
}

/// Converts a wait timeout to whole milliseconds, rounding up so a short
/// deadline never turns into a busy spin.
pub(crate) fn timeout_ms(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(d) => {
            let mut ms = d.as_millis();
            if d.subsec_nanos() % 1_000_000 != 0 {
                ms += 1;
            }
            ms.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}
