//! Index-addressed back end over `epoll(7)`.

use std::io;
use std::os::fd::RawFd;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::Backend;
use super::EventTag;
use super::Interest;
use super::Readiness;
use super::timeout_ms;

/// Results fetched per `epoll_wait` call.
const MAX_EVENTS: usize = 64;

pub struct EpollBackend {
    fd: RawFd,
    /// False when the descriptor belongs to the application.
    owned: bool,
    registered: AtomicUsize,
}

impl EpollBackend {
    pub fn new() -> io::Result<Self> {
        let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd, owned: true, registered: Default::default() })
    }

    /// Registers into an existing epoll descriptor without taking ownership of it.
    pub fn from_raw_fd(fd: RawFd) -> Self {
        Self { fd, owned: false, registered: Default::default() }
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, tag: EventTag, interest: Interest) -> io::Result<()> {
        let mut event = libc::epoll_event { events: flags(interest), u64: tag.encode() as u64 };
        let ret = unsafe { libc::epoll_ctl(self.fd, op, fd, &mut event) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for EpollBackend {
    fn drop(&mut self) {
        if self.owned {
            unsafe { libc::close(self.fd) };
        }
    }
}

fn flags(interest: Interest) -> u32 {
    let mut events = 0;
    if interest.read {
        events |= libc::EPOLLIN as u32;
    }
    if interest.write {
        events |= libc::EPOLLOUT as u32;
    }
    events
}

/// Maps raw `epoll_event.events` bits for an already decoded tag.
pub(crate) fn readiness(tag: EventTag, events: u32) -> Readiness {
    Readiness {
        tag,
        readable: events & libc::EPOLLIN as u32 != 0,
        writable: events & libc::EPOLLOUT as u32 != 0,
        hangup: events & (libc::EPOLLHUP | libc::EPOLLERR) as u32 != 0,
    }
}

impl Backend for EpollBackend {
    fn add(&self, fd: RawFd, tag: EventTag, interest: Interest) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_ADD, fd, tag, interest)?;
        self.registered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn modify(&self, fd: RawFd, tag: EventTag, interest: Interest) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_MOD, fd, tag, interest)
    }

    fn remove(&self, fd: RawFd) -> io::Result<()> {
        let ret = unsafe { libc::epoll_ctl(self.fd, libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut()) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        self.registered.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }

    fn wait(&self, timeout: Option<Duration>, out: &mut Vec<Readiness>) -> io::Result<usize> {
        let mut events = [libc::epoll_event { events: 0, u64: 0 }; MAX_EVENTS];
        let n = unsafe {
            libc::epoll_wait(self.fd, events.as_mut_ptr(), MAX_EVENTS as libc::c_int, timeout_ms(timeout))
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }

        for event in &events[..n as usize] {
            // Copy out of the packed struct before use.
            let data = event.u64;
            let bits = event.events;
            match EventTag::decode(data as u32) {
                Some(tag) => out.push(readiness(tag, bits)),
                None => tracing::debug!(data, "ignoring foreign epoll event"),
            }
        }
        Ok(n as usize)
    }

    fn len(&self) -> usize {
        self.registered.load(Ordering::Relaxed)
    }
}
