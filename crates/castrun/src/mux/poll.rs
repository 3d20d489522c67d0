//! Descriptor-addressed back end over `poll(2)`.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::Backend;
use super::EventTag;
use super::Interest;
use super::Readiness;
use super::timeout_ms;

pub struct PollBackend {
    table: DashMap<RawFd, (Interest, EventTag)>,
}

impl PollBackend {
    pub fn new() -> Self {
        Self { table: DashMap::new() }
    }

    /// The tag registered for `fd`, if any.
    pub fn tag_of(&self, fd: RawFd) -> Option<EventTag> {
        self.table.get(&fd).map(|entry| entry.1)
    }
}

impl Default for PollBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn events(interest: Interest) -> libc::c_short {
    let mut events = 0;
    if interest.read {
        events |= libc::POLLIN;
    }
    if interest.write {
        events |= libc::POLLOUT;
    }
    events
}

impl Backend for PollBackend {
    fn add(&self, fd: RawFd, tag: EventTag, interest: Interest) -> io::Result<()> {
        match self.table.entry(fd) {
            Entry::Occupied(_) => Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("descriptor {} already in poll set", fd),
            )),
            Entry::Vacant(slot) => {
                slot.insert((interest, tag));
                Ok(())
            }
        }
    }

    fn modify(&self, fd: RawFd, tag: EventTag, interest: Interest) -> io::Result<()> {
        match self.table.get_mut(&fd) {
            Some(mut entry) => {
                *entry = (interest, tag);
                Ok(())
            }
            None => Err(not_found(fd)),
        }
    }

    fn remove(&self, fd: RawFd) -> io::Result<()> {
        self.table.remove(&fd).map(|_| ()).ok_or_else(|| not_found(fd))
    }

    fn wait(&self, timeout: Option<Duration>, out: &mut Vec<Readiness>) -> io::Result<usize> {
        // Snapshot so registration can continue while we block.
        let mut fds: Vec<libc::pollfd> = self
            .table
            .iter()
            .map(|entry| libc::pollfd { fd: *entry.key(), events: events(entry.value().0), revents: 0 })
            .collect();

        let n = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms(timeout)) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }

        for pfd in fds.iter().filter(|p| p.revents != 0) {
            // Removed by the event loop or another thread after the snapshot.
            let Some(tag) = self.tag_of(pfd.fd) else {
                tracing::debug!(fd = pfd.fd, "descriptor left the poll set while waiting");
                continue;
            };
            if pfd.revents & libc::POLLNVAL != 0 {
                tracing::warn!(fd = pfd.fd, side = %tag.side, index = tag.index, "descriptor closed while registered");
            }
            out.push(Readiness {
                tag,
                readable: pfd.revents & libc::POLLIN != 0,
                writable: pfd.revents & libc::POLLOUT != 0,
                hangup: pfd.revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0,
            });
        }
        Ok(n as usize)
    }

    fn len(&self) -> usize {
        self.table.len()
    }
}

fn not_found(fd: RawFd) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("descriptor {} not in poll set", fd))
}
