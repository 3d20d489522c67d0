//! # Event Loop
//!
//! Drives both transport sessions from the multiplexer.
//!
//! A single pass waits for readiness with this call's lock level released, then
//! re-acquires, forwards each result to the owning session by connection index,
//! processes whatever events the sessions produced and runs transport timeouts
//! that fell due. `process_events` repeats passes until the caller's deadline,
//! waking early for transport deadlines.

use std::time::Duration;
use std::time::Instant;

use parking_lot::ReentrantMutexGuard;

use crate::context::Context;
use crate::error::Error;
use crate::error::Result;
use crate::error::fatal;
use crate::mux::Readiness;
use crate::mux::Side;
use crate::transport::Progress;
use crate::transport::Session;
use crate::transport::TransportEvent;
use crate::transport::WriteStatus;

impl Context {
    /// Processes events until `timeout` elapses (`None`: forever).
    ///
    /// `Some(Duration::ZERO)` makes one non-blocking pass. Returns `Error::Timeout`
    /// when the last wait expired on the caller's deadline with nothing to do, and
    /// `Ok` when the deadline passed while events were being processed.
    pub fn process_events(&self, timeout: Option<Duration>) -> Result<()> {
        if timeout == Some(Duration::ZERO) {
            return self.process_single_event(timeout);
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                return Ok(());
            }

            let caller = deadline.map(|d| d - now);
            let transport = self.transport_deadline(deadline)?.map(|t| t.saturating_duration_since(now));
            let (wait, on_caller) = match (caller, transport) {
                (None, None) => (None, false),
                (None, Some(t)) => (Some(t), false),
                (Some(c), None) => (Some(c), true),
                (Some(c), Some(t)) if t < c => (Some(t), false),
                (Some(c), Some(_)) => (Some(c), true),
            };
            tracing::trace!(?wait, on_caller, "event pass");

            match self.event_pass(deadline, wait) {
                Ok(()) => {}
                Err(Error::Timeout) if on_caller => return Err(Error::Timeout),
                Err(Error::Timeout) => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Waits once for readiness and processes the results.
    ///
    /// The lock is acquired with the same deadline, so a busy lock yields
    /// `Error::LockTimeout` rather than `Error::Timeout`.
    pub fn process_single_event(&self, timeout: Option<Duration>) -> Result<()> {
        self.event_pass(timeout.map(|t| Instant::now() + t), timeout)
    }

    /// One pass that gives up on the lock at `lock_deadline` and waits at most
    /// `wait` for readiness. A wait shortened for a transport timer keeps the
    /// caller's lock deadline.
    pub(crate) fn event_pass(&self, lock_deadline: Option<Instant>, wait: Option<Duration>) -> Result<()> {
        let mut guard = match lock_deadline {
            Some(d) => self.lock_until(d)?,
            None => self.lock(),
        };
        self.ensure_initialized(&guard);

        let mux = match guard.state().session.as_ref() {
            Some(session) => session.mux.clone(),
            None => return Ok(()),
        };

        let mut ready = Vec::new();
        let waited = ReentrantMutexGuard::unlocked(&mut guard.guard, || mux.wait(wait, &mut ready));
        let woken = match waited {
            Ok(woken) => woken,
            Err(e) => fatal("multiplexer wait", e),
        };

        // Events on descriptors the context does not own still end the wait.
        let timed_out = woken == 0;
        for readiness in ready {
            self.apply_readiness(readiness);
            self.process_transport_events();
        }
        self.run_due_timeouts();
        guard.state().flush_pending();

        if timed_out { Err(Error::Timeout) } else { Ok(()) }
    }

    /// Handles one readiness result taken from an application-owned epoll descriptor.
    pub fn process_readiness(&self, readiness: Readiness) {
        let guard = self.lock_ready();
        self.apply_readiness(readiness);
        self.process_transport_events();
        self.run_due_timeouts();
        guard.state().flush_pending();
    }

    /// Runs transport timeout processing now.
    pub fn process_timeout(&self) -> Result<Progress> {
        let guard = self.lock_ready();
        let progress = {
            let mut st = guard.state();
            let Some(session) = st.session.as_mut() else {
                return Ok(Progress::Done);
            };
            let publisher = session.publisher.process_timeout()?;
            let subscriber = session.subscriber.process_timeout()?;
            if publisher == Progress::Backlogged || subscriber == Progress::Backlogged {
                Progress::Backlogged
            } else {
                Progress::Done
            }
        };
        self.process_transport_events();
        guard.state().flush_pending();
        Ok(progress)
    }

    /// The earliest instant at which either session needs timeout processing.
    pub fn next_timeout(&self) -> Option<Instant> {
        let guard = self.lock_ready();
        let st = guard.state();
        let session = st.session.as_ref()?;
        match (session.publisher.next_timeout(), session.subscriber.next_timeout()) {
            (Some(p), Some(s)) => Some(p.min(s)),
            (p, s) => p.or(s),
        }
    }

    /// Time left until `next_timeout`, zero if already due.
    pub fn timeout_remaining(&self) -> Option<Duration> {
        self.next_timeout().map(|t| t.saturating_duration_since(Instant::now()))
    }

    /// Descriptors open across both sessions.
    pub fn socket_count(&self) -> usize {
        let guard = self.lock_ready();
        let st = guard.state();
        self.socket_count_of(&st)
    }

    /// `next_timeout`, giving up on the lock at the caller's deadline.
    fn transport_deadline(&self, deadline: Option<Instant>) -> Result<Option<Instant>> {
        let guard = match deadline {
            Some(d) => self.lock_until(d)?,
            None => self.lock(),
        };
        self.ensure_initialized(&guard);
        Ok(self.next_timeout())
    }

    fn run_due_timeouts(&self) {
        if self.next_timeout().is_some_and(|t| t <= Instant::now()) {
            match self.process_timeout() {
                Ok(Progress::Done) => {}
                Ok(Progress::Backlogged) => tracing::debug!("transport timeout processing backlogged"),
                Err(e) => tracing::warn!(error = %e, "transport timeout processing failed"),
            }
        }
    }

    fn apply_readiness(&self, readiness: Readiness) {
        let guard = self.lock();
        let mut st = guard.state();
        let Some(session) = st.session.as_mut() else {
            return;
        };

        let tag = readiness.tag;
        tracing::debug!(
            side = %tag.side,
            index = tag.index,
            read = readiness.readable,
            write = readiness.writable,
            hangup = readiness.hangup,
            "readiness"
        );

        match tag.side {
            Side::Publisher => forward(&mut *session.publisher, readiness),
            Side::Subscriber => forward(&mut *session.subscriber, readiness),
        }
    }

    /// Acts on everything the sessions queued, until both queues are empty.
    pub(crate) fn process_transport_events(&self) {
        loop {
            let events = {
                let guard = self.lock();
                let mut st = guard.state();
                let Some(session) = st.session.as_mut() else {
                    return;
                };
                let mut events = session.subscriber.take_events();
                events.extend(session.publisher.take_events());
                events
            };
            if events.is_empty() {
                return;
            }

            for event in events {
                match event {
                    TransportEvent::SubscriptionComplete { node } => self.on_subscription_complete(node),
                    TransportEvent::SubscriberDisconnect { node } => self.on_subscriber_disconnect(node),
                    TransportEvent::ControlMessage { payload } => self.on_control_message(&payload),
                    TransportEvent::PacketsReady => self.dispatch_ready(),
                }
            }
        }
    }
}

/// Forwards one readiness result to the session that owns the descriptor.
fn forward<S: Session + ?Sized>(session: &mut S, readiness: Readiness) {
    let tag = readiness.tag;

    // A hangup is surfaced as a read so the session observes the close.
    if readiness.readable || readiness.hangup {
        if let Err(e) = session.read(tag.index) {
            tracing::info!(side = %tag.side, index = tag.index, error = %e, "read failed");
        }
    }
    if readiness.writable {
        match session.write(tag.index) {
            Ok(WriteStatus::Written) | Ok(WriteStatus::NoData) => {}
            Err(e) => {
                tracing::info!(side = %tag.side, index = tag.index, error = %e, "write failed, closing connection");
                session.close_connection(tag.index);
            }
        }
    }
}
