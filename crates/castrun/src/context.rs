//! # Dispatch Context
//!
//! One `Context` per process (or per group membership) owns the registries, the
//! outbound buffer and both transport sessions, all behind a single reentrant lock.
//!
//! ## Locking
//!
//! - The lock is a `parking_lot::ReentrantMutex`: a handler running on the thread
//!   that dispatched it may call back into the context.
//! - State lives in a `RefCell` inside the lock. Borrows are short and never held
//!   across a handler invocation or a readiness wait, so re-entry cannot observe
//!   a borrowed state.
//! - The first operation that needs the transport initializes it while holding
//!   the lock. Initialization happens exactly once.

use std::cell::RefCell;
use std::cell::RefMut;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Instant;

use castwire::CallbackRef;
use castwire::NodeId;
use castwire::StubId;
use castwire::Target;
use parking_lot::ReentrantMutex;
use parking_lot::ReentrantMutexGuard;

use crate::client::Client;
use crate::config::Config;
use crate::error::Error;
use crate::error::Result;
use crate::error::fatal;
use crate::handler::Call;
use crate::handler::HandlerRef;
use crate::mux::Multiplexer;
use crate::mux::Registrar;
use crate::mux::Side;
use crate::outbound::Enqueued;
use crate::outbound::Flushed;
use crate::outbound::OutboundBuffer;
use crate::registry::CallbackTable;
use crate::registry::ClientStubs;
use crate::registry::RemoteNodes;
use crate::registry::ServerFunctions;
use crate::transport::Publisher;
use crate::transport::Subscriber;
use crate::transport::TransportFactory;

/// How a lock acquisition was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    /// The calling thread did not hold the lock before.
    Fresh,
    /// The calling thread already held the lock; granted without blocking.
    Reentered,
}

/// Holds the context lock. Dropping it releases one level of the lock.
pub struct ContextGuard<'a> {
    pub(crate) guard: ReentrantMutexGuard<'a, RefCell<State>>,
    acquired: Acquired,
}

impl ContextGuard<'_> {
    pub fn acquired(&self) -> Acquired {
        self.acquired
    }

    pub(crate) fn state(&self) -> RefMut<'_, State> {
        self.guard.borrow_mut()
    }
}

/// The live transport of an initialized context.
pub(crate) struct Session {
    pub(crate) mux: Arc<Multiplexer>,
    pub(crate) publisher: Box<dyn Publisher>,
    pub(crate) subscriber: Box<dyn Subscriber>,
}

pub(crate) struct State {
    pub(crate) node_id: NodeId,
    pub(crate) servers: ServerFunctions,
    pub(crate) stubs: ClientStubs,
    pub(crate) callbacks: CallbackTable,
    pub(crate) remotes: RemoteNodes,
    pub(crate) outbound: OutboundBuffer,
    pub(crate) client_callback_count: usize,
    pub(crate) announcing: bool,
    pub(crate) session: Option<Session>,
}

impl State {
    fn new(config: &Config) -> Self {
        Self {
            node_id: NodeId(0),
            servers: ServerFunctions::new(config.symtab_size),
            stubs: ClientStubs::new(config.symtab_size),
            callbacks: CallbackTable::new(config.symtab_size),
            remotes: RemoteNodes::new(config.symtab_size),
            outbound: OutboundBuffer::new(config.max_payload),
            client_callback_count: 0,
            announcing: false,
            session: None,
        }
    }

    /// Hands buffered calls to the publisher. Transport failures leave the data
    /// buffered for the next attempt.
    pub(crate) fn flush(&mut self) -> Result<Flushed> {
        let Some(session) = self.session.as_mut() else {
            return Ok(Flushed::Empty);
        };
        self.outbound.flush(session.publisher.as_mut())
    }

    /// Flushes held data when not in buffered mode, logging failures.
    pub(crate) fn flush_pending(&mut self) {
        if self.outbound.is_buffering() || self.outbound.is_empty() {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, pending = self.outbound.len(), "deferred flush failed");
        }
    }
}

/// A node's view of the call group.
pub struct Context {
    config: Config,
    factory: Arc<dyn TransportFactory>,
    inner: ReentrantMutex<RefCell<State>>,
    next_callback_ref: AtomicU64,
    next_stub_id: AtomicU64,
}

impl Context {
    /// Creates an uninitialized context. The transport is opened lazily.
    pub fn new(config: Config, factory: Arc<dyn TransportFactory>) -> Self {
        let state = State::new(&config);
        Self {
            config,
            factory,
            inner: ReentrantMutex::new(RefCell::new(state)),
            next_callback_ref: AtomicU64::new(1),
            next_stub_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ------------------------------------------------------------------
    //  Locking and initialization
    // ------------------------------------------------------------------

    /// Acquires the context lock, waiting as long as it takes.
    pub fn lock(&self) -> ContextGuard<'_> {
        let acquired = self.acquisition();
        let guard = self.inner.lock();
        tracing::trace!(?acquired, "context locked");
        ContextGuard { guard, acquired }
    }

    /// Acquires the context lock unless `deadline` passes first.
    pub fn lock_until(&self, deadline: Instant) -> Result<ContextGuard<'_>> {
        let acquired = self.acquisition();
        match self.inner.try_lock_until(deadline) {
            Some(guard) => {
                tracing::trace!(?acquired, "context locked");
                Ok(ContextGuard { guard, acquired })
            }
            None => {
                tracing::debug!("context lock timed out");
                Err(Error::LockTimeout)
            }
        }
    }

    fn acquisition(&self) -> Acquired {
        if self.inner.is_owned_by_current_thread() { Acquired::Reentered } else { Acquired::Fresh }
    }

    /// Locks and initializes.
    pub(crate) fn lock_ready(&self) -> ContextGuard<'_> {
        let guard = self.lock();
        self.ensure_initialized(&guard);
        guard
    }

    pub(crate) fn ensure_initialized(&self, guard: &ContextGuard<'_>) {
        if guard.state().session.is_none() {
            self.initialize(guard);
        }
    }

    /// Initializes eagerly.
    ///
    /// Fails with `Error::AlreadyInitialized` if any earlier operation (or an
    /// earlier `setup`) already did.
    pub fn setup(&self) -> Result<()> {
        let guard = self.lock();
        if guard.state().session.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        self.initialize(&guard);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().state().session.is_some()
    }

    fn initialize(&self, guard: &ContextGuard<'_>) {
        let mux = Multiplexer::new(self.config.mux, self.config.external_epoll_fd)
            .unwrap_or_else(|e| fatal("multiplexer", e));
        let mux = Arc::new(mux);

        let node_id = self.config.resolve_node_id();
        let settings = self.config.transport_settings();
        let (mut publisher, mut subscriber) = self
            .factory
            .open(
                &settings,
                node_id,
                Registrar::new(Arc::clone(&mux), Side::Publisher),
                Registrar::new(Arc::clone(&mux), Side::Subscriber),
            )
            .unwrap_or_else(|e| fatal("transport", e));

        if let Err(e) = publisher.activate() {
            fatal("publisher", e);
        }
        if let Err(e) = subscriber.activate() {
            fatal("subscriber", e);
        }

        let mut st = guard.state();
        st.node_id = node_id;
        st.session = Some(Session { mux, publisher, subscriber });
        tracing::info!(
            node = %node_id,
            mux = ?self.config.mux,
            sockets = self.socket_count_of(&st),
            "context initialized"
        );
        self.update_announce(&mut st);
    }

    pub(crate) fn socket_count_of(&self, st: &State) -> usize {
        st.session
            .as_ref()
            .map(|s| s.publisher.socket_count() + s.subscriber.socket_count())
            .unwrap_or(0)
    }

    /// This node's id. Initializes the context.
    pub fn node_id(&self) -> NodeId {
        let guard = self.lock_ready();
        guard.state().node_id
    }

    // ------------------------------------------------------------------
    //  Registration
    // ------------------------------------------------------------------

    /// Serves `name` on this node. A later registration of the same name wins.
    pub fn register_server_function<F>(&self, name: &str, f: F) -> Result<()>
    where
        F: Fn(&Context, &Call<'_>) + Send + Sync + 'static,
    {
        self.register_server_handler(name, Arc::new(f))
    }

    pub fn register_server_handler(&self, name: &str, handler: HandlerRef) -> Result<()> {
        validate_name(name)?;
        let guard = self.lock();
        let mut st = guard.state();
        if let Err(e) = st.servers.register(name, handler) {
            fatal("server function table", e);
        }
        tracing::debug!(name, "registered server function");
        Ok(())
    }

    /// Declares that this node calls the remote function `name`.
    pub fn register_client_stub(&self, name: &str) -> Result<StubId> {
        validate_name(name)?;
        let id = StubId(self.next_stub_id.fetch_add(1, Ordering::Relaxed));
        let guard = self.lock();
        let mut st = guard.state();
        if let Err(e) = st.stubs.register(id, name) {
            fatal("client stub table", e);
        }
        tracing::debug!(name, stub = %id, "registered client stub");
        self.update_announce(&mut st);
        Ok(id)
    }

    /// Declares a function that accepts callbacks from remote servers.
    ///
    /// Only counted: a node with callback clients announces itself so that servers
    /// subscribe back to it.
    pub fn declare_callback_client(&self) {
        let guard = self.lock();
        let mut st = guard.state();
        st.client_callback_count += 1;
        self.update_announce(&mut st);
    }

    /// Registers a client stub and returns a handle for calling it.
    pub fn client(self: &Arc<Self>, name: &str) -> Result<Client> {
        let id = self.register_client_stub(name)?;
        Ok(Client::new(Arc::clone(self), name, id))
    }

    // ------------------------------------------------------------------
    //  Callbacks
    // ------------------------------------------------------------------

    /// Activates a one-shot callback and returns its generated reference.
    pub fn activate_callback<F>(&self, f: F) -> CallbackRef
    where
        F: Fn(&Context, &Call<'_>) + Send + Sync + 'static,
    {
        self.activate_callback_handler(Arc::new(f))
    }

    pub fn activate_callback_handler(&self, handler: HandlerRef) -> CallbackRef {
        let guard = self.lock();
        let mut st = guard.state();
        loop {
            let callback_ref = CallbackRef(self.next_callback_ref.fetch_add(1, Ordering::Relaxed));
            match st.callbacks.activate(callback_ref, Arc::clone(&handler)) {
                Ok(()) => {
                    tracing::debug!(callback = %callback_ref, "activated callback");
                    return callback_ref;
                }
                // Taken by `activate_callback_with`; try the next token.
                Err(Error::InvalidArgument(_)) => continue,
                Err(e) => fatal("callback table", e),
            }
        }
    }

    /// Activates a callback under a reference chosen by the caller.
    pub fn activate_callback_with(&self, callback_ref: CallbackRef, handler: HandlerRef) -> Result<()> {
        let guard = self.lock();
        let mut st = guard.state();
        match st.callbacks.activate(callback_ref, handler) {
            Ok(()) => Ok(()),
            Err(e @ Error::InvalidArgument(_)) => Err(e),
            Err(e) => fatal("callback table", e),
        }
    }

    /// Drops a pending callback. Returns false if it was unknown or already consumed.
    pub fn cancel_callback(&self, callback_ref: CallbackRef) -> bool {
        let guard = self.lock();
        let cancelled = guard.state().callbacks.cancel(callback_ref);
        tracing::debug!(callback = %callback_ref, cancelled, "cancel callback");
        cancelled
    }

    /// Drops the pending callback registered with `handler`.
    pub fn cancel_callback_handler(&self, handler: &HandlerRef) -> Option<CallbackRef> {
        let guard = self.lock();
        let cancelled = guard.state().callbacks.take_by_handler(handler);
        tracing::debug!(callback = ?cancelled, "cancel callback by handler");
        cancelled
    }

    /// Number of callbacks waiting to be invoked.
    pub fn live_callbacks(&self) -> usize {
        self.lock().state().callbacks.live()
    }

    // ------------------------------------------------------------------
    //  Remote availability
    // ------------------------------------------------------------------

    /// True once some remote node has announced the function behind `stub`.
    pub fn remote_function_available(&self, stub: StubId) -> bool {
        let guard = self.lock();
        let st = guard.state();
        st.stubs.name_of(stub).is_some_and(|name| st.remotes.serves(name))
    }

    pub fn remote_function_available_by_name(&self, name: &str) -> bool {
        self.lock().state().remotes.serves(name)
    }

    /// Functions `node` has announced, in arrival order.
    pub fn remote_functions_of(&self, node: NodeId) -> Vec<String> {
        let guard = self.lock();
        let st = guard.state();
        st.remotes.functions_of(node).into_iter().map(str::to_owned).collect()
    }

    // ------------------------------------------------------------------
    //  Outbound calls
    // ------------------------------------------------------------------

    /// Enqueues a call to the remote function `name`.
    ///
    /// Returns `Error::Busy` when the outbound buffer is full; process events and retry.
    pub fn queue_call(&self, name: &str, args: &[u8]) -> Result<()> {
        self.enqueue(Target::Function(name), args)
    }

    /// Enqueues an invocation of a callback activated on a remote node.
    pub fn queue_callback(&self, callback_ref: CallbackRef, args: &[u8]) -> Result<()> {
        self.enqueue(Target::Callback(callback_ref), args)
    }

    pub fn enqueue(&self, target: Target<'_>, args: &[u8]) -> Result<()> {
        let guard = self.lock_ready();
        let mut st = guard.state();
        let node_id = st.node_id;

        match st.outbound.enqueue(node_id, target, args) {
            Ok(Enqueued::Held) => Ok(()),
            Ok(Enqueued::Immediate) => {
                st.flush_pending();
                Ok(())
            }
            Err(Error::Busy) => {
                // Make room for the retry if the publisher will take it.
                if let Err(e) = st.flush() {
                    tracing::warn!(error = %e, "flush on full buffer failed");
                }
                Err(Error::Busy)
            }
            Err(e) => Err(e),
        }
    }

    /// Holds enqueued calls until `flush_calls` or `unbuffer_calls`.
    pub fn buffer_calls(&self) {
        self.lock().state().outbound.set_buffering(true);
    }

    /// Hands everything buffered to the publisher as one packet.
    pub fn flush_calls(&self) -> Result<Flushed> {
        let guard = self.lock_ready();
        let mut st = guard.state();
        st.flush()
    }

    /// Leaves buffered mode and flushes.
    pub fn unbuffer_calls(&self) -> Result<Flushed> {
        let guard = self.lock_ready();
        let mut st = guard.state();
        st.outbound.set_buffering(false);
        st.flush()
    }

    pub fn is_buffering(&self) -> bool {
        self.lock().state().outbound.is_buffering()
    }

    /// Bytes enqueued but not yet handed to the publisher.
    pub fn pending_bytes(&self) -> usize {
        self.lock().state().outbound.len()
    }

    /// Packets handed to the publisher so far.
    pub fn handoffs(&self) -> u64 {
        self.lock().state().outbound.handoffs()
    }
}

fn validate_name(name: &str) -> Result<()> {
    Target::Function(name).validate().map_err(|e| Error::InvalidArgument(e.to_string()))
}
