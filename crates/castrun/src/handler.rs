//! # Handlers
//!
//! Server functions and callbacks are both `Handler`s: something invoked with the
//! context and the decoded call. Handlers are shared as `Arc<dyn Handler>` so a
//! registry can hand one out, release its borrow and invoke it, letting the handler
//! re-enter the context freely.

use std::sync::Arc;

use castwire::CallbackRef;
use castwire::NodeId;
use castwire::Reader;

use crate::context::Context;

/// One inbound invocation as seen by a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call<'a> {
    /// The node that sent the frame.
    pub node_id: NodeId,
    /// Function name; empty for callback invocations.
    pub name: &'a str,
    /// `Some` when this invocation fires a callback.
    pub callback_ref: Option<CallbackRef>,
    /// Marshalled arguments, exactly as enqueued by the sender.
    pub args: &'a [u8],
}

impl<'a> Call<'a> {
    /// A cursor over the arguments.
    pub fn reader(&self) -> Reader<'a> {
        Reader::new(self.args)
    }

    pub fn is_callback(&self) -> bool {
        self.callback_ref.is_some()
    }
}

/// Code invoked for inbound calls.
pub trait Handler: Send + Sync + 'static {
    fn invoke(&self, ctx: &Context, call: &Call<'_>);
}

impl<F> Handler for F
where
    F: Fn(&Context, &Call<'_>) + Send + Sync + 'static,
{
    fn invoke(&self, ctx: &Context, call: &Call<'_>) {
        self(ctx, call)
    }
}

pub type HandlerRef = Arc<dyn Handler>;

/// Wraps a closure as a shareable handler.
///
/// Keep the returned reference to cancel a callback by identity later.
pub fn handler<F>(f: F) -> HandlerRef
where
    F: Fn(&Context, &Call<'_>) + Send + Sync + 'static,
{
    Arc::new(f)
}
