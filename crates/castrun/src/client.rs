//! # Client Stubs
//!
//! A `Client` names one remote function this node calls. Creating one declares
//! the stub to the context, which is what makes the node announce itself so
//! servers subscribe back to it.

use std::sync::Arc;

use castwire::CallbackRef;
use castwire::StubId;
use castwire::Writer;

use crate::context::Context;
use crate::error::Result;
use crate::handler::Call;

/// Handle for calling a remote function by name.
#[derive(Clone)]
pub struct Client {
    ctx: Arc<Context>,
    name: String,
    id: StubId,
}

impl Client {
    pub(crate) fn new(ctx: Arc<Context>, name: &str, id: StubId) -> Self {
        Self { ctx, name: name.to_owned(), id }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> StubId {
        self.id
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// True once at least one remote node has announced this function.
    pub fn is_available(&self) -> bool {
        self.ctx.remote_function_available(self.id)
    }

    /// Enqueues a call with pre-marshalled arguments.
    pub fn call(&self, args: &[u8]) -> Result<()> {
        self.ctx.queue_call(&self.name, args)
    }

    /// Enqueues a call whose last argument is a freshly activated callback.
    ///
    /// `marshal` writes the leading arguments; the callback reference is appended
    /// after them. If the call cannot be enqueued the callback is cancelled again.
    pub fn call_with_callback<M, F>(&self, marshal: M, on_reply: F) -> Result<CallbackRef>
    where
        M: FnOnce(&mut Writer<'_>),
        F: Fn(&Context, &Call<'_>) + Send + Sync + 'static,
    {
        let callback_ref = self.ctx.activate_callback(on_reply);

        let mut args = Vec::new();
        let mut w = Writer::new(&mut args);
        marshal(&mut w);
        w.put_callback(callback_ref);

        if let Err(e) = self.ctx.queue_call(&self.name, &args) {
            self.ctx.cancel_callback(callback_ref);
            return Err(e);
        }
        Ok(callback_ref)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("name", &self.name).field("id", &self.id).finish()
    }
}
