//! # Call Dispatch
//!
//! Turns delivered payloads into handler invocations.
//!
//! ## Invariants
//! - **Acknowledge First**: A packet is reported dispatched before any of its
//!   frames runs, so a re-entrant event pass never sees it twice.
//! - **In Order**: Frames of one payload run in the order they were enqueued.
//! - **Skip Bad Targets**: A frame whose target cannot be decoded is skipped.
//! - **Stop On Overrun**: A header or length overrun ends the payload; frames
//!   before it have already run.
//! - **Unlocked Handlers**: No state borrow is held while a handler runs.

use castwire::FrameIter;
use castwire::Target;

use crate::context::Context;
use crate::handler::Call;
use crate::handler::HandlerRef;

impl Context {
    /// Dispatches every packet the subscriber has ready.
    pub(crate) fn dispatch_ready(&self) {
        loop {
            let packet = {
                let guard = self.lock();
                let mut st = guard.state();
                let Some(session) = st.session.as_mut() else {
                    return;
                };
                let Some(packet) = session.subscriber.next_dispatch_ready() else {
                    return;
                };
                session.subscriber.packet_dispatched(packet.id);
                packet
            };
            self.dispatch_payload(&packet.payload);
        }
    }

    /// Runs every frame of one payload. Returns the number of handlers invoked.
    pub fn dispatch_payload(&self, payload: &[u8]) -> usize {
        let mut invoked = 0;
        let mut frames = FrameIter::new(payload);

        while let Some(frame) = frames.next() {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) if e.ends_payload() => {
                    tracing::warn!(offset = frames.offset(), len = payload.len(), error = %e, "malformed payload");
                    break;
                }
                Err(e) => {
                    tracing::warn!(offset = frames.offset(), error = %e, "skipping malformed frame");
                    continue;
                }
            };

            let Some(handler) = self.resolve(frame.target) else {
                continue;
            };

            let call = Call {
                node_id: frame.node_id,
                name: frame.target.name(),
                callback_ref: match frame.target {
                    Target::Callback(r) => Some(r),
                    Target::Function(_) => None,
                },
                args: frame.args,
            };
            tracing::debug!(node = %call.node_id, name = call.name, callback = ?call.callback_ref, len = call.args.len(), "dispatching");
            handler.invoke(self, &call);
            invoked += 1;
        }
        invoked
    }

    /// Finds the handler for a frame target, consuming callbacks.
    fn resolve(&self, target: Target<'_>) -> Option<HandlerRef> {
        let guard = self.lock();
        let mut st = guard.state();
        let handler = match target {
            Target::Function(name) => st.servers.find(name),
            Target::Callback(r) => st.callbacks.take_by_ref(r),
        };
        if handler.is_none() {
            tracing::debug!(?target, "no local handler, dropping call");
        }
        handler
    }
}
