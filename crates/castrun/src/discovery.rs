//! # Remote Discovery
//!
//! Nodes learn who serves what through control messages:
//!
//! 1. A node with client stubs (or callback clients) announces its publisher.
//! 2. Servers subscribe to it. When a subscription completes, the server sends one
//!    control message per function it serves over the subscription's control channel.
//! 3. The client records each `(node, function)` pair, making the function available.
//! 4. When a subscriber disconnects, every function of that node is forgotten.

use castwire::ControlMessage;
use castwire::NodeId;

use crate::context::Context;
use crate::context::State;
use crate::error::fatal;
use crate::registry::Registered;

impl Context {
    /// Announces our server functions to a node whose publisher we just subscribed to.
    pub(crate) fn on_subscription_complete(&self, node: NodeId) {
        let guard = self.lock();
        let mut st = guard.state();
        let st = &mut *st;
        let Some(session) = st.session.as_mut() else {
            return;
        };

        let names = st.servers.names();
        tracing::info!(remote = %node, functions = names.len(), "subscription complete, announcing functions");

        for name in &names {
            let bytes = match ControlMessage::new(st.node_id, name).encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(name = name.as_str(), error = %e, "cannot encode control message");
                    continue;
                }
            };
            if let Err(e) = session.subscriber.write_control_message(node, &bytes) {
                tracing::warn!(remote = %node, name = name.as_str(), error = %e, "failed to send control message");
            }
        }
    }

    /// Records a function announced by a remote node.
    pub(crate) fn on_control_message(&self, payload: &[u8]) {
        let msg = match ControlMessage::decode(payload) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(len = payload.len(), error = %e, "dropping malformed control message");
                return;
            }
        };

        let guard = self.lock();
        let mut st = guard.state();
        match st.remotes.register(msg.node_id, msg.name) {
            Ok(Registered::New) => {
                tracing::info!(remote = %msg.node_id, name = msg.name, "remote function now available");
            }
            Ok(Registered::Duplicate) => {
                tracing::warn!(remote = %msg.node_id, name = msg.name, "remote function already registered");
            }
            Err(e) => fatal("remote node table", e),
        }
    }

    /// Forgets every function served by a node that went away.
    pub(crate) fn on_subscriber_disconnect(&self, node: NodeId) {
        let guard = self.lock();
        let purged = guard.state().remotes.unregister_node(node);
        tracing::info!(remote = %node, purged, "remote node disconnected");
    }

    /// Starts announcing once the node has anything to call.
    pub(crate) fn update_announce(&self, st: &mut State) {
        if st.announcing {
            return;
        }
        let Some(session) = st.session.as_mut() else {
            return;
        };

        let stubs = st.stubs.len();
        let callbacks = st.client_callback_count;
        if stubs > 0 || callbacks > 0 {
            tracing::info!(stubs, callbacks, "client functions declared, sending announces");
            session.publisher.set_announce_interval(Some(self.config().announce_interval));
            st.announcing = true;
        } else {
            tracing::info!("no client functions declared, not announcing");
        }
    }
}
