//! # Castrun
//!
//! Function calls over a reliable multicast group. Any node can call a function
//! served by any other node by name, and servers reply by invoking one-shot
//! callbacks the caller activated.
//!
//! ## Architecture
//!
//! - **Context**: Registries, outbound buffer and transport sessions behind one
//!   reentrant lock (`context`).
//! - **Event Loop**: Epoll or poll multiplexing over the transport's descriptors
//!   (`mux`, `events`).
//! - **Discovery**: Control messages tell callers which node serves what (`discovery`).
//! - **Dispatch**: Delivered payloads become handler invocations (`dispatch`).
//! - **Transport**: Consumed through traits (`transport`); `loopback` runs a group
//!   inside one process.

pub mod client;
pub mod config;
pub mod context;
mod discovery;
mod dispatch;
pub mod error;
mod events;
pub mod handler;
pub mod logging;
pub mod loopback;
pub mod mux;
pub mod outbound;
pub mod registry;
pub mod transport;

pub use castwire::CallbackRef;
pub use castwire::NodeId;
pub use castwire::Reader;
pub use castwire::StubId;
pub use castwire::Target;
pub use castwire::Writer;
pub use client::Client;
pub use config::Config;
pub use context::Acquired;
pub use context::Context;
pub use error::Error;
pub use error::Result;
pub use handler::Call;
pub use handler::Handler;
pub use handler::HandlerRef;
pub use handler::handler;
pub use loopback::LoopbackGroup;
pub use mux::MuxKind;

#[cfg(test)]
mod tests;
