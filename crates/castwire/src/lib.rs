//! # Castwire
//!
//! The wire format spoken between nodes of a multicast call group.
//!
//! ## Philosophy
//!
//! - **Zero-Copy Decode**: Frames borrow names and arguments from the delivered payload.
//! - **Bounds Checked**: All field access goes through a `Reader`; nothing indexes raw packets.
//! - **Packed**: No padding, no alignment, no tags. All integers are Little-Endian.
//!
//! ## Format
//!
//! - **Call Frame**: `[node_id: 4b][payload_len: 2b][name \0 | \0 callback_ref: 8b][args]`
//! - **Control**: `[node_id: 4b][name_len: 1b][name]`

pub mod control;
pub mod cursor;
pub mod error;
pub mod frame;
pub mod types;

pub use control::ControlMessage;
pub use cursor::Reader;
pub use cursor::Writer;
pub use error::Error;
pub use error::Result;
pub use frame::CallEncoder;
pub use frame::Frame;
pub use frame::FrameIter;
pub use frame::Target;
pub use frame::HEADER_LEN;
pub use frame::MAX_NAME_LEN;
pub use types::CallbackRef;
pub use types::NodeId;
pub use types::StubId;
