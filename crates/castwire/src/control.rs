//! # Discovery Control Messages
//!
//! Sent over the transport's out-of-band channel to tell a freshly subscribed
//! node which functions the sender serves. One message per function:
//!
//! ```text
//! [node_id: u32][name_len: u8][name: name_len bytes]
//! ```

use crate::cursor::Reader;
use crate::cursor::Writer;
use crate::error::Error;
use crate::error::Result;
use crate::frame::Target;
use crate::types::NodeId;

/// Announces that `node_id` serves the function `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage<'a> {
    pub node_id: NodeId,
    pub name: &'a str,
}

impl<'a> ControlMessage<'a> {
    pub fn new(node_id: NodeId, name: &'a str) -> Self {
        Self { node_id, name }
    }

    /// Encodes the message into a fresh buffer.
    pub fn encode(&self) -> Result<Vec<u8>> {
        // Same naming rules as a call target.
        Target::Function(self.name).validate()?;

        let mut buf = Vec::with_capacity(4 + 1 + self.name.len());
        Writer::new(&mut buf)
            .put_u32(self.node_id.0)
            .put_u8(self.name.len() as u8)
            .put_bytes(self.name.as_bytes());
        Ok(buf)
    }

    /// Decodes a message. Trailing bytes are ignored.
    pub fn decode(bytes: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let node_id = NodeId(r.get_u32()?);
        let len = r.get_u8()? as usize;
        let raw = r.get_bytes(len)?;
        let name = std::str::from_utf8(raw).map_err(|_| Error::InvalidUtf8)?;
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        Ok(Self { node_id, name })
    }
}
