//! # Call Frames
//!
//! A delivered payload is a sequence of call frames:
//!
//! ```text
//! [node_id: u32][payload_len: u16][payload: payload_len bytes]
//! ```
//!
//! The payload addresses either a named server function (`name \0 args`) or a
//! previously activated callback (`\0 callback_ref:u64 args`).
//!
//! ## Invariants
//! - **Exact Length**: `payload_len` is always the encoded payload size.
//! - **No Spanning**: A frame never continues into another packet, so a declared
//!   length past the end of the delivered bytes is malformed, not partial.
//! - **Terminal Overruns**: `FrameIter` stops at a header or length overrun; there
//!   is no resynchronization inside a corrupted payload. A bad target inside a
//!   correctly sized frame fails only that frame.

use crate::cursor::Reader;
use crate::cursor::Writer;
use crate::error::Error;
use crate::error::Result;
use crate::types::CallbackRef;
use crate::types::NodeId;

/// Size of the packed `node_id` + `payload_len` header.
pub const HEADER_LEN: usize = 6;

/// Longest function name, excluding the NUL terminator.
pub const MAX_NAME_LEN: usize = 255;

/// Bytes used to address a callback: the empty-name terminator plus the reference.
const CALLBACK_ID_LEN: usize = 1 + 8;

/// What a frame invokes on the receiving side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// A server function registered under this name.
    Function(&'a str),
    /// A one-shot callback activated on the receiver.
    Callback(CallbackRef),
}

impl<'a> Target<'a> {
    /// Checks that the target can be put on the wire.
    pub fn validate(&self) -> Result<()> {
        match self {
            Target::Function(name) => {
                if name.is_empty() {
                    return Err(Error::EmptyName);
                }
                if name.len() > MAX_NAME_LEN {
                    return Err(Error::NameTooLong(name.len()));
                }
                if name.as_bytes().contains(&0) {
                    return Err(Error::NameContainsNul);
                }
                Ok(())
            }
            Target::Callback(r) if r.is_null() => Err(Error::NullCallback),
            Target::Callback(_) => Ok(()),
        }
    }

    /// Bytes the addressing part of the payload occupies.
    fn id_len(&self) -> usize {
        match self {
            Target::Function(name) => name.len() + 1,
            Target::Callback(_) => CALLBACK_ID_LEN,
        }
    }

    /// The function name, or `""` for callback invocations.
    pub fn name(&self) -> &'a str {
        match *self {
            Target::Function(name) => name,
            Target::Callback(_) => "",
        }
    }
}

/// Encodes an outbound call frame.
pub struct CallEncoder<'a> {
    pub node_id: NodeId,
    pub target: Target<'a>,
    pub args: &'a [u8],
}

impl<'a> CallEncoder<'a> {
    pub fn new(node_id: NodeId, target: Target<'a>, args: &'a [u8]) -> Self {
        Self { node_id, target, args }
    }

    /// Total bytes this frame occupies, header included.
    ///
    /// Fails if the target is invalid or the payload overflows the length field.
    pub fn encoded_len(&self) -> Result<usize> {
        self.target.validate()?;
        let payload_len = self.target.id_len() + self.args.len();
        if payload_len > u16::MAX as usize {
            return Err(Error::PayloadTooLarge(payload_len));
        }
        Ok(HEADER_LEN + payload_len)
    }

    /// Appends this frame to `buf` and returns the number of bytes written.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<usize> {
        let total = self.encoded_len()?;
        let payload_len = (total - HEADER_LEN) as u16;

        let mut w = Writer::new(buf);
        w.put_u32(self.node_id.0).put_u16(payload_len);
        match self.target {
            Target::Function(name) => {
                w.put_bytes(name.as_bytes()).put_u8(0);
            }
            Target::Callback(r) => {
                w.put_u8(0).put_callback(r);
            }
        }
        w.put_bytes(self.args);
        Ok(total)
    }
}

/// A decoded inbound call frame, borrowing from the delivered payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub node_id: NodeId,
    pub target: Target<'a>,
    pub args: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Decodes one frame from the reader, consuming exactly the frame's bytes.
    pub fn decode(reader: &mut Reader<'a>) -> Result<Self> {
        if reader.remaining() < HEADER_LEN {
            return Err(Error::HeaderTruncated(reader.remaining()));
        }
        let node_id = NodeId(reader.get_u32()?);
        let declared = reader.get_u16()? as usize;
        if declared > reader.remaining() {
            return Err(Error::FrameTruncated { declared, available: reader.remaining() });
        }

        let mut payload = Reader::new(reader.get_bytes(declared)?);
        let target = match payload.peek_u8()? {
            0 => {
                payload.get_u8()?;
                Target::Callback(payload.get_callback()?)
            }
            _ => Target::Function(payload.get_cstr()?),
        };

        Ok(Frame { node_id, target, args: payload.rest() })
    }

    /// Total bytes this frame occupied on the wire.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.target.id_len() + self.args.len()
    }
}

/// Walks every frame of one delivered payload, in order.
///
/// A frame with a bad target yields `Err` and iteration moves on to the next one.
/// Iteration ends after a header or length overrun, see [`Error::ends_payload`].
pub struct FrameIter<'a> {
    reader: Reader<'a>,
    failed: bool,
}

impl<'a> FrameIter<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { reader: Reader::new(payload), failed: false }
    }

    /// Offset of the next frame within the payload.
    pub fn offset(&self) -> usize {
        self.reader.pos()
    }
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = Result<Frame<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_empty() {
            return None;
        }
        let frame = Frame::decode(&mut self.reader);
        if let Err(e) = &frame {
            self.failed = e.ends_payload();
        }
        Some(frame)
    }
}
