use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Size of the length prefix.
pub const LENGTH_SIZE: usize = 1;

/// Largest total frame length a u8 prefix can declare.
pub const MAX_FRAME_LEN: usize = u8::MAX as usize;

/// Working buffer capacity used by the device and the reference client.
pub const DEFAULT_BUFFER_CAPACITY: usize = 128;

/// One complete frame with its length prefix stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The event bytes that followed the length prefix.
    pub payload: Bytes,
}

impl Frame {
    /// The total wire size of this frame (length byte + payload).
    pub fn wire_size(&self) -> usize {
        LENGTH_SIZE + self.payload.len()
    }
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────────────┬──────────────────────────┐
/// │ Length (1B) │ Payload (Length - 1 B)   │
/// │ incl. self  │ tag-prefixed events      │
/// └─────────────┴──────────────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let total = LENGTH_SIZE + payload.len();
    if total > MAX_FRAME_LEN {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_FRAME_LEN - LENGTH_SIZE,
        });
    }
    dst.reserve(total);
    dst.put_u8(total as u8);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one frame from the front of a working buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. A declared length
/// that can never fit in `capacity` bytes is reported as
/// [`FrameError::BufferOverflow`] right away instead of waiting for the
/// buffer to fill up.
pub fn decode_frame(src: &mut BytesMut, capacity: usize) -> Result<Option<Frame>> {
    let Some(&declared) = src.first() else {
        return Ok(None);
    };
    let declared = usize::from(declared);

    if declared == 0 {
        return Err(FrameError::ZeroLengthFrame);
    }
    if declared >= capacity {
        return Err(FrameError::BufferOverflow {
            size: declared,
            capacity,
        });
    }
    if src.len() < declared {
        return Ok(None); // Need more data
    }

    let mut wire = src.split_to(declared);
    wire.advance(LENGTH_SIZE);

    Ok(Some(Frame {
        payload: wire.freeze(),
    }))
}
