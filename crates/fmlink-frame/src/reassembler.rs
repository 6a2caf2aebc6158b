use bytes::BytesMut;
use tracing::{debug, trace};

use crate::codec::{decode_frame, Frame, DEFAULT_BUFFER_CAPACITY};
use crate::error::{FrameError, Result};

/// Rebuilds complete frames from arbitrarily chunked transport reads.
///
/// Bytes are accumulated in a bounded working buffer. Each [`feed`] appends
/// one chunk and hands every frame that became complete to the caller, so a
/// read carrying several frames and a frame spread over several reads both
/// come out the same.
///
/// Any error empties the buffer, including the bytes of later frames that
/// were already received. The protocol has no resynchronization marker.
///
/// [`feed`]: FrameReassembler::feed
#[derive(Debug)]
pub struct FrameReassembler {
    buf: BytesMut,
    capacity: usize,
}

impl FrameReassembler {
    /// Create a reassembler with the protocol's 128-byte working buffer.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// Create a reassembler with an explicit working buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `chunk` and dispatch every complete frame to `on_frame`.
    ///
    /// Returns the number of frames dispatched. Fails with
    /// [`FrameError::BufferOverflow`] when the unparsed bytes would reach the
    /// capacity, and with whatever `on_frame` returns if it rejects a frame.
    /// On failure the working buffer is left empty.
    pub fn feed<F>(&mut self, chunk: &[u8], mut on_frame: F) -> Result<usize>
    where
        F: FnMut(Frame) -> Result<()>,
    {
        let result = self.extend_and_drain(chunk, &mut on_frame);
        if let Err(err) = &result {
            debug!(error = %err, discarded = self.buf.len(), "resetting working buffer");
            self.reset();
        }
        result
    }

    fn extend_and_drain<F>(&mut self, chunk: &[u8], on_frame: &mut F) -> Result<usize>
    where
        F: FnMut(Frame) -> Result<()>,
    {
        let size = self.buf.len() + chunk.len();
        if size >= self.capacity {
            return Err(FrameError::BufferOverflow {
                size,
                capacity: self.capacity,
            });
        }
        self.buf.extend_from_slice(chunk);

        let mut frames = 0usize;
        while let Some(frame) = decode_frame(&mut self.buf, self.capacity)? {
            trace!(size = frame.wire_size(), remaining = self.buf.len(), "frame complete");
            on_frame(frame)?;
            frames += 1;
        }
        Ok(frames)
    }

    /// Discard every buffered byte.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Number of buffered, not yet dispatched bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest chunk the next [`feed`](FrameReassembler::feed) accepts
    /// without overflowing.
    pub fn free_space(&self) -> usize {
        self.capacity.saturating_sub(self.buf.len() + 1)
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}
