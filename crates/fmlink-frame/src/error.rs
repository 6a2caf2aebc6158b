/// Errors that can occur during frame reassembly and event decoding.
///
/// Every variant except [`FrameError::PayloadTooLarge`] leaves the working
/// buffer empty. Processing restarts with the next chunk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Unparsed bytes would reach the working buffer capacity.
    #[error("working buffer overflow ({size} bytes, capacity {capacity})")]
    BufferOverflow { size: usize, capacity: usize },

    /// A frame declared a total length of zero.
    #[error("malformed frame (declared length 0)")]
    ZeroLengthFrame,

    /// An event tag outside the known set.
    #[error("unknown event type 0x{0:02x}")]
    UnknownEventType(u8),

    /// An event runs past the end of its frame payload.
    #[error("truncated event 0x{tag:02x} (needs {needed} bytes, {available} left)")]
    TruncatedEvent {
        tag: u8,
        needed: usize,
        available: usize,
    },

    /// An outbound payload does not fit a single frame.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
