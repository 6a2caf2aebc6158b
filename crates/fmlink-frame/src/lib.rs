//! Length-prefixed framing and event decoding for the tuner protocol.
//!
//! Every frame on the wire is a 1-byte total length (the length byte
//! included) followed by a payload made of tag-prefixed events:
//! - `0x01` volume, one byte
//! - `0x02` channel, two bytes big-endian
//! - `0x05` radio name, length byte + text
//! - `0x06` radio text, length byte + text
//!
//! [`FrameReassembler`] turns an arbitrarily chunked byte stream into
//! complete frames inside a bounded working buffer. [`EventDecoder`] walks one
//! frame's payload. [`Command`] builds the outbound frames.

pub mod codec;
pub mod command;
pub mod error;
pub mod event;
pub mod reassembler;

pub use codec::{decode_frame, encode_frame, Frame, DEFAULT_BUFFER_CAPACITY, MAX_FRAME_LEN};
pub use command::Command;
pub use error::{FrameError, Result};
pub use event::{decode_events, Event, EventDecoder, EventTag, MALFORMED_NOTICE_TAG};
pub use reassembler::FrameReassembler;
