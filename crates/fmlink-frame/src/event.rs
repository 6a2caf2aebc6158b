//! Tag-prefixed events carried in a frame payload.

use bytes::{BufMut, BytesMut};

use tracing::debug;

use crate::error::{FrameError, Result};

/// Tag of the notice `[0x01, 0x00]` the device sends right before it drops a
/// client whose message it could not parse. Still an unknown event type.
pub const MALFORMED_NOTICE_TAG: u8 = 0x00;

/// Event tags understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventTag {
    /// Volume report or set-volume command, 1 value byte.
    Volume = 0x01,
    /// Channel report or set-channel command, 2 value bytes big-endian.
    Channel = 0x02,
    /// RDS station name, length byte + text.
    RadioName = 0x05,
    /// RDS radio text, length byte + text.
    RadioText = 0x06,
}

impl EventTag {
    /// Logical event name, as used for handler lookup and output.
    pub fn name(self) -> &'static str {
        match self {
            EventTag::Volume => "volume",
            EventTag::Channel => "channel",
            EventTag::RadioName => "radio_name",
            EventTag::RadioText => "radio_text",
        }
    }
}

impl TryFrom<u8> for EventTag {
    type Error = FrameError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0x01 => Ok(EventTag::Volume),
            0x02 => Ok(EventTag::Channel),
            0x05 => Ok(EventTag::RadioName),
            0x06 => Ok(EventTag::RadioText),
            other => Err(FrameError::UnknownEventType(other)),
        }
    }
}

/// One decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Volume(u8),
    Channel(u16),
    RadioName(String),
    RadioText(String),
}

impl Event {
    pub fn tag(&self) -> EventTag {
        match self {
            Event::Volume(_) => EventTag::Volume,
            Event::Channel(_) => EventTag::Channel,
            Event::RadioName(_) => EventTag::RadioName,
            Event::RadioText(_) => EventTag::RadioText,
        }
    }

    /// Append this event in wire form (tag + value) to `dst`.
    ///
    /// Texts longer than 255 bytes cannot be expressed by the length byte.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        let tag = self.tag() as u8;
        match self {
            Event::Volume(value) => {
                dst.put_u8(tag);
                dst.put_u8(*value);
            }
            Event::Channel(value) => {
                dst.put_u8(tag);
                dst.put_u16(*value);
            }
            Event::RadioName(text) | Event::RadioText(text) => {
                let len = u8::try_from(text.len()).map_err(|_| FrameError::PayloadTooLarge {
                    size: text.len(),
                    max: u8::MAX as usize,
                })?;
                dst.put_u8(tag);
                dst.put_u8(len);
                dst.put_slice(text.as_bytes());
            }
        }
        Ok(())
    }
}

/// Walks a frame payload left to right, yielding one event at a time.
///
/// The first error ends the iteration. Events yielded before it stay
/// yielded: callers that act on each event as it comes do not get a rollback.
#[derive(Debug)]
pub struct EventDecoder<'a> {
    payload: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> EventDecoder<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            payload,
            pos: 0,
            failed: false,
        }
    }

    fn take(&mut self, tag: u8, needed: usize) -> Result<&'a [u8]> {
        let available = self.payload.len() - self.pos;
        if available < needed {
            return Err(FrameError::TruncatedEvent {
                tag,
                needed,
                available,
            });
        }
        let bytes = &self.payload[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(bytes)
    }

    fn take_text(&mut self, tag: u8) -> Result<String> {
        let len = usize::from(self.take(tag, 1)?[0]);
        let bytes = self.take(tag, len)?;
        // RDS character sets are not UTF-8; keep whatever decodes.
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn decode_next(&mut self) -> Result<Event> {
        let tag = self.payload[self.pos];
        self.pos += 1;
        if tag == MALFORMED_NOTICE_TAG {
            debug!("device rejected a message as malformed and is disconnecting");
        }

        match EventTag::try_from(tag)? {
            EventTag::Volume => Ok(Event::Volume(self.take(tag, 1)?[0])),
            EventTag::Channel => {
                let bytes = self.take(tag, 2)?;
                Ok(Event::Channel(u16::from_be_bytes([bytes[0], bytes[1]])))
            }
            EventTag::RadioName => Ok(Event::RadioName(self.take_text(tag)?)),
            EventTag::RadioText => Ok(Event::RadioText(self.take_text(tag)?)),
        }
    }
}

impl Iterator for EventDecoder<'_> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.payload.len() {
            return None;
        }
        let result = self.decode_next();
        self.failed = result.is_err();
        Some(result)
    }
}

/// Decode every event in `payload`, handing each to `on_event` immediately.
///
/// Returns the number of events dispatched.
pub fn decode_events<F>(payload: &[u8], mut on_event: F) -> Result<usize>
where
    F: FnMut(Event),
{
    let mut dispatched = 0usize;
    for event in EventDecoder::new(payload) {
        on_event(event?);
        dispatched += 1;
    }
    Ok(dispatched)
}
