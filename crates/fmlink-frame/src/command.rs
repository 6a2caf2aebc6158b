//! Outbound command frames.
//!
//! Values are masked to the field width, never range-checked: a volume of
//! 300 goes out as 44. The device clamps to what its tuner supports and
//! reports the applied value back.

use bytes::{BufMut, BytesMut};

use crate::event::EventTag;

/// A command the client can send to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetVolume(u8),
    SetChannel(u16),
}

impl Command {
    /// Build a set-volume command, keeping the low 8 bits of `level`.
    pub fn set_volume(level: u32) -> Self {
        Command::SetVolume((level & 0xFF) as u8)
    }

    /// Build a set-channel command, keeping the low 16 bits of `channel`.
    pub fn set_channel(channel: u32) -> Self {
        Command::SetChannel((channel & 0xFFFF) as u16)
    }

    /// Total frame length on the wire.
    pub fn wire_size(&self) -> usize {
        match self {
            Command::SetVolume(_) => 3,
            Command::SetChannel(_) => 4,
        }
    }

    /// Append the complete frame (length byte included) to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_size());
        dst.put_u8(self.wire_size() as u8);
        match self {
            Command::SetVolume(level) => {
                dst.put_u8(EventTag::Volume as u8);
                dst.put_u8(*level);
            }
            Command::SetChannel(channel) => {
                dst.put_u8(EventTag::Channel as u8);
                dst.put_u16(*channel);
            }
        }
    }
}
