//! Device configuration wire format
//!
//! The bridge reports its configuration as a 6-byte little-endian structure:
//!
//! ```text
//! [IN channel: u16][OUT channel: u16][global: u16]
//!
//! channel word:
//!   bit  0      enabled
//!   bits 1..=2  width code (0 = none, 1 = 8 bit, 2 = 16 bit, 3 = 32 bit)
//!   bit  3      endianness (0 = little, 1 = big)
//!   bit  4      fifo enabled
//!   bit  5      fifo mode (0 = stream, 1 = packet)
//!   bits 6..=10 fifo depth exponent
//!   bits 11..   reserved
//!
//! global word:
//!   bit  0      speed (0 = full-speed, 1 = high-speed)
//!   bit  1      mode (0 = stream, 1 = packet)
//!   bits 2..    reserved
//! ```
//!
//! Decoding works on explicit shifts and masks so the layout does not depend
//! on how the host compiler would pack a bit-field struct.

use crate::error::{ProtocolError, Result};
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// Size of the configuration structure on the wire
pub const CONFIG_SIZE: usize = 6;

/// Maximum bulk packet size at full-speed
pub const PACKET_SIZE_FS: usize = 64;

/// Maximum bulk packet size at high-speed
pub const PACKET_SIZE_HS: usize = 512;

const ENABLED_BIT: u16 = 1 << 0;
const WIDTH_SHIFT: u16 = 1;
const WIDTH_MASK: u16 = 0b11;
const ENDIANNESS_BIT: u16 = 1 << 3;
const FIFO_ENABLED_BIT: u16 = 1 << 4;
const FIFO_MODE_BIT: u16 = 1 << 5;
const FIFO_DEPTH_SHIFT: u16 = 6;
const FIFO_DEPTH_MASK: u16 = 0b1_1111;

const SPEED_BIT: u16 = 1 << 0;
const MODE_BIT: u16 = 1 << 1;

/// Data channel direction
///
/// The discriminant is the channel's position in the configuration structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Device to host
    In = 0,
    /// Host to device
    Out = 1,
}

impl Channel {
    /// Both channels in wire order
    pub const ALL: [Channel; 2] = [Channel::In, Channel::Out];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Element width of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataWidth {
    /// Channel absent
    #[default]
    None,
    /// 8-bit elements
    W8,
    /// 16-bit elements
    W16,
    /// 32-bit elements
    W32,
}

impl DataWidth {
    /// Decode the 2-bit width code
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(DataWidth::None),
            1 => Ok(DataWidth::W8),
            2 => Ok(DataWidth::W16),
            3 => Ok(DataWidth::W32),
            _ => Err(ProtocolError::InvalidWidthCode(code)),
        }
    }

    /// The 2-bit width code
    pub fn code(self) -> u8 {
        match self {
            DataWidth::None => 0,
            DataWidth::W8 => 1,
            DataWidth::W16 => 2,
            DataWidth::W32 => 3,
        }
    }

    /// Bytes per element (0 for an absent channel)
    pub fn bytes(self) -> usize {
        match self {
            DataWidth::None => 0,
            DataWidth::W8 => 1,
            DataWidth::W16 => 2,
            DataWidth::W32 => 4,
        }
    }

    /// Bits per element
    pub fn bits(self) -> u32 {
        8 * self.bytes() as u32
    }
}

/// Byte order of channel elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// Framing mode, used both device-wide and per channel FIFO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    /// End of transfer is inferred from a stall or timeout
    #[default]
    Stream,
    /// Length and completion are signalled through the device registers
    Packet,
}

/// Negotiated bus speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Speed {
    /// Full-speed, 12 Mbps
    #[default]
    Full,
    /// High-speed, 480 Mbps
    High,
}

impl Speed {
    /// Largest bulk chunk at this speed
    pub fn max_packet_size(self) -> usize {
        match self {
            Speed::Full => PACKET_SIZE_FS,
            Speed::High => PACKET_SIZE_HS,
        }
    }
}

/// Configuration of one data channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub enabled: bool,
    pub width: DataWidth,
    pub endianness: Endianness,
    pub fifo_enabled: bool,
    pub fifo_mode: Mode,
    /// FIFO depth as a power-of-two exponent (0..=31)
    pub fifo_depth_exp: u8,
}

impl ChannelConfig {
    /// Decode a channel word. Reserved bits are ignored.
    pub fn from_word(word: u16) -> Self {
        let width_code = ((word >> WIDTH_SHIFT) & WIDTH_MASK) as u8;

        Self {
            enabled: word & ENABLED_BIT != 0,
            // A masked 2-bit code always decodes
            width: DataWidth::from_code(width_code).unwrap_or_default(),
            endianness: if word & ENDIANNESS_BIT != 0 {
                Endianness::Big
            } else {
                Endianness::Little
            },
            fifo_enabled: word & FIFO_ENABLED_BIT != 0,
            fifo_mode: if word & FIFO_MODE_BIT != 0 {
                Mode::Packet
            } else {
                Mode::Stream
            },
            fifo_depth_exp: ((word >> FIFO_DEPTH_SHIFT) & FIFO_DEPTH_MASK) as u8,
        }
    }

    /// Encode into a channel word with reserved bits cleared
    pub fn to_word(&self) -> Result<u16> {
        if u16::from(self.fifo_depth_exp) > FIFO_DEPTH_MASK {
            return Err(ProtocolError::InvalidFifoDepth(self.fifo_depth_exp));
        }

        let mut word = u16::from(self.width.code()) << WIDTH_SHIFT;
        word |= u16::from(self.fifo_depth_exp) << FIFO_DEPTH_SHIFT;
        if self.enabled {
            word |= ENABLED_BIT;
        }
        if self.endianness == Endianness::Big {
            word |= ENDIANNESS_BIT;
        }
        if self.fifo_enabled {
            word |= FIFO_ENABLED_BIT;
        }
        if self.fifo_mode == Mode::Packet {
            word |= FIFO_MODE_BIT;
        }
        Ok(word)
    }

    /// Actual FIFO depth in elements
    pub fn fifo_depth(&self) -> u32 {
        1u32 << (self.fifo_depth_exp & FIFO_DEPTH_MASK as u8)
    }
}

/// Complete device configuration as reported by `CFG_GET`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Channel configuration indexed by [`Channel::index`]
    pub channels: [ChannelConfig; 2],
    pub speed: Speed,
    /// Device-wide framing mode
    pub mode: Mode,
}

impl DeviceConfig {
    /// Decode the configuration from its wire representation
    ///
    /// Only the first [`CONFIG_SIZE`] bytes are looked at.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CONFIG_SIZE {
            return Err(ProtocolError::BufferTooSmall {
                needed: CONFIG_SIZE,
                available: bytes.len(),
            });
        }

        let chan_in = LittleEndian::read_u16(&bytes[0..2]);
        let chan_out = LittleEndian::read_u16(&bytes[2..4]);
        let global = LittleEndian::read_u16(&bytes[4..6]);

        Ok(Self {
            channels: [
                ChannelConfig::from_word(chan_in),
                ChannelConfig::from_word(chan_out),
            ],
            speed: if global & SPEED_BIT != 0 {
                Speed::High
            } else {
                Speed::Full
            },
            mode: if global & MODE_BIT != 0 {
                Mode::Packet
            } else {
                Mode::Stream
            },
        })
    }

    /// Encode the configuration into its wire representation
    pub fn encode(&self) -> Result<[u8; CONFIG_SIZE]> {
        let mut global = 0u16;
        if self.speed == Speed::High {
            global |= SPEED_BIT;
        }
        if self.mode == Mode::Packet {
            global |= MODE_BIT;
        }

        let mut bytes = [0u8; CONFIG_SIZE];
        LittleEndian::write_u16(&mut bytes[0..2], self.channels[0].to_word()?);
        LittleEndian::write_u16(&mut bytes[2..4], self.channels[1].to_word()?);
        LittleEndian::write_u16(&mut bytes[4..6], global);
        Ok(bytes)
    }

    /// Configuration of one channel
    pub fn channel(&self, channel: Channel) -> &ChannelConfig {
        &self.channels[channel.index()]
    }

    /// Mutable configuration of one channel
    pub fn channel_mut(&mut self, channel: Channel) -> &mut ChannelConfig {
        &mut self.channels[channel.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_code_mapping() {
        let expected = [(0, 0), (1, 1), (2, 2), (3, 4)];
        for (code, bytes) in expected {
            assert_eq!(DataWidth::from_code(code).unwrap().bytes(), bytes);
        }
        assert_eq!(
            DataWidth::from_code(4),
            Err(ProtocolError::InvalidWidthCode(4))
        );
    }

    #[test]
    fn test_width_bits() {
        assert_eq!(DataWidth::None.bits(), 0);
        assert_eq!(DataWidth::W16.bits(), 16);
        assert_eq!(DataWidth::W32.bits(), 32);
    }

    #[test]
    fn test_channel_word_fields() {
        // enabled, width 16, big-endian, fifo on, packet fifo, depth 2^10
        let word = 0b1010_1011_1101;
        let chan = ChannelConfig::from_word(word);
        assert!(chan.enabled);
        assert_eq!(chan.width, DataWidth::W16);
        assert_eq!(chan.endianness, Endianness::Big);
        assert!(chan.fifo_enabled);
        assert_eq!(chan.fifo_mode, Mode::Packet);
        assert_eq!(chan.fifo_depth_exp, 10);
        assert_eq!(chan.fifo_depth(), 1024);
    }

    #[test]
    fn test_reserved_bits_ignored() {
        let chan = ChannelConfig::from_word(0xF800);
        assert_eq!(chan, ChannelConfig::default());
    }

    #[test]
    fn test_decode_global_fields() {
        let cfg = DeviceConfig::decode(&[0, 0, 0, 0, 0b11, 0]).unwrap();
        assert_eq!(cfg.speed, Speed::High);
        assert_eq!(cfg.mode, Mode::Packet);
        assert_eq!(cfg.speed.max_packet_size(), 512);

        let cfg = DeviceConfig::decode(&[0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(cfg.speed, Speed::Full);
        assert_eq!(cfg.mode, Mode::Stream);
        assert_eq!(cfg.speed.max_packet_size(), 64);
    }

    #[test]
    fn test_decode_short_buffer() {
        assert_eq!(
            DeviceConfig::decode(&[0; 5]),
            Err(ProtocolError::BufferTooSmall {
                needed: 6,
                available: 5
            })
        );
    }

    #[test]
    fn test_encode_rejects_wide_depth() {
        let mut cfg = DeviceConfig::default();
        cfg.channel_mut(Channel::Out).fifo_depth_exp = 32;
        assert_eq!(cfg.encode(), Err(ProtocolError::InvalidFifoDepth(32)));
    }

    #[test]
    fn test_channel_order() {
        let mut cfg = DeviceConfig::default();
        cfg.channel_mut(Channel::Out).width = DataWidth::W32;
        let bytes = cfg.encode().unwrap();
        assert_eq!(bytes, [0x00, 0x00, 0x06, 0x00, 0x00, 0x00]);
    }
}
