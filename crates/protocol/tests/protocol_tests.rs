//! Integration tests for the configuration wire format and register map
//!
//! Run with: `cargo test -p aub-protocol --test protocol_tests`

use aub_protocol::{
    CONFIG_SIZE, Channel, ChannelConfig, DataWidth, DeviceConfig, Endianness, Mode,
    ProtocolError, ReceiveStatus, Register, Speed,
};
use proptest::prelude::*;

fn make_channel(width: DataWidth, depth_exp: u8) -> ChannelConfig {
    ChannelConfig {
        enabled: width != DataWidth::None,
        width,
        endianness: Endianness::Little,
        fifo_enabled: true,
        fifo_mode: Mode::Stream,
        fifo_depth_exp: depth_exp,
    }
}

mod decode {
    use super::*;

    #[test]
    fn test_all_zero_config() {
        let cfg = DeviceConfig::decode(&[0; CONFIG_SIZE]).unwrap();

        for channel in Channel::ALL {
            let chan = cfg.channel(channel);
            assert!(!chan.enabled);
            assert_eq!(chan.width, DataWidth::None);
            assert_eq!(chan.width.bytes(), 0);
            assert_eq!(chan.fifo_depth(), 1);
        }
        assert_eq!(cfg.speed, Speed::Full);
        assert_eq!(cfg.mode, Mode::Stream);
    }

    #[test]
    fn test_every_width_code() {
        let expected = [
            (0u16, DataWidth::None, 0usize),
            (1, DataWidth::W8, 1),
            (2, DataWidth::W16, 2),
            (3, DataWidth::W32, 4),
        ];

        for (code, width, bytes) in expected {
            let word = (code << 1) | 1;
            let raw = [0, 0, word as u8, (word >> 8) as u8, 0, 0];
            let cfg = DeviceConfig::decode(&raw).unwrap();
            assert_eq!(cfg.channel(Channel::Out).width, width);
            assert_eq!(cfg.channel(Channel::Out).width.bytes(), bytes);
            assert_eq!(cfg.channel(Channel::In).width, DataWidth::None);
        }
    }

    #[test]
    fn test_every_depth_exponent() {
        for exp in 0u16..=31 {
            let word = exp << 6;
            let raw = [word as u8, (word >> 8) as u8, 0, 0, 0, 0];
            let cfg = DeviceConfig::decode(&raw).unwrap();
            assert_eq!(cfg.channel(Channel::In).fifo_depth_exp, exp as u8);
            assert_eq!(cfg.channel(Channel::In).fifo_depth(), 1u32 << exp);
        }
    }

    #[test]
    fn test_extra_bytes_ignored() {
        let raw = [0x03, 0x00, 0x05, 0x00, 0x01, 0x00, 0xFF, 0xFF];
        let cfg = DeviceConfig::decode(&raw).unwrap();
        assert_eq!(cfg.channel(Channel::In).width, DataWidth::W8);
        assert_eq!(cfg.channel(Channel::Out).width, DataWidth::W16);
        assert_eq!(cfg.speed, Speed::High);
    }

    #[test]
    fn test_short_buffers_rejected() {
        for len in 0..CONFIG_SIZE {
            let raw = vec![0u8; len];
            assert_eq!(
                DeviceConfig::decode(&raw),
                Err(ProtocolError::BufferTooSmall {
                    needed: CONFIG_SIZE,
                    available: len,
                })
            );
        }
    }
}

mod encode {
    use super::*;

    #[test]
    fn test_packet_high_speed_encoding() {
        let cfg = DeviceConfig {
            channels: [make_channel(DataWidth::W8, 9), make_channel(DataWidth::W16, 12)],
            speed: Speed::High,
            mode: Mode::Packet,
        };

        let bytes = cfg.encode().unwrap();
        assert_eq!(bytes[4], 0b11);
        assert_eq!(DeviceConfig::decode(&bytes).unwrap(), cfg);
    }

    #[test]
    fn test_register_map_roundtrip() {
        for address in 0..3 {
            let reg = Register::from_address(address).unwrap();
            assert_eq!(reg.address(), address);
        }
    }

    #[test]
    fn test_receive_status_last_bit() {
        assert!(ReceiveStatus(0b10).is_last());
        assert!(!ReceiveStatus(0b01).is_last());
    }
}

/// Property-based tests using proptest
mod proptests {
    use super::*;

    fn arb_width() -> impl Strategy<Value = DataWidth> {
        prop_oneof![
            Just(DataWidth::None),
            Just(DataWidth::W8),
            Just(DataWidth::W16),
            Just(DataWidth::W32),
        ]
    }

    fn arb_mode() -> impl Strategy<Value = Mode> {
        prop_oneof![Just(Mode::Stream), Just(Mode::Packet)]
    }

    prop_compose! {
        fn arb_channel()(
            enabled in any::<bool>(),
            width in arb_width(),
            big_endian in any::<bool>(),
            fifo_enabled in any::<bool>(),
            fifo_mode in arb_mode(),
            fifo_depth_exp in 0u8..=31,
        ) -> ChannelConfig {
            ChannelConfig {
                enabled,
                width,
                endianness: if big_endian { Endianness::Big } else { Endianness::Little },
                fifo_enabled,
                fifo_mode,
                fifo_depth_exp,
            }
        }
    }

    proptest! {
        #[test]
        fn encode_then_decode_is_identity(
            chan_in in arb_channel(),
            chan_out in arb_channel(),
            high_speed in any::<bool>(),
            mode in arb_mode(),
        ) {
            let cfg = DeviceConfig {
                channels: [chan_in, chan_out],
                speed: if high_speed { Speed::High } else { Speed::Full },
                mode,
            };
            let bytes = cfg.encode().unwrap();
            prop_assert_eq!(DeviceConfig::decode(&bytes).unwrap(), cfg);
        }

        #[test]
        fn decode_then_encode_clears_only_reserved_bits(raw in any::<[u8; CONFIG_SIZE]>()) {
            let cfg = DeviceConfig::decode(&raw).unwrap();
            let bytes = cfg.encode().unwrap();

            // Reserved: bits 11..16 of each channel word, bits 2..16 of the global word
            let mask: [u8; CONFIG_SIZE] = [0xFF, 0x07, 0xFF, 0x07, 0x03, 0x00];
            for i in 0..CONFIG_SIZE {
                prop_assert_eq!(bytes[i], raw[i] & mask[i]);
            }
        }

        #[test]
        fn width_multiplier_matches_code(code in 0u8..4) {
            let width = DataWidth::from_code(code).unwrap();
            let expected = [0usize, 1, 2, 4][code as usize];
            prop_assert_eq!(width.bytes(), expected);
            prop_assert_eq!(width.code(), code);
        }

        #[test]
        fn fifo_depth_is_power_of_two(exp in 0u8..=31) {
            let chan = ChannelConfig { fifo_depth_exp: exp, ..ChannelConfig::default() };
            prop_assert_eq!(chan.fifo_depth(), 1u32 << exp);
            prop_assert!(chan.fifo_depth().is_power_of_two());
        }
    }
}
