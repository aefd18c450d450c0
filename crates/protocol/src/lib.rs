//! Wire protocol of the AXIS USB Bridge
//!
//! This crate describes everything the host and the bridge firmware agree on:
//! the bit-packed configuration structure returned by the `CFG_GET` vendor
//! request, the register map accessed through `REG_OPER`, and the endpoint and
//! identification constants. It performs no I/O.
//!
//! # Example
//!
//! ```
//! use aub_protocol::{Channel, DataWidth, DeviceConfig, Mode, Speed};
//!
//! // IN: 8 bit, OUT: 16 bit, high-speed, packet mode
//! let bytes = [0x03, 0x00, 0x05, 0x00, 0x03, 0x00];
//! let config = DeviceConfig::decode(&bytes).unwrap();
//!
//! assert_eq!(config.channel(Channel::In).width, DataWidth::W8);
//! assert_eq!(config.channel(Channel::Out).width.bytes(), 2);
//! assert_eq!(config.speed, Speed::High);
//! assert_eq!(config.mode, Mode::Packet);
//! assert_eq!(config.encode().unwrap(), bytes);
//! ```

pub mod config;
pub mod error;
pub mod registers;

pub use config::{
    CONFIG_SIZE, Channel, ChannelConfig, DataWidth, DeviceConfig, Endianness, Mode,
    PACKET_SIZE_FS, PACKET_SIZE_HS, Speed,
};
pub use error::{ProtocolError, Result};
pub use registers::{
    BULK_ENDPOINT_IN, BULK_ENDPOINT_OUT, DATA_INTERFACE, PRODUCT_ID, REGISTER_SIZE,
    REQUEST_TYPE_IN, REQUEST_TYPE_OUT, RSR_LAST, RSR_READY, ReceiveStatus, Register, Request,
    TSR_LAST, TSR_READY, VENDOR_ID,
};
