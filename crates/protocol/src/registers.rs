//! Vendor requests, register map and endpoint addresses

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};

/// USB vendor ID of the bridge
pub const VENDOR_ID: u16 = 0xFACE;

/// USB product ID of the bridge
pub const PRODUCT_ID: u16 = 0x0BDE;

/// The single data interface
pub const DATA_INTERFACE: u8 = 0;

/// Bulk IN endpoint (device to host)
pub const BULK_ENDPOINT_IN: u8 = 0x81;

/// Bulk OUT endpoint (host to device)
pub const BULK_ENDPOINT_OUT: u8 = 0x01;

/// bmRequestType for vendor requests, device to host
pub const REQUEST_TYPE_IN: u8 = 0xC0;

/// bmRequestType for vendor requests, host to device
pub const REQUEST_TYPE_OUT: u8 = 0x40;

/// Size of a register value on the wire
pub const REGISTER_SIZE: usize = 2;

/// Vendor request codes (bRequest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Request {
    /// Read the configuration structure
    CfgGet = 0,
    /// Read or write a register, addressed through wValue
    RegOper = 1,
}

impl Request {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Device registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    /// Transmit status
    Tsr = 0,
    /// Transmit length, in bytes, of the next packet-mode frame
    Tlr = 1,
    /// Receive status; writing 0 resets receive framing
    Rsr = 2,
}

impl Register {
    pub fn address(self) -> u16 {
        self as u16
    }

    pub fn from_address(address: u16) -> Result<Self> {
        match address {
            0 => Ok(Register::Tsr),
            1 => Ok(Register::Tlr),
            2 => Ok(Register::Rsr),
            _ => Err(ProtocolError::InvalidRegister(address)),
        }
    }
}

/// TSR: transmitter ready
pub const TSR_READY: u16 = 1 << 0;
/// TSR: last packet of the frame sent
pub const TSR_LAST: u16 = 1 << 1;

/// RSR: receiver ready
pub const RSR_READY: u16 = 1 << 0;
/// RSR: last packet of the frame received
pub const RSR_LAST: u16 = 1 << 1;

/// Decoded receive status register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiveStatus(pub u16);

impl ReceiveStatus {
    pub fn is_ready(self) -> bool {
        self.0 & RSR_READY != 0
    }

    /// True once the device has handed over the final packet of a frame
    pub fn is_last(self) -> bool {
        self.0 & RSR_LAST != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_addresses() {
        assert_eq!(Register::Tsr.address(), 0);
        assert_eq!(Register::Tlr.address(), 1);
        assert_eq!(Register::Rsr.address(), 2);

        for reg in [Register::Tsr, Register::Tlr, Register::Rsr] {
            assert_eq!(Register::from_address(reg.address()), Ok(reg));
        }
        assert_eq!(
            Register::from_address(3),
            Err(ProtocolError::InvalidRegister(3))
        );
    }

    #[test]
    fn test_request_codes() {
        assert_eq!(Request::CfgGet.code(), 0);
        assert_eq!(Request::RegOper.code(), 1);
    }

    #[test]
    fn test_receive_status_bits() {
        assert!(!ReceiveStatus(0).is_last());
        assert!(ReceiveStatus(RSR_READY).is_ready());
        assert!(!ReceiveStatus(RSR_READY).is_last());
        assert!(ReceiveStatus(RSR_LAST).is_last());
        assert!(ReceiveStatus(RSR_READY | RSR_LAST).is_last());
    }

    #[test]
    fn test_direction_bits() {
        // Bit 7 = 1 means IN (device to host)
        assert!((REQUEST_TYPE_IN & 0x80) != 0);
        assert!((BULK_ENDPOINT_IN & 0x80) != 0);

        // Bit 7 = 0 means OUT (host to device)
        assert!((REQUEST_TYPE_OUT & 0x80) == 0);
        assert!((BULK_ENDPOINT_OUT & 0x80) == 0);
    }
}
