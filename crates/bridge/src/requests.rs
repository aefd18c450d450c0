//! Vendor control requests: configuration readout and register access
//!
//! Every request must move exactly the expected number of bytes. Anything
//! else, including a stall or timeout, is an I/O error; registers are never
//! retried and never get the stream-mode leniency of bulk transfers.

use crate::transport::Link;
use aub_common::{Error, Result};
use aub_protocol::{
    CONFIG_SIZE, DeviceConfig, REGISTER_SIZE, REQUEST_TYPE_IN, REQUEST_TYPE_OUT, Register,
    Request,
};
use byteorder::{ByteOrder, LittleEndian};
use std::time::Duration;
use tracing::{debug, warn};

/// Read the device configuration with `CFG_GET`
pub fn read_config<L: Link>(link: &mut L, timeout: Duration) -> Result<DeviceConfig> {
    let mut buf = [0u8; CONFIG_SIZE];

    let len = link
        .read_control(
            REQUEST_TYPE_IN,
            Request::CfgGet.code(),
            0,
            0,
            &mut buf,
            timeout,
        )
        .map_err(|e| {
            warn!("CFG_GET failed: {}", e);
            Error::Io(format!("CFG_GET failed: {}", e))
        })?;

    if len != CONFIG_SIZE {
        warn!("CFG_GET returned {} bytes, expected {}", len, CONFIG_SIZE);
        return Err(Error::Io(format!(
            "CFG_GET returned {} bytes, expected {}",
            len, CONFIG_SIZE
        )));
    }

    let config = DeviceConfig::decode(&buf).map_err(|e| Error::Io(e.to_string()))?;
    debug!("CFG_GET: {:02x?} -> {:?}", buf, config);
    Ok(config)
}

/// Write a 16-bit register
pub fn write_register<L: Link>(
    link: &mut L,
    register: Register,
    value: u16,
    timeout: Duration,
) -> Result<()> {
    let mut buf = [0u8; REGISTER_SIZE];
    LittleEndian::write_u16(&mut buf, value);

    let len = link
        .write_control(
            REQUEST_TYPE_OUT,
            Request::RegOper.code(),
            register.address(),
            0,
            &buf,
            timeout,
        )
        .map_err(|e| Error::Io(format!("Write of {:?} failed: {}", register, e)))?;

    if len != REGISTER_SIZE {
        return Err(Error::Io(format!(
            "Write of {:?} moved {} bytes, expected {}",
            register, len, REGISTER_SIZE
        )));
    }

    debug!("{:?} <- {:#06x}", register, value);
    Ok(())
}

/// Read a 16-bit register
pub fn read_register<L: Link>(link: &mut L, register: Register, timeout: Duration) -> Result<u16> {
    let mut buf = [0u8; REGISTER_SIZE];

    let len = link
        .read_control(
            REQUEST_TYPE_IN,
            Request::RegOper.code(),
            register.address(),
            0,
            &mut buf,
            timeout,
        )
        .map_err(|e| Error::Io(format!("Read of {:?} failed: {}", register, e)))?;

    if len != REGISTER_SIZE {
        return Err(Error::Io(format!(
            "Read of {:?} moved {} bytes, expected {}",
            register, len, REGISTER_SIZE
        )));
    }

    let value = LittleEndian::read_u16(&buf);
    debug!("{:?} -> {:#06x}", register, value);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockDevice, MockLink, Op};
    use crate::transport::TransportError;
    use aub_protocol::{Mode, Speed};

    const TIMEOUT: Duration = Duration::from_millis(10);

    fn link_for(device: &MockDevice) -> MockLink {
        device.link()
    }

    #[test]
    fn test_read_config() {
        let device = MockDevice::new("SN1").with_config([0x03, 0x00, 0x05, 0x00, 0x03, 0x00]);
        let mut link = link_for(&device);

        let config = read_config(&mut link, TIMEOUT).unwrap();
        assert_eq!(config.mode, Mode::Packet);
        assert_eq!(config.speed, Speed::High);
        assert_eq!(
            device.ops(),
            vec![Op::ControlIn {
                request_type: 0xC0,
                request: 0,
                value: 0,
                index: 0,
                len: 6,
            }]
        );
    }

    #[test]
    fn test_read_config_short_transfer() {
        let device = MockDevice::new("SN1").with_config_reply(Ok(vec![0x03, 0x00, 0x05]));
        let mut link = link_for(&device);

        assert!(matches!(read_config(&mut link, TIMEOUT), Err(Error::Io(_))));
    }

    #[test]
    fn test_read_config_stall() {
        let device = MockDevice::new("SN1")
            .with_config_reply(Err(TransportError::Stall { transferred: 0 }));
        let mut link = link_for(&device);

        assert!(matches!(read_config(&mut link, TIMEOUT), Err(Error::Io(_))));
    }

    #[test]
    fn test_write_register_wire_format() {
        let device = MockDevice::new("SN1");
        let mut link = link_for(&device);

        write_register(&mut link, Register::Tlr, 600, TIMEOUT).unwrap();
        assert_eq!(
            device.ops(),
            vec![Op::ControlOut {
                request_type: 0x40,
                request: 1,
                value: 1,
                index: 0,
                data: vec![0x58, 0x02],
            }]
        );
    }

    #[test]
    fn test_write_register_timeout_is_io() {
        let device = MockDevice::new("SN1").fail_register_writes(TransportError::Timeout {
            transferred: 0,
        });
        let mut link = link_for(&device);

        let err = write_register(&mut link, Register::Rsr, 0, TIMEOUT).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_read_register() {
        let device = MockDevice::new("SN1").with_rsr_values([0x0002]);
        let mut link = link_for(&device);

        assert_eq!(read_register(&mut link, Register::Rsr, TIMEOUT).unwrap(), 2);
        assert_eq!(
            device.ops(),
            vec![Op::ControlIn {
                request_type: 0xC0,
                request: 1,
                value: 2,
                index: 0,
                len: 2,
            }]
        );
    }

    #[test]
    fn test_read_register_failure() {
        let device = MockDevice::new("SN1").fail_register_reads(TransportError::Usb(
            rusb::Error::NoDevice,
        ));
        let mut link = link_for(&device);

        assert!(matches!(
            read_register(&mut link, Register::Rsr, TIMEOUT),
            Err(Error::Io(_))
        ));
    }
}
