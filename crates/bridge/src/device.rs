//! Bridge device record
//!
//! One [`DeviceRecord`] exists per discovered bridge. It caches identity,
//! string descriptors and the last configuration read from the device, and
//! owns the [`Session`] while the device is open.

use crate::session::{Session, TransferParams};
use crate::transport::{DeviceStrings, Transport, UsbIdentity};
use aub_common::{Error, Result};
use aub_protocol::{Channel, ChannelConfig, DeviceConfig, Endianness, Mode, Speed};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Snapshot of one channel's decoded configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub enabled: bool,
    /// Element width in bits (0, 8, 16 or 32)
    pub width: u32,
    pub endianness: Endianness,
    pub fifo_enabled: bool,
    pub fifo_mode: Mode,
    /// FIFO depth in elements
    pub fifo_depth: u32,
}

impl From<&ChannelConfig> for ChannelInfo {
    fn from(chan: &ChannelConfig) -> Self {
        Self {
            enabled: chan.enabled,
            width: chan.width.bits(),
            endianness: chan.endianness,
            fifo_enabled: chan.fifo_enabled,
            fifo_mode: chan.fifo_mode,
            fifo_depth: chan.fifo_depth(),
        }
    }
}

/// Read-only snapshot of a discovered bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Sequence number assigned at discovery
    pub devnum: u32,
    pub busnum: u8,
    pub devaddr: u8,
    pub manufacturer: String,
    pub product: String,
    pub serial: String,
    /// Channel information indexed by [`Channel::index`]
    pub channels: [ChannelInfo; 2],
    pub speed: Speed,
    pub mode: Mode,
}

impl DeviceInfo {
    pub fn channel(&self, channel: Channel) -> &ChannelInfo {
        &self.channels[channel.index()]
    }
}

/// A discovered bridge and, while open, its session
pub struct DeviceRecord<T: Transport> {
    device: T::Device,
    devnum: u32,
    busnum: u8,
    devaddr: u8,
    strings: DeviceStrings,
    config: DeviceConfig,
    session: Option<Session<T::Link>>,
}

impl<T: Transport> DeviceRecord<T> {
    pub(crate) fn new(device: T::Device, devnum: u32, identity: &UsbIdentity) -> Self {
        Self {
            device,
            devnum,
            busnum: identity.bus_number,
            devaddr: identity.address,
            strings: DeviceStrings::default(),
            config: DeviceConfig::default(),
            session: None,
        }
    }

    /// Open the device
    ///
    /// Fails with [`Error::NotReady`] if already open, [`Error::LowLevel`] if
    /// the transport cannot open the device, and [`Error::Io`] if the
    /// configuration cannot be read. The record stays closed on failure.
    pub fn open(&mut self, transport: &T, timeout: Duration) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::NotReady);
        }

        let link = transport.open(&self.device).map_err(|e| {
            warn!("Failed to open device {}: {}", self.devnum, e);
            Error::LowLevel(format!("Failed to open device {}: {}", self.devnum, e))
        })?;

        let (session, config) = Session::establish(link, &mut self.strings, timeout)?;
        self.config = config;
        self.session = Some(session);

        debug!(
            "Opened device {} (bus={}, addr={}, serial={:?})",
            self.devnum, self.busnum, self.devaddr, self.strings.serial
        );
        Ok(())
    }

    /// Close the device. No-op if already closed.
    pub fn close(&mut self) {
        if self.session.take().is_some() {
            debug!("Closed device {}", self.devnum);
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn devnum(&self) -> u32 {
        self.devnum
    }

    pub fn serial(&self) -> &str {
        &self.strings.serial
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Transfer parameters of the open session
    pub fn params(&self) -> Option<&TransferParams> {
        self.session.as_ref().map(|s| s.params())
    }

    /// The open session, or [`Error::NotInitialized`]
    pub fn session_mut(&mut self) -> Result<&mut Session<T::Link>> {
        self.session.as_mut().ok_or(Error::NotInitialized)
    }

    /// Snapshot of identity, strings and decoded configuration
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            devnum: self.devnum,
            busnum: self.busnum,
            devaddr: self.devaddr,
            manufacturer: self.strings.manufacturer.clone(),
            product: self.strings.product.clone(),
            serial: self.strings.serial.clone(),
            channels: [
                ChannelInfo::from(self.config.channel(Channel::In)),
                ChannelInfo::from(self.config.channel(Channel::Out)),
            ],
            speed: self.config.speed,
            mode: self.config.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockDevice, MockTransport, Op};
    use crate::transport::TransportError;

    const TIMEOUT: Duration = Duration::from_millis(10);

    fn record_for(device: &MockDevice) -> (MockTransport, DeviceRecord<MockTransport>) {
        let transport = MockTransport::new(vec![device.clone()]);
        let identity = UsbIdentity {
            vendor_id: 0xFACE,
            product_id: 0x0BDE,
            bus_number: 3,
            address: 7,
        };
        let record = DeviceRecord::new(device.clone(), 0, &identity);
        (transport, record)
    }

    #[test]
    fn test_open_close() {
        let device = MockDevice::new("SN1");
        let (transport, mut record) = record_for(&device);

        assert!(!record.is_open());
        record.open(&transport, TIMEOUT).unwrap();
        assert!(record.is_open());
        assert!(device.is_open());
        assert_eq!(record.serial(), "SN1");

        record.close();
        assert!(!record.is_open());
        assert!(!device.is_open());

        // Closing twice is harmless
        record.close();
        assert_eq!(device.ops().iter().filter(|op| **op == Op::Close).count(), 1);
    }

    #[test]
    fn test_reopen_is_not_ready() {
        let device = MockDevice::new("SN1");
        let (transport, mut record) = record_for(&device);

        record.open(&transport, TIMEOUT).unwrap();
        assert_eq!(record.open(&transport, TIMEOUT), Err(Error::NotReady));
        assert!(record.is_open());
    }

    #[test]
    fn test_open_failure_is_lowlevel() {
        let device = MockDevice::new("SN1").fail_open(TransportError::Usb(rusb::Error::Access));
        let (transport, mut record) = record_for(&device);

        assert!(matches!(
            record.open(&transport, TIMEOUT),
            Err(Error::LowLevel(_))
        ));
        assert!(!record.is_open());
        assert!(record.session_mut().is_err());
    }

    #[test]
    fn test_config_failure_is_io_and_closed() {
        let device = MockDevice::new("SN1").with_config_reply(Ok(vec![0; 4]));
        let (transport, mut record) = record_for(&device);

        assert!(matches!(
            record.open(&transport, TIMEOUT),
            Err(Error::Io(_))
        ));
        assert!(!record.is_open());
        assert!(!device.is_open());
    }

    #[test]
    fn test_info_decodes_widths_and_depths() {
        // IN: 16 bit, depth 2^4; OUT: 32 bit big-endian packet fifo, depth 2^9
        let chan_in: u16 = 0x01 | (2 << 1) | (1 << 4) | (4 << 6);
        let chan_out: u16 = 0x01 | (3 << 1) | (1 << 3) | (1 << 4) | (1 << 5) | (9 << 6);
        let mut raw = [0u8; 6];
        raw[0..2].copy_from_slice(&chan_in.to_le_bytes());
        raw[2..4].copy_from_slice(&chan_out.to_le_bytes());
        raw[4] = 0b01;

        let device = MockDevice::new("SN1").with_config(raw);
        let (transport, mut record) = record_for(&device);
        record.open(&transport, TIMEOUT).unwrap();
        record.close();

        let info = record.info();
        assert_eq!(info.devnum, 0);
        assert_eq!(info.busnum, 3);
        assert_eq!(info.devaddr, 7);
        assert_eq!(info.speed, Speed::High);
        assert_eq!(info.mode, Mode::Stream);

        let chan = info.channel(Channel::In);
        assert_eq!(chan.width, 16);
        assert_eq!(chan.fifo_depth, 16);
        assert_eq!(chan.endianness, Endianness::Little);

        let chan = info.channel(Channel::Out);
        assert_eq!(chan.width, 32);
        assert_eq!(chan.fifo_depth, 512);
        assert_eq!(chan.endianness, Endianness::Big);
        assert_eq!(chan.fifo_mode, Mode::Packet);
    }
}
