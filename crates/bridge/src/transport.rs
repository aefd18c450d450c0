//! USB transport seam
//!
//! The bridge protocol only needs a handful of USB primitives: listing
//! devices, reading identification data, opening a device, and issuing
//! control and bulk transfers with a timeout. [`Transport`] and [`Link`]
//! capture exactly that, so the protocol code can run against libusb
//! ([`RusbTransport`]) or against the scripted mock in
//! [`crate::test_utils`].

use rusb::{Context, Device, DeviceHandle, UsbContext};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Transport-level failure of a single USB operation
///
/// Stall and timeout keep the number of bytes that made it across before
/// the transfer ended, because the stream-mode framing counts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Transfer timed out after {transferred} bytes")]
    Timeout { transferred: usize },

    #[error("Endpoint stalled after {transferred} bytes")]
    Stall { transferred: usize },

    #[error("USB error: {0}")]
    Usb(rusb::Error),
}

impl TransportError {
    /// Stall or timeout, the two conditions stream mode treats as end of transfer
    pub fn is_end_of_transfer(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout { .. } | TransportError::Stall { .. }
        )
    }

    /// Bytes moved before the failure
    pub fn transferred(&self) -> usize {
        match self {
            TransportError::Timeout { transferred } | TransportError::Stall { transferred } => {
                *transferred
            }
            TransportError::Usb(_) => 0,
        }
    }
}

impl From<rusb::Error> for TransportError {
    fn from(err: rusb::Error) -> Self {
        match err {
            rusb::Error::Timeout => TransportError::Timeout { transferred: 0 },
            rusb::Error::Pipe => TransportError::Stall { transferred: 0 },
            other => TransportError::Usb(other),
        }
    }
}

/// Identification of an enumerated device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus_number: u8,
    pub address: u8,
}

/// Manufacturer, product and serial string descriptors
///
/// A string the device does not provide is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStrings {
    pub manufacturer: String,
    pub product: String,
    pub serial: String,
}

/// USB context: enumeration and opening
pub trait Transport {
    /// An enumerated, not yet opened device
    type Device;
    /// An opened device
    type Link: Link;

    /// List every device currently on the bus
    fn devices(&self) -> Result<Vec<Self::Device>, TransportError>;

    /// Vendor/product IDs and bus topology of a device
    fn identify(&self, device: &Self::Device) -> Result<UsbIdentity, TransportError>;

    /// Open a device. Dropping the returned link closes it.
    fn open(&self, device: &Self::Device) -> Result<Self::Link, TransportError>;
}

/// Operations on an opened device
pub trait Link {
    fn reset(&mut self) -> Result<(), TransportError>;

    /// Re-read the device descriptor and its string descriptors
    fn read_strings(&mut self) -> Result<DeviceStrings, TransportError>;

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError>;

    fn release_interface(&mut self, interface: u8) -> Result<(), TransportError>;

    /// Control transfer, device to host. Returns the number of bytes read.
    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;

    /// Control transfer, host to device. Returns the number of bytes written.
    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;

    /// Bulk transfer, device to host. Returns the number of bytes read.
    fn read_bulk(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;

    /// Bulk transfer, host to device. Returns the number of bytes written.
    fn write_bulk(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;
}

/// libusb transport through rusb
pub struct RusbTransport {
    context: Context,
}

impl RusbTransport {
    /// Create a new libusb context
    pub fn new() -> Result<Self, TransportError> {
        let context = Context::new()?;
        Ok(Self { context })
    }

    /// Get USB context
    pub fn context(&self) -> &Context {
        &self.context
    }
}

impl Transport for RusbTransport {
    type Device = Device<Context>;
    type Link = RusbLink;

    fn devices(&self) -> Result<Vec<Self::Device>, TransportError> {
        let devices = self.context.devices()?;
        debug!("Enumerated {} USB devices", devices.len());
        Ok(devices.iter().collect())
    }

    fn identify(&self, device: &Self::Device) -> Result<UsbIdentity, TransportError> {
        let descriptor = device.device_descriptor()?;
        Ok(UsbIdentity {
            vendor_id: descriptor.vendor_id(),
            product_id: descriptor.product_id(),
            bus_number: device.bus_number(),
            address: device.address(),
        })
    }

    fn open(&self, device: &Self::Device) -> Result<Self::Link, TransportError> {
        let handle = device.open()?;
        Ok(RusbLink { handle })
    }
}

/// Opened libusb device
///
/// rusb's synchronous transfer calls drop the partial byte count when they
/// fail, so stall and timeout errors from this link always report 0
/// transferred bytes.
pub struct RusbLink {
    handle: DeviceHandle<Context>,
}

impl Link for RusbLink {
    fn reset(&mut self) -> Result<(), TransportError> {
        self.handle.reset()?;
        Ok(())
    }

    fn read_strings(&mut self) -> Result<DeviceStrings, TransportError> {
        let descriptor = self.handle.device().device_descriptor()?;
        let read = |index: Option<u8>| {
            index
                .and_then(|idx| self.handle.read_string_descriptor_ascii(idx).ok())
                .unwrap_or_default()
        };

        Ok(DeviceStrings {
            manufacturer: read(descriptor.manufacturer_string_index()),
            product: read(descriptor.product_string_index()),
            serial: read(descriptor.serial_number_string_index()),
        })
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        self.handle.claim_interface(interface)?;
        Ok(())
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        self.handle.release_interface(interface)?;
        Ok(())
    }

    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        Ok(self
            .handle
            .read_control(request_type, request, value, index, buf, timeout)?)
    }

    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        Ok(self
            .handle
            .write_control(request_type, request, value, index, data, timeout)?)
    }

    fn read_bulk(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        Ok(self.handle.read_bulk(endpoint, buf, timeout)?)
    }

    fn write_bulk(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        Ok(self.handle.write_bulk(endpoint, data, timeout)?)
    }
}
