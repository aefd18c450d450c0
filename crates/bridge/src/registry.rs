//! Bridge device registry
//!
//! Discovers bridges on the bus, owns their [`DeviceRecord`]s and routes
//! session operations to them. The registry has an explicit lifecycle:
//! [`Registry::init`] scans the bus, [`Registry::deinit`] closes every
//! session and forgets all records. Dropping the registry deinitializes it.

use crate::device::{DeviceInfo, DeviceRecord};
use crate::transport::{RusbTransport, Transport};
use aub_common::{Error, Result, Settings};
use tracing::{debug, info, warn};

/// Handle of an open session
///
/// Wraps the sequence number of the device behind it. Handles compare by
/// that number, not by any address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(u32);

impl SessionHandle {
    pub fn devnum(self) -> u32 {
        self.0
    }
}

/// Create a libusb-backed registry and scan the bus
pub fn init(settings: Settings) -> Result<Registry<RusbTransport>> {
    let transport = RusbTransport::new()
        .map_err(|e| Error::LowLevel(format!("Failed to create USB context: {}", e)))?;
    let mut registry = Registry::new(transport, settings);
    registry.init()?;
    Ok(registry)
}

/// Registry of discovered bridges
pub struct Registry<T: Transport> {
    transport: T,
    settings: Settings,
    /// `None` until initialized; index = sequence number
    records: Option<Vec<DeviceRecord<T>>>,
}

impl<T: Transport> Registry<T> {
    /// Create an uninitialized registry on top of a transport
    pub fn new(transport: T, settings: Settings) -> Self {
        Self {
            transport,
            settings,
            records: None,
        }
    }

    /// Scan the bus and probe every matching device
    ///
    /// Re-initializing first tears the previous scan down. An enumeration
    /// failure leaves the registry uninitialized. A matching device that
    /// cannot be probed is skipped and gets no sequence number.
    pub fn init(&mut self) -> Result<()> {
        self.deinit();

        let devices = self.transport.devices().map_err(|e| {
            warn!("USB enumeration failed: {}", e);
            Error::LowLevel(format!("USB enumeration failed: {}", e))
        })?;

        let mut records = Vec::new();
        for device in devices {
            let identity = match self.transport.identify(&device) {
                Ok(identity) => identity,
                Err(e) => {
                    debug!("Skipping device without descriptor: {}", e);
                    continue;
                }
            };

            if !self
                .settings
                .filter
                .matches(identity.vendor_id, identity.product_id)
            {
                continue;
            }

            let devnum = records.len() as u32;
            let mut record = DeviceRecord::new(device, devnum, &identity);

            // Probe: fill strings and configuration before anyone sees the record
            match record.open(&self.transport, self.settings.timeout) {
                Ok(()) => {
                    record.close();
                    debug!(
                        "Added device {}: bus={}, addr={}, serial={:?}",
                        devnum,
                        identity.bus_number,
                        identity.address,
                        record.serial()
                    );
                    records.push(record);
                }
                Err(e) => {
                    warn!(
                        "Skipping bridge at bus={}, addr={}: probe failed: {}",
                        identity.bus_number, identity.address, e
                    );
                }
            }
        }

        info!(
            "Registry initialized with {} devices (filter {})",
            records.len(),
            self.settings.filter
        );
        self.records = Some(records);
        Ok(())
    }

    /// Close every session and forget all records. Safe to call repeatedly.
    pub fn deinit(&mut self) {
        if let Some(mut records) = self.records.take() {
            for record in &mut records {
                record.close();
            }
            info!("Registry torn down ({} devices released)", records.len());
        }
    }

    /// Same as [`Registry::deinit`]
    pub fn teardown(&mut self) {
        self.deinit();
    }

    pub fn is_initialized(&self) -> bool {
        self.records.is_some()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn records(&self) -> Result<&[DeviceRecord<T>]> {
        self.records.as_deref().ok_or(Error::NotInitialized)
    }

    fn records_mut(&mut self) -> Result<&mut [DeviceRecord<T>]> {
        self.records.as_deref_mut().ok_or(Error::NotInitialized)
    }

    fn record_mut(&mut self, handle: SessionHandle) -> Result<&mut DeviceRecord<T>> {
        self.records_mut()?
            .get_mut(handle.0 as usize)
            .ok_or(Error::NoDeviceFound)
    }

    /// Number of discovered devices
    pub fn count(&self) -> Result<u32> {
        Ok(self.records()?.len() as u32)
    }

    /// Snapshot of the device with sequence number `devnum`
    ///
    /// Fails with [`Error::NotInitialized`] before [`Registry::init`], and
    /// with [`Error::NoDeviceFound`] when the registry is empty or `devnum`
    /// is unknown.
    pub fn info(&self, devnum: u32) -> Result<DeviceInfo> {
        self.records()?
            .get(devnum as usize)
            .map(DeviceRecord::info)
            .ok_or(Error::NoDeviceFound)
    }

    /// Snapshots of every discovered device
    pub fn list(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self.records()?.iter().map(DeviceRecord::info).collect())
    }

    /// Sequence number of the device behind a session handle
    pub fn device_number(&self, handle: SessionHandle) -> Result<u32> {
        self.records()?
            .get(handle.0 as usize)
            .map(DeviceRecord::devnum)
            .ok_or(Error::NoDeviceFound)
    }

    /// Open the first device, in sequence order, that matches `predicate`
    /// and can be opened
    pub fn find_open<F>(&mut self, mut predicate: F) -> Result<SessionHandle>
    where
        F: FnMut(&DeviceInfo) -> bool,
    {
        let timeout = self.settings.timeout;
        let records = self.records.as_deref_mut().ok_or(Error::NotInitialized)?;
        if records.is_empty() {
            return Err(Error::NoDeviceFound);
        }

        for record in records.iter_mut() {
            if !predicate(&record.info()) {
                continue;
            }
            match record.open(&self.transport, timeout) {
                Ok(()) => {
                    info!("Opened device {}", record.devnum());
                    return Ok(SessionHandle(record.devnum()));
                }
                Err(e) => debug!("Device {} not openable: {}", record.devnum(), e),
            }
        }

        Err(Error::NoDeviceFound)
    }

    /// Open the lowest-numbered device that can be opened
    pub fn open(&mut self) -> Result<SessionHandle> {
        self.find_open(|_| true)
    }

    /// Open the device with sequence number `devnum`
    pub fn open_by_number(&mut self, devnum: u32) -> Result<SessionHandle> {
        self.find_open(|info| info.devnum == devnum)
    }

    /// Open the first device with serial number `serial`
    pub fn open_by_serial(&mut self, serial: &str) -> Result<SessionHandle> {
        self.find_open(|info| info.serial == serial)
    }

    /// Close a session. Unknown or already closed handles are ignored.
    pub fn close(&mut self, handle: SessionHandle) {
        if let Ok(record) = self.record_mut(handle) {
            record.close();
        }
    }

    /// Whether the session behind `handle` is open
    pub fn is_open(&self, handle: SessionHandle) -> bool {
        self.records()
            .ok()
            .and_then(|records| records.get(handle.0 as usize))
            .is_some_and(DeviceRecord::is_open)
    }

    /// Send `count` elements of `data` on the session's OUT channel
    pub fn send(&mut self, handle: SessionHandle, data: &[u8], count: usize) -> Result<usize> {
        self.record_mut(handle)?.session_mut()?.send(data, count)
    }

    /// Receive up to `count` elements into `buffer` from the session's IN channel
    pub fn recv(&mut self, handle: SessionHandle, buffer: &mut [u8], count: usize) -> Result<usize> {
        self.record_mut(handle)?.session_mut()?.recv(buffer, count)
    }

    /// Access the record behind a handle, e.g. to read its transfer parameters
    pub fn record(&self, handle: SessionHandle) -> Result<&DeviceRecord<T>> {
        self.records()?
            .get(handle.0 as usize)
            .ok_or(Error::NoDeviceFound)
    }
}

impl<T: Transport> Drop for Registry<T> {
    fn drop(&mut self) {
        self.deinit();
    }
}
