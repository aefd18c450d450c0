//! Scripted mock transport for testing
//!
//! [`MockTransport`] lists a fixed set of [`MockDevice`]s. Each device keeps
//! its state behind an `Arc<Mutex<_>>`, so a test can hold on to a clone,
//! script bulk and register replies up front, and inspect the log of
//! operations afterwards.
//!
//! # Example
//!
//! ```
//! use aub::test_utils::{MockDevice, MockTransport, Op};
//! use aub::{Registry, Settings};
//!
//! let device = MockDevice::new("SN0001");
//! let mut registry = Registry::new(MockTransport::new(vec![device.clone()]), Settings::default());
//! registry.init().unwrap();
//!
//! assert_eq!(registry.count().unwrap(), 1);
//! assert!(device.ops().contains(&Op::Close));
//! ```

use crate::transport::{DeviceStrings, Link, Transport, TransportError, UsbIdentity};
use aub_protocol::{PRODUCT_ID, Register, Request, VENDOR_ID};
use byteorder::{ByteOrder, LittleEndian};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Stream mode, full-speed, 8-bit IN and OUT
pub const DEFAULT_CONFIG: [u8; 6] = [0x03, 0x00, 0x03, 0x00, 0x00, 0x00];

/// Consecutive unscripted bulk IN polls before the mock gives up
const MAX_IDLE_POLLS: usize = 10_000;

/// Recorded transport operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Open,
    Reset,
    ReadStrings,
    ClaimInterface(u8),
    ReleaseInterface(u8),
    ControlIn {
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        len: usize,
    },
    ControlOut {
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: Vec<u8>,
    },
    BulkOut {
        endpoint: u8,
        len: usize,
    },
    BulkIn {
        endpoint: u8,
        len: usize,
    },
    Close,
}

impl Op {
    /// True for bulk transfers in either direction
    pub fn is_bulk(&self) -> bool {
        matches!(self, Op::BulkOut { .. } | Op::BulkIn { .. })
    }

    /// Register write of `register`, if this is one
    pub fn register_write(&self) -> Option<(Register, u16)> {
        match self {
            Op::ControlOut {
                request, value, data, ..
            } if *request == Request::RegOper.code() && data.len() == 2 => {
                let register = Register::from_address(*value).ok()?;
                Some((register, LittleEndian::read_u16(data)))
            }
            _ => None,
        }
    }

    /// Register read of `register`, if this is one
    pub fn register_read(&self) -> Option<Register> {
        match self {
            Op::ControlIn { request, value, .. } if *request == Request::RegOper.code() => {
                Register::from_address(*value).ok()
            }
            _ => None,
        }
    }
}

/// Scripted outcome of one bulk transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkReply {
    /// OUT: take the whole chunk. IN: nothing to deliver, times out.
    Accept,
    /// Move this many bytes (capped at the chunk size). IN data is a
    /// running byte counter.
    Bytes(usize),
    /// IN: deliver exactly these bytes (capped at the chunk size)
    Data(Vec<u8>),
    /// Fail; stall and timeout still move their `transferred` bytes
    Fail(TransportError),
}

#[derive(Debug)]
struct MockState {
    identity: UsbIdentity,
    strings: DeviceStrings,
    config_reply: Result<Vec<u8>, TransportError>,
    open_error: Option<TransportError>,
    identify_error: Option<TransportError>,
    claim_error: Option<TransportError>,
    reg_write_error: Option<TransportError>,
    reg_read_error: Option<TransportError>,
    registers: [u16; 3],
    rsr_values: VecDeque<u16>,
    bulk_out: VecDeque<BulkReply>,
    bulk_in: VecDeque<BulkReply>,
    sent: Vec<u8>,
    next_in_byte: u8,
    idle_polls: usize,
    open: bool,
    ops: Vec<Op>,
}

impl MockState {
    fn next_in_bytes(&mut self, count: usize) -> Vec<u8> {
        (0..count)
            .map(|_| {
                let byte = self.next_in_byte;
                self.next_in_byte = self.next_in_byte.wrapping_add(1);
                byte
            })
            .collect()
    }
}

/// Mock bridge device
#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    /// A healthy bridge with the given serial and [`DEFAULT_CONFIG`]
    pub fn new(serial: &str) -> Self {
        let state = MockState {
            identity: UsbIdentity {
                vendor_id: VENDOR_ID,
                product_id: PRODUCT_ID,
                bus_number: 1,
                address: 1,
            },
            strings: DeviceStrings {
                manufacturer: "Test Manufacturer".to_string(),
                product: "AXIS USB Bridge".to_string(),
                serial: serial.to_string(),
            },
            config_reply: Ok(DEFAULT_CONFIG.to_vec()),
            open_error: None,
            identify_error: None,
            claim_error: None,
            reg_write_error: None,
            reg_read_error: None,
            registers: [0; 3],
            rsr_values: VecDeque::new(),
            bulk_out: VecDeque::new(),
            bulk_in: VecDeque::new(),
            sent: Vec::new(),
            next_in_byte: 0,
            idle_polls: 0,
            open: false,
            ops: Vec::new(),
        };

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    pub fn with_identity(self, vendor_id: u16, product_id: u16) -> Self {
        {
            let mut state = self.state();
            state.identity.vendor_id = vendor_id;
            state.identity.product_id = product_id;
        }
        self
    }

    pub fn with_address(self, bus_number: u8, address: u8) -> Self {
        {
            let mut state = self.state();
            state.identity.bus_number = bus_number;
            state.identity.address = address;
        }
        self
    }

    pub fn with_strings(self, manufacturer: &str, product: &str) -> Self {
        {
            let mut state = self.state();
            state.strings.manufacturer = manufacturer.to_string();
            state.strings.product = product.to_string();
        }
        self
    }

    /// Configuration returned by `CFG_GET`
    pub fn with_config(self, config: [u8; 6]) -> Self {
        self.with_config_reply(Ok(config.to_vec()))
    }

    /// Raw `CFG_GET` outcome, for short transfers and failures
    pub fn with_config_reply(self, reply: Result<Vec<u8>, TransportError>) -> Self {
        self.state().config_reply = reply;
        self
    }

    pub fn fail_open(self, err: TransportError) -> Self {
        self.state().open_error = Some(err);
        self
    }

    pub fn fail_identify(self, err: TransportError) -> Self {
        self.state().identify_error = Some(err);
        self
    }

    pub fn fail_claim(self, err: TransportError) -> Self {
        self.state().claim_error = Some(err);
        self
    }

    pub fn fail_register_writes(self, err: TransportError) -> Self {
        self.state().reg_write_error = Some(err);
        self
    }

    pub fn fail_register_reads(self, err: TransportError) -> Self {
        self.state().reg_read_error = Some(err);
        self
    }

    /// Values returned by successive RSR reads; 0 once exhausted
    pub fn with_rsr_values(self, values: impl IntoIterator<Item = u16>) -> Self {
        self.state().rsr_values.extend(values);
        self
    }

    /// Outcomes of successive bulk OUT transfers; [`BulkReply::Accept`] once exhausted
    pub fn with_bulk_out(self, replies: impl IntoIterator<Item = BulkReply>) -> Self {
        self.state().bulk_out.extend(replies);
        self
    }

    /// Outcomes of successive bulk IN transfers; timeouts once exhausted
    pub fn with_bulk_in(self, replies: impl IntoIterator<Item = BulkReply>) -> Self {
        self.state().bulk_in.extend(replies);
        self
    }

    /// Change the configuration after construction, e.g. between opens
    pub fn set_config(&self, config: [u8; 6]) {
        self.state().config_reply = Ok(config.to_vec());
    }

    /// Queue more bulk IN outcomes
    pub fn push_bulk_in(&self, replies: impl IntoIterator<Item = BulkReply>) {
        self.state().bulk_in.extend(replies);
    }

    /// Queue more RSR values
    pub fn push_rsr_values(&self, values: impl IntoIterator<Item = u16>) {
        self.state().rsr_values.extend(values);
    }

    /// A link to this device without going through [`MockTransport::open`]
    pub fn link(&self) -> MockLink {
        self.state().open = true;
        MockLink {
            state: Arc::clone(&self.state),
        }
    }

    /// Every operation recorded so far
    pub fn ops(&self) -> Vec<Op> {
        self.state().ops.clone()
    }

    /// Forget the recorded operations
    pub fn clear_ops(&self) {
        self.state().ops.clear();
    }

    /// Bytes accepted by bulk OUT transfers, in order
    pub fn sent_data(&self) -> Vec<u8> {
        self.state().sent.clone()
    }

    /// Whether a link to this device is currently alive
    pub fn is_open(&self) -> bool {
        self.state().open
    }
}

/// Mock USB context listing a fixed set of devices
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    devices: Vec<MockDevice>,
    enumeration_error: Option<TransportError>,
}

impl MockTransport {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        Self {
            devices,
            enumeration_error: None,
        }
    }

    /// Make device listing fail
    pub fn fail_enumeration(mut self, err: TransportError) -> Self {
        self.enumeration_error = Some(err);
        self
    }
}

impl Transport for MockTransport {
    type Device = MockDevice;
    type Link = MockLink;

    fn devices(&self) -> Result<Vec<Self::Device>, TransportError> {
        match self.enumeration_error {
            Some(err) => Err(err),
            None => Ok(self.devices.clone()),
        }
    }

    fn identify(&self, device: &Self::Device) -> Result<UsbIdentity, TransportError> {
        let state = device.state();
        match state.identify_error {
            Some(err) => Err(err),
            None => Ok(state.identity),
        }
    }

    fn open(&self, device: &Self::Device) -> Result<Self::Link, TransportError> {
        {
            let mut state = device.state();
            state.ops.push(Op::Open);
            if let Some(err) = state.open_error {
                return Err(err);
            }
        }
        Ok(device.link())
    }
}

/// Opened mock device
#[derive(Debug)]
pub struct MockLink {
    state: Arc<Mutex<MockState>>,
}

impl MockLink {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }
}

impl Link for MockLink {
    fn reset(&mut self) -> Result<(), TransportError> {
        self.state().ops.push(Op::Reset);
        Ok(())
    }

    fn read_strings(&mut self) -> Result<DeviceStrings, TransportError> {
        let mut state = self.state();
        state.ops.push(Op::ReadStrings);
        Ok(state.strings.clone())
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        let mut state = self.state();
        state.ops.push(Op::ClaimInterface(interface));
        match state.claim_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        self.state().ops.push(Op::ReleaseInterface(interface));
        Ok(())
    }

    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        let mut state = self.state();
        state.ops.push(Op::ControlIn {
            request_type,
            request,
            value,
            index,
            len: buf.len(),
        });

        if request == Request::CfgGet.code() {
            let bytes = state.config_reply.clone()?;
            let len = bytes.len().min(buf.len());
            buf[..len].copy_from_slice(&bytes[..len]);
            return Ok(len);
        }

        if let Some(err) = state.reg_read_error {
            return Err(err);
        }
        let register =
            Register::from_address(value).map_err(|_| TransportError::Stall { transferred: 0 })?;
        let reg_value = match register {
            Register::Rsr => state.rsr_values.pop_front().unwrap_or(0),
            other => state.registers[other.address() as usize],
        };
        if buf.len() < 2 {
            return Err(TransportError::Usb(rusb::Error::Overflow));
        }
        LittleEndian::write_u16(&mut buf[..2], reg_value);
        Ok(2)
    }

    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        let mut state = self.state();
        state.ops.push(Op::ControlOut {
            request_type,
            request,
            value,
            index,
            data: data.to_vec(),
        });

        if let Some(err) = state.reg_write_error {
            return Err(err);
        }
        let register =
            Register::from_address(value).map_err(|_| TransportError::Stall { transferred: 0 })?;
        if data.len() >= 2 {
            state.registers[register.address() as usize] = LittleEndian::read_u16(data);
        }
        Ok(data.len())
    }

    fn read_bulk(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        let mut state = self.state();
        state.ops.push(Op::BulkIn {
            endpoint,
            len: buf.len(),
        });

        let reply = match state.bulk_in.pop_front() {
            Some(reply) => {
                state.idle_polls = 0;
                reply
            }
            None => {
                state.idle_polls += 1;
                assert!(
                    state.idle_polls < MAX_IDLE_POLLS,
                    "bulk IN polled {} times without scripted data",
                    MAX_IDLE_POLLS
                );
                BulkReply::Accept
            }
        };

        match reply {
            BulkReply::Accept => Err(TransportError::Timeout { transferred: 0 }),
            BulkReply::Bytes(count) => {
                let bytes = state.next_in_bytes(count.min(buf.len()));
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok(bytes.len())
            }
            BulkReply::Data(data) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
            BulkReply::Fail(err) => {
                let bytes = state.next_in_bytes(err.transferred().min(buf.len()));
                buf[..bytes.len()].copy_from_slice(&bytes);
                Err(err)
            }
        }
    }

    fn write_bulk(
        &mut self,
        endpoint: u8,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        let mut state = self.state();
        state.ops.push(Op::BulkOut {
            endpoint,
            len: data.len(),
        });

        match state.bulk_out.pop_front().unwrap_or(BulkReply::Accept) {
            BulkReply::Accept | BulkReply::Data(_) => {
                state.sent.extend_from_slice(data);
                Ok(data.len())
            }
            BulkReply::Bytes(count) => {
                let len = count.min(data.len());
                state.sent.extend_from_slice(&data[..len]);
                Ok(len)
            }
            BulkReply::Fail(err) => {
                let len = err.transferred().min(data.len());
                state.sent.extend_from_slice(&data[..len]);
                Err(err)
            }
        }
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.ops.push(Op::Close);
            state.open = false;
        }
    }
}
