//! Host-side client for the AXIS USB Bridge
//!
//! The bridge exposes two unidirectional data channels (IN: device to host,
//! OUT: host to device) over a pair of bulk endpoints, and a small set of
//! vendor control requests for its configuration and status registers.
//!
//! A [`Registry`] discovers bridges on the bus and hands out
//! [`SessionHandle`]s for opened devices. Data is moved with
//! [`Registry::send`] and [`Registry::recv`], counted in elements of the
//! channel width read from the device when it was opened.
//!
//! # Example
//!
//! ```no_run
//! use aub::Settings;
//!
//! # fn main() -> aub::Result<()> {
//! let mut registry = aub::init(Settings::default())?;
//! println!("{} bridges found", registry.count()?);
//!
//! let handle = registry.open()?;
//! let sent = registry.send(handle, &[0u8; 512], 512)?;
//! let mut buf = [0u8; 512];
//! let received = registry.recv(handle, &mut buf, 512)?;
//! println!("sent {}, received {}", sent, received);
//!
//! registry.close(handle);
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod registry;
pub mod requests;
pub mod session;
pub mod test_utils;
mod transfers;
pub mod transport;

pub use aub_common::{Error, Result, Settings};
pub use device::{ChannelInfo, DeviceInfo, DeviceRecord};
pub use registry::{Registry, SessionHandle, init};
pub use session::{Session, TransferParams};
pub use transport::{
    DeviceStrings, Link, RusbLink, RusbTransport, Transport, TransportError, UsbIdentity,
};
