//! Open device session
//!
//! A [`Session`] owns the link to an opened bridge together with the transfer
//! parameters derived from the configuration read at open time. The
//! parameters are fixed for the lifetime of the session. Dropping the session
//! releases the data interface and closes the link, on every path including a
//! failed open.

use crate::requests;
use crate::transport::{DeviceStrings, Link};
use aub_common::Result;
use aub_protocol::{Channel, DATA_INTERFACE, DeviceConfig, Mode};
use std::time::Duration;
use tracing::{debug, warn};

/// Capacity of a cached string descriptor, terminator included
pub const STRING_CAPACITY: usize = 64;

/// Transfer parameters derived once from the device configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferParams {
    /// Device-wide framing mode
    pub mode: Mode,
    /// Bytes per element, indexed by [`Channel::index`]; 0 = channel absent
    pub width: [usize; 2],
    /// Largest bulk chunk
    pub max_packet_size: usize,
    /// Timeout of every control and bulk transfer
    pub timeout: Duration,
}

impl TransferParams {
    pub fn from_config(config: &DeviceConfig, timeout: Duration) -> Self {
        Self {
            mode: config.mode,
            width: [
                config.channel(Channel::In).width.bytes(),
                config.channel(Channel::Out).width.bytes(),
            ],
            max_packet_size: config.speed.max_packet_size(),
            timeout,
        }
    }

    /// Bytes per element of a channel
    pub fn width(&self, channel: Channel) -> usize {
        self.width[channel.index()]
    }
}

/// An opened bridge
pub struct Session<L: Link> {
    pub(crate) link: L,
    claimed: bool,
    params: TransferParams,
}

impl<L: Link> Session<L> {
    /// Bring a freshly opened link into a usable session
    ///
    /// Resets the device, refreshes `strings`, claims the data interface and
    /// reads the configuration. Reset, string and claim failures are only
    /// logged. A failed configuration read drops the session, which releases
    /// everything acquired so far.
    pub(crate) fn establish(
        link: L,
        strings: &mut DeviceStrings,
        timeout: Duration,
    ) -> Result<(Self, DeviceConfig)> {
        let mut session = Self {
            link,
            claimed: false,
            params: TransferParams::from_config(&DeviceConfig::default(), timeout),
        };

        if let Err(e) = session.link.reset() {
            debug!("Device reset failed: {}", e);
        }

        match session.link.read_strings() {
            Ok(fresh) => *strings = cap_strings(fresh),
            Err(e) => warn!("Failed to read string descriptors: {}", e),
        }

        match session.link.claim_interface(DATA_INTERFACE) {
            Ok(()) => session.claimed = true,
            Err(e) => warn!("Failed to claim interface {}: {}", DATA_INTERFACE, e),
        }

        let config = requests::read_config(&mut session.link, timeout)?;
        session.params = TransferParams::from_config(&config, timeout);

        debug!(
            "Session established: mode={:?}, width in/out={}/{}, max packet={}",
            session.params.mode,
            session.params.width(Channel::In),
            session.params.width(Channel::Out),
            session.params.max_packet_size
        );

        Ok((session, config))
    }

    pub fn params(&self) -> &TransferParams {
        &self.params
    }
}

impl<L: Link> Drop for Session<L> {
    fn drop(&mut self) {
        if self.claimed
            && let Err(e) = self.link.release_interface(DATA_INTERFACE)
        {
            warn!("Failed to release interface {}: {}", DATA_INTERFACE, e);
        }
        debug!("Session closed");
    }
}

fn cap_strings(strings: DeviceStrings) -> DeviceStrings {
    DeviceStrings {
        manufacturer: cap(strings.manufacturer),
        product: cap(strings.product),
        serial: cap(strings.serial),
    }
}

/// Truncate to what fits a terminated [`STRING_CAPACITY`] buffer
fn cap(mut s: String) -> String {
    if s.len() >= STRING_CAPACITY {
        let mut end = STRING_CAPACITY - 1;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}
