//! Data transfer engine
//!
//! Moves channel data over the bulk endpoints in chunks of at most one
//! max-size packet. Counts passed in and returned are elements; the byte
//! length is the element count times the channel width.
//!
//! Framing depends on the device mode:
//!
//! - **Stream**: nothing is signalled in-band. A stall or timeout on a bulk
//!   transfer is the end of the transfer; the bytes that attempt moved are
//!   counted and the call succeeds.
//! - **Packet**: `send` announces the byte length in `TLR` before the data.
//!   `recv` clears `RSR`, then after every chunk polls it until the
//!   last-packet bit shows up. Stall and timeout abort a packet-mode send,
//!   but only mean "nothing yet" to a packet-mode receive.

use crate::requests::{read_register, write_register};
use crate::session::Session;
use crate::transport::{Link, TransportError};
use aub_common::{Error, Result};
use aub_protocol::{BULK_ENDPOINT_IN, BULK_ENDPOINT_OUT, Channel, Mode, ReceiveStatus, Register};
use tracing::{debug, trace, warn};

impl<L: Link> Session<L> {
    /// Send `count` elements from `data` over the OUT channel
    ///
    /// Returns the number of elements transferred. Less than `count` is only
    /// possible in stream mode, when the device stops accepting data.
    pub fn send(&mut self, data: &[u8], count: usize) -> Result<usize> {
        let params = *self.params();
        let width = params.width(Channel::Out);
        let length = count.saturating_mul(width);
        if length == 0 {
            return Ok(0);
        }

        if data.len() < length {
            return Err(Error::InvalidBuffer {
                needed: length,
                available: data.len(),
            });
        }

        if params.mode == Mode::Packet {
            let tlr = u16::try_from(length).map_err(|_| Error::InvalidBuffer {
                needed: length,
                available: u16::MAX as usize,
            })?;
            write_register(&mut self.link, Register::Tlr, tlr, params.timeout)?;
        }

        let mut sent = 0;
        while sent < length {
            let chunk_len = (length - sent).min(params.max_packet_size);
            let chunk = &data[sent..sent + chunk_len];

            match self.link.write_bulk(BULK_ENDPOINT_OUT, chunk, params.timeout) {
                Ok(written) => {
                    trace!("Bulk OUT: {}/{} bytes", written, chunk_len);
                    sent += written.min(chunk_len);
                }
                Err(e) if e.is_end_of_transfer() && params.mode == Mode::Stream => {
                    sent += e.transferred().min(chunk_len);
                    debug!("Bulk OUT ended by {} after {} bytes", e, sent);
                    break;
                }
                Err(e) => return Err(bulk_error("OUT", e, sent)),
            }
        }

        Ok(sent / width)
    }

    /// Receive up to `count` elements from the IN channel into `buffer`
    ///
    /// In stream mode the call returns once `count` elements arrived or the
    /// device stops sending. In packet mode it returns at the end of the
    /// frame, which may be shorter than `count`; a frame that fills `count`
    /// elements without ending is [`Error::Overflow`].
    pub fn recv(&mut self, buffer: &mut [u8], count: usize) -> Result<usize> {
        let params = *self.params();
        let width = params.width(Channel::In);
        let length = count.saturating_mul(width);
        if length == 0 {
            return Ok(0);
        }

        if buffer.len() < length {
            return Err(Error::InvalidBuffer {
                needed: length,
                available: buffer.len(),
            });
        }

        if params.mode == Mode::Packet {
            write_register(&mut self.link, Register::Rsr, 0, params.timeout)?;
        }

        // The device may always send a full packet, so read into a scratch
        // packet and copy only what fits the request.
        let mut packet = vec![0u8; params.max_packet_size];
        let mut received = 0;

        while received < length {
            let room = length - received;

            match self.link.read_bulk(BULK_ENDPOINT_IN, &mut packet, params.timeout) {
                Ok(len) => {
                    trace!("Bulk IN: {} bytes", len);
                    received += take(&packet[..len], &mut buffer[received..], room);
                }
                Err(e) if e.is_end_of_transfer() => {
                    if params.mode == Mode::Stream {
                        let partial = e.transferred().min(packet.len());
                        received += take(&packet[..partial], &mut buffer[received..], room);
                        debug!("Bulk IN ended by {} after {} bytes", e, received);
                        break;
                    }
                    // Packet mode: partial bytes are dropped, poll again
                    trace!("Bulk IN: {} while waiting for frame", e);
                    continue;
                }
                Err(e) => return Err(bulk_error("IN", e, received)),
            }

            if params.mode == Mode::Packet {
                let status =
                    ReceiveStatus(read_register(&mut self.link, Register::Rsr, params.timeout)?);
                if status.is_last() {
                    debug!("End of frame after {} bytes", received);
                    return Ok(received / width);
                }
            }
        }

        if params.mode == Mode::Packet {
            warn!(
                "Frame exceeded the requested {} bytes without end of frame",
                length
            );
            return Err(Error::Overflow {
                received: received / width,
            });
        }

        Ok(received / width)
    }
}

/// Copy at most `room` bytes of `src` into `dst`, returning the count
fn take(src: &[u8], dst: &mut [u8], room: usize) -> usize {
    let n = src.len().min(room);
    if src.len() > room {
        debug!("Dropping {} bytes beyond the requested length", src.len() - room);
    }
    dst[..n].copy_from_slice(&src[..n]);
    n
}

fn bulk_error(direction: &str, err: TransportError, done: usize) -> Error {
    warn!("Bulk {} failed after {} bytes: {}", direction, done, err);
    Error::Io(format!("Bulk {} failed: {}", direction, err))
}
