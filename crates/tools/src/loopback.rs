//! Loopback throughput test
//!
//! Repeatedly sends a buffer on the OUT channel and reads the same number
//! of elements back from the IN channel, as a bridge wired in loopback
//! would return them. Only the time spent inside `send` and `recv` counts
//! towards the throughput figures.

use aub::{Registry, SessionHandle, Transport};
use aub_protocol::Channel;
use rand::Rng;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Payload written on every round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Payload {
    /// Byte `i` of round `r` is `(i + r) as u8`
    #[default]
    Counting,
    /// Fresh random bytes every round
    Random,
}

impl Payload {
    pub fn fill(self, buf: &mut [u8], round: usize) {
        match self {
            Payload::Counting => {
                for (i, byte) in buf.iter_mut().enumerate() {
                    *byte = i.wrapping_add(round) as u8;
                }
            }
            Payload::Random => rand::rng().fill(buf),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopbackOptions {
    pub repeats: usize,
    /// Elements per round
    pub size: usize,
    pub payload: Payload,
}

impl Default for LoopbackOptions {
    fn default() -> Self {
        Self {
            repeats: 10_000,
            size: 512,
            payload: Payload::Counting,
        }
    }
}

/// Successful transfers in one direction
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DirectionStats {
    pub transfers: u64,
    pub bytes: u64,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl DirectionStats {
    fn record(&mut self, bytes: usize, elapsed: Duration) {
        self.transfers += 1;
        self.bytes += bytes as u64;
        self.elapsed += elapsed;
    }

    /// Amount moved in Mbit (2^20 bits)
    pub fn megabits(&self) -> f64 {
        self.bytes as f64 * 8.0 / (1024.0 * 1024.0)
    }

    /// Throughput in Mbit/s over the time spent transferring
    pub fn mbps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.megabits() / secs } else { 0.0 }
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LoopbackStats {
    pub sent: DirectionStats,
    pub received: DirectionStats,
    /// Failed transfers plus rounds whose data did not come back intact
    pub errors: u64,
}

/// Run the loopback test on an open session
pub fn run_loopback<T: Transport>(
    registry: &mut Registry<T>,
    handle: SessionHandle,
    options: &LoopbackOptions,
) -> aub::Result<LoopbackStats> {
    let params = *registry
        .record(handle)?
        .params()
        .ok_or(aub::Error::NotInitialized)?;
    let tx_width = params.width(Channel::Out);
    let rx_width = params.width(Channel::In);

    let mut tx = vec![0u8; options.size * tx_width];
    let mut rx = vec![0u8; options.size * rx_width];
    let mut stats = LoopbackStats::default();

    for round in 0..options.repeats {
        options.payload.fill(&mut tx, round);

        let start = Instant::now();
        let sent = registry.send(handle, &tx, options.size);
        let tx_time = start.elapsed();

        let start = Instant::now();
        let received = registry.recv(handle, &mut rx, options.size);
        let rx_time = start.elapsed();

        let sent = match sent {
            Ok(n) => n,
            Err(e) => {
                debug!("Round {}: send failed: {}", round, e);
                stats.errors += 1;
                continue;
            }
        };
        stats.sent.record(sent * tx_width, tx_time);

        let received = match received {
            Ok(n) => n,
            Err(e) => {
                debug!("Round {}: recv failed: {}", round, e);
                stats.errors += 1;
                continue;
            }
        };
        stats.received.record(received * rx_width, rx_time);

        let compared = (sent * tx_width).min(received * rx_width);
        if received != options.size || tx[..compared] != rx[..compared] {
            debug!("Round {}: data mismatch", round);
            stats.errors += 1;
        }
    }

    if stats.errors > 0 {
        warn!("{} of {} rounds failed", stats.errors, options.repeats);
    }
    Ok(stats)
}
