//! aub-devtest
//!
//! Loopback throughput test against one AXIS USB Bridge.

use anyhow::{Context, Result};
use aub_tools::{CommonArgs, LoopbackOptions, LoopbackStats, Payload, run_loopback};
use clap::Parser;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "aub-devtest")]
#[command(author, version, about = "Loopback throughput test for an AXIS USB Bridge")]
#[command(long_about = "
Sends a buffer to the bridge and reads the same number of elements back,
round after round, then reports errors and throughput per direction. The
bridge is expected to loop its OUT channel back to its IN channel.

EXAMPLES:
    # Test the first bridge with the defaults
    aub-devtest

    # Test a specific bridge with random payloads
    aub-devtest --serial SN0001 --random

    # Shorter run with bigger buffers
    aub-devtest --repeats 1000 --size 4096
")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Number of send/receive rounds
    #[arg(short, long, default_value_t = 10_000)]
    repeats: usize,

    /// Elements per round
    #[arg(short, long, default_value_t = 512)]
    size: usize,

    /// Sequence number of the device to test
    #[arg(short, long, conflicts_with = "serial")]
    number: Option<u32>,

    /// Serial number of the device to test
    #[arg(long)]
    serial: Option<String>,

    /// Send random bytes instead of a counting pattern
    #[arg(long)]
    random: bool,

    /// Print the results as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = args.common.setup()?;

    info!("aub-devtest v{}", env!("CARGO_PKG_VERSION"));

    let mut registry = aub::init(settings).context("Failed to initialize USB")?;
    println!("Device Count: <{}>", registry.count()?);

    let handle = match (args.number, args.serial.as_deref()) {
        (Some(number), _) => registry.open_by_number(number),
        (None, Some(serial)) => registry.open_by_serial(serial),
        (None, None) => registry.open(),
    };
    let handle = match handle {
        Ok(handle) => handle,
        Err(e) => {
            error!("Device open error: {}", e);
            return Err(e).context("Device open error");
        }
    };

    let options = LoopbackOptions {
        repeats: args.repeats,
        size: args.size,
        payload: if args.random {
            Payload::Random
        } else {
            Payload::Counting
        },
    };

    println!("Testing...");
    let stats = run_loopback(&mut registry, handle, &options)?;
    registry.close(handle);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats);
    }

    Ok(())
}

fn print_stats(stats: &LoopbackStats) {
    println!("Packets:");
    println!("   Sent:     {}", stats.sent.transfers);
    println!("   Received: {}", stats.received.transfers);
    println!("   Errors:   {}", stats.errors);
    println!("Amount:");
    println!("   Tx = {:.2} Mbits", stats.sent.megabits());
    println!("   Rx = {:.2} Mbits", stats.received.megabits());
    println!("Speed:");
    println!("   Tx = {:.2} Mbps", stats.sent.mbps());
    println!("   Rx = {:.2} Mbps", stats.received.mbps());
}
