//! aub-devinfo
//!
//! Lists every AXIS USB Bridge on the bus with its identity, string
//! descriptors and decoded configuration.

use anyhow::{Context, Result};
use aub_tools::{CommonArgs, report};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "aub-devinfo")]
#[command(author, version, about = "Show AXIS USB Bridge devices")]
#[command(long_about = "
Scans the bus for AXIS USB Bridge devices and prints what each one reports.

EXAMPLES:
    # Text report
    aub-devinfo

    # Machine-readable report
    aub-devinfo --json

    # Look for a bridge with a non-default vendor/product ID
    aub-devinfo --config ./aub.toml

CONFIGURATION:
    The tools look for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/aub/config.toml
    3. /etc/aub/config.toml
    4. Built-in defaults
")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Print the device list as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = args.common.setup()?;

    info!("aub-devinfo v{}", env!("CARGO_PKG_VERSION"));

    let registry = aub::init(settings).context("Failed to initialize USB")?;
    let devices = registry.list()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    println!("Device Count: <{}>", devices.len());
    for device in &devices {
        println!("{}", report::format_device(device));
    }

    Ok(())
}
