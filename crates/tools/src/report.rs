//! Human-readable device reports

use aub::{ChannelInfo, DeviceInfo};
use aub_protocol::{Channel, Endianness, Mode, Speed};
use std::fmt::Write;

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn mode_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Stream => "stream",
        Mode::Packet => "packet",
    }
}

fn speed_name(speed: Speed) -> &'static str {
    match speed {
        Speed::Full => "full-speed",
        Speed::High => "high-speed",
    }
}

fn endianness_name(endianness: Endianness) -> &'static str {
    match endianness {
        Endianness::Little => "little-endian",
        Endianness::Big => "big-endian",
    }
}

fn channel_lines(out: &mut String, name: &str, chan: &ChannelInfo) {
    let rows = [
        ("ENABLED", yes_no(chan.enabled).to_string()),
        ("WIDTH", chan.width.to_string()),
        ("ENDIANNESS", endianness_name(chan.endianness).to_string()),
        ("FIFO_ENABLED", yes_no(chan.fifo_enabled).to_string()),
        ("FIFO_MODE", mode_name(chan.fifo_mode).to_string()),
        ("FIFO_DEPTH", chan.fifo_depth.to_string()),
    ];
    for (field, value) in rows {
        let key = format!("CFG.CHAN[{}].{}:", name, field);
        let _ = writeln!(out, " > {:<29} {}", key, value);
    }
}

/// Multi-line text description of one device
pub fn format_device(info: &DeviceInfo) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Device <{}> Info:", info.devnum);
    let _ = writeln!(out, " > DEVNUM:  {:04X}", info.devnum);
    let _ = writeln!(out, " > BUSNUM:  {:02X}", info.busnum);
    let _ = writeln!(out, " > DEVADDR: {:02X}", info.devaddr);
    let _ = writeln!(out, " > {:<29} {}", "STR.MANUFACTURER:", info.manufacturer);
    let _ = writeln!(out, " > {:<29} {}", "STR.PRODUCT:", info.product);
    let _ = writeln!(out, " > {:<29} {}", "STR.SERIAL:", info.serial);
    let _ = writeln!(out, " > {:<29} {}", "CFG.SPEED:", speed_name(info.speed));
    let _ = writeln!(out, " > {:<29} {}", "CFG.MODE:", mode_name(info.mode));
    channel_lines(&mut out, "IN", info.channel(Channel::In));
    channel_lines(&mut out, "OUT", info.channel(Channel::Out));

    out
}
