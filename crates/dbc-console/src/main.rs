//! xHCI Debug Capability console reader
//!
//! Waits for the DbC device to show up on the USB bus, claims its debug
//! interface, and prints everything that arrives on the bulk IN endpoint.
//! Runs until killed.

mod config;
mod console;
mod device;
mod error;
mod platform;
mod stream;

use anyhow::{Context, Result};
use clap::Parser;
use common::{parse_hex_or_dec_u8, parse_hex_or_dec_u16, setup_logging};
use config::ConsoleConfig;
use console::run_console;
use device::{DeviceIds, RusbBus, UsbBus};
use platform::Platform;
use std::io;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "dbc-console")]
#[command(
    author,
    version,
    about = "Stream the xHCI Debug Capability console to stdout"
)]
#[command(long_about = "
Polls the USB bus until the xHCI Debug Capability device (1d6b:0010 by
default) appears, claims its debug interface, and prints every byte read
from the bulk IN endpoint as a character. Read errors are ignored and the
reader keeps going until it is killed.

EXAMPLES:
    # Wait for the debug device and stream its console
    dbc-console

    # Give up if the device has not appeared within 30 seconds
    dbc-console --max-wait-secs 30

    # Show what is on the bus
    dbc-console --list-devices

CONFIGURATION:
    The reader looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/xen-pv-tools/dbc-console.toml
    3. /etc/xen-pv-tools/dbc-console.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List USB devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Vendor ID of the debug device (hex or decimal)
    #[arg(long, value_name = "ID", value_parser = parse_hex_or_dec_u16)]
    vendor_id: Option<u16>,

    /// Product ID of the debug device (hex or decimal)
    #[arg(long, value_name = "ID", value_parser = parse_hex_or_dec_u16)]
    product_id: Option<u16>,

    /// Interface number to claim
    #[arg(long, value_name = "N", value_parser = parse_hex_or_dec_u8)]
    interface: Option<u8>,

    /// Bulk IN endpoint address
    #[arg(long, value_name = "ADDR", value_parser = parse_hex_or_dec_u8)]
    endpoint: Option<u8>,

    /// Bytes requested per read
    #[arg(long, value_name = "BYTES")]
    chunk_size: Option<usize>,

    /// Sleep between discovery attempts, in milliseconds
    #[arg(long, value_name = "MS")]
    poll_interval_ms: Option<u64>,

    /// Give up discovery after this many seconds (default: wait forever)
    #[arg(long, value_name = "SECS")]
    max_wait_secs: Option<u64>,

    /// Timeout of a single read, in milliseconds
    #[arg(long, value_name = "MS")]
    read_timeout_ms: Option<u64>,

    /// Stop streaming after this many seconds (default: run until killed)
    #[arg(long, value_name = "SECS")]
    max_session_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = ConsoleConfig::default();
        let path = ConsoleConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        let path = PathBuf::from(shellexpand::tilde(path).as_ref());
        ConsoleConfig::load(Some(path)).context("Failed to load configuration")?
    } else {
        ConsoleConfig::load_or_default().context("Failed to load configuration")?
    };
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.general.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("dbc-console v{}", env!("CARGO_PKG_VERSION"));

    let platform = Platform::current();
    let settings = config.settings();

    if args.list_devices {
        platform.ensure_supported()?;
        let bus = RusbBus::new()?;
        return list_devices(&bus, &settings.ids);
    }

    let stdout = io::stdout();
    let stats = run_console(platform, RusbBus::new, &settings, &mut stdout.lock())
        .context("Debug console session failed")?;

    info!(
        "Session ended: {} bytes in {} chunks, {} read errors ignored",
        stats.bytes, stats.chunks, stats.dropped_errors
    );
    Ok(())
}

/// List USB devices and exit
fn list_devices<B: UsbBus>(bus: &B, ids: &DeviceIds) -> Result<()> {
    let devices = bus.list().context("Failed to list USB devices")?;

    if devices.is_empty() {
        println!("No USB devices found.");
        return Ok(());
    }

    println!("Found {} USB device(s), * = {}:\n", devices.len(), ids);
    for device in &devices {
        println!("{}", device.format(ids));
    }
    Ok(())
}

/// CLI flags win over config file values
fn apply_overrides(config: &mut ConsoleConfig, args: &Args) {
    let device = &mut config.device;
    if let Some(vendor_id) = args.vendor_id {
        device.vendor_id = vendor_id;
    }
    if let Some(product_id) = args.product_id {
        device.product_id = product_id;
    }
    if let Some(interface) = args.interface {
        device.interface = interface;
    }
    if let Some(endpoint) = args.endpoint {
        device.endpoint = endpoint;
    }
    if let Some(chunk_size) = args.chunk_size {
        device.chunk_size = chunk_size;
    }

    let timing = &mut config.timing;
    if let Some(interval) = args.poll_interval_ms {
        timing.poll_interval_ms = interval;
    }
    if args.max_wait_secs.is_some() {
        timing.max_wait_secs = args.max_wait_secs;
    }
    if let Some(timeout) = args.read_timeout_ms {
        timing.read_timeout_ms = timeout;
    }
    if args.max_session_secs.is_some() {
        timing.max_session_secs = args.max_session_secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceSummary;
    use crate::device::mock::{FakeBus, ScriptedEndpoint};

    #[test]
    fn test_no_args_is_valid() {
        let args = Args::try_parse_from(["dbc-console"]).unwrap();
        let mut config = ConsoleConfig::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.device.vendor_id, 0x1D6B);
        assert_eq!(config.device.endpoint, 0x81);
        assert!(config.timing.max_wait_secs.is_none());
    }

    #[test]
    fn test_overrides_accept_hex() {
        let args = Args::try_parse_from([
            "dbc-console",
            "--vendor-id",
            "0x0483",
            "--endpoint",
            "0x82",
            "--chunk-size",
            "512",
            "--max-wait-secs",
            "5",
        ])
        .unwrap();
        let mut config = ConsoleConfig::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.device.vendor_id, 0x0483);
        assert_eq!(config.device.product_id, 0x0010);
        assert_eq!(config.device.endpoint, 0x82);
        assert_eq!(config.device.chunk_size, 512);
        assert_eq!(config.timing.max_wait_secs, Some(5));
    }

    #[test]
    fn test_bad_hex_rejected_by_parser() {
        assert!(Args::try_parse_from(["dbc-console", "--vendor-id", "0xnope"]).is_err());
        assert!(Args::try_parse_from(["dbc-console", "--endpoint", "0x181"]).is_err());
    }

    #[test]
    fn test_list_devices_uses_bus() {
        let mut bus = FakeBus::new(None, ScriptedEndpoint::default());
        bus.devices.push(DeviceSummary {
            bus_number: 1,
            address: 2,
            vendor_id: 0x1d6b,
            product_id: 0x0010,
            manufacturer: None,
            product: None,
        });
        let ids = ConsoleConfig::default().settings().ids;

        assert!(list_devices(&bus, &ids).is_ok());
        assert_eq!(bus.find_calls.get(), 0);
    }
}
