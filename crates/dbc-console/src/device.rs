//! USB device discovery and setup
//!
//! Discovery only looks at device descriptors; nothing is opened until the
//! first matching device has been found. Opening then does the one-time
//! setup: detach any kernel driver from the debug interface, select the first
//! configuration, and claim the interface.

use crate::error::ConsoleError;
use common::{WaitPolicy, poll_until};
use rusb::{Context, Device, DeviceHandle, UsbContext};
use std::fmt;
use tracing::{debug, info, warn};

/// Vendor/product pair identifying the debug device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIds {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl fmt::Display for DeviceIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// One line of `--list-devices` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub bus_number: u8,
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl DeviceSummary {
    pub fn matches(&self, ids: &DeviceIds) -> bool {
        self.vendor_id == ids.vendor_id && self.product_id == ids.product_id
    }

    /// Format for listing, marking devices the reader would pick
    pub fn format(&self, ids: &DeviceIds) -> String {
        format!(
            "{} Bus {:03} Device {:03}: {:04x}:{:04x} - {} {}",
            if self.matches(ids) { "*" } else { " " },
            self.bus_number,
            self.address,
            self.vendor_id,
            self.product_id,
            self.manufacturer
                .as_deref()
                .unwrap_or("Unknown Manufacturer"),
            self.product.as_deref().unwrap_or("Unknown Product")
        )
    }
}

/// Access to the host's USB bus
pub trait UsbBus {
    /// A device found on the bus but not opened yet
    type Device;
    /// An opened, configured device ready for reading
    type Handle;

    /// First device matching `ids`, if any is present right now
    fn find(&self, ids: &DeviceIds) -> Result<Option<Self::Device>, ConsoleError>;

    /// Open `device` and make `interface` ready for transfers
    fn open(&self, device: Self::Device, interface: u8) -> Result<Self::Handle, ConsoleError>;

    /// Every device currently on the bus
    fn list(&self) -> Result<Vec<DeviceSummary>, ConsoleError>;
}

impl<B: UsbBus> UsbBus for &B {
    type Device = B::Device;
    type Handle = B::Handle;

    fn find(&self, ids: &DeviceIds) -> Result<Option<Self::Device>, ConsoleError> {
        (**self).find(ids)
    }

    fn open(&self, device: Self::Device, interface: u8) -> Result<Self::Handle, ConsoleError> {
        (**self).open(device, interface)
    }

    fn list(&self) -> Result<Vec<DeviceSummary>, ConsoleError> {
        (**self).list()
    }
}

/// Poll the bus until a device matching `ids` shows up
///
/// Enumeration errors count as "not found yet". Returns
/// [`ConsoleError::DeviceNotFound`] only when `policy` has a cutoff.
pub fn discover<B: UsbBus>(
    bus: &B,
    ids: &DeviceIds,
    policy: &WaitPolicy,
) -> Result<B::Device, ConsoleError> {
    info!("Waiting for debug device {}", ids);

    poll_until(policy, "debug device", || match bus.find(ids) {
        Ok(found) => found,
        Err(e) => {
            debug!("Enumeration failed, retrying: {}", e);
            None
        }
    })
    .map_err(|e| match e {
        common::Error::Timeout { waited, .. } => ConsoleError::DeviceNotFound {
            vendor_id: ids.vendor_id,
            product_id: ids.product_id,
            waited,
        },
        other => ConsoleError::Wait(other),
    })
}

/// libusb-backed bus
pub struct RusbBus {
    context: Context,
}

impl RusbBus {
    pub fn new() -> Result<Self, ConsoleError> {
        let context = Context::new().map_err(ConsoleError::usb("initialize libusb"))?;
        Ok(Self { context })
    }
}

impl UsbBus for RusbBus {
    type Device = Device<Context>;
    type Handle = DeviceHandle<Context>;

    fn find(&self, ids: &DeviceIds) -> Result<Option<Self::Device>, ConsoleError> {
        let devices = self
            .context
            .devices()
            .map_err(ConsoleError::usb("enumerate devices"))?;

        for device in devices.iter() {
            let Ok(desc) = device.device_descriptor() else {
                continue;
            };
            if desc.vendor_id() == ids.vendor_id && desc.product_id() == ids.product_id {
                debug!(
                    "Found {} at bus {:03} address {:03}",
                    ids,
                    device.bus_number(),
                    device.address()
                );
                return Ok(Some(device));
            }
        }

        Ok(None)
    }

    fn open(&self, device: Self::Device, interface: u8) -> Result<Self::Handle, ConsoleError> {
        let mut handle = device.open().map_err(ConsoleError::usb("open device"))?;

        match handle.kernel_driver_active(interface) {
            Ok(true) => {
                debug!("Detaching kernel driver from interface {}", interface);
                if let Err(e) = handle.detach_kernel_driver(interface) {
                    warn!(
                        "Failed to detach kernel driver from interface {}: {}",
                        interface, e
                    );
                }
            }
            Ok(false) => {}
            Err(e) => {
                debug!(
                    "Could not check kernel driver status for interface {}: {}",
                    interface, e
                );
            }
        }

        let config = device
            .config_descriptor(0)
            .map_err(ConsoleError::usb("read configuration descriptor"))?;
        handle
            .set_active_configuration(config.number())
            .map_err(ConsoleError::usb("set configuration"))?;
        handle
            .claim_interface(interface)
            .map_err(ConsoleError::usb("claim interface"))?;

        info!(
            "Opened debug device at bus {:03} address {:03}, configuration {}, interface {}",
            device.bus_number(),
            device.address(),
            config.number(),
            interface
        );
        Ok(handle)
    }

    fn list(&self) -> Result<Vec<DeviceSummary>, ConsoleError> {
        let devices = self
            .context
            .devices()
            .map_err(ConsoleError::usb("enumerate devices"))?;

        let mut summaries = Vec::new();
        for device in devices.iter() {
            let desc = match device.device_descriptor() {
                Ok(desc) => desc,
                Err(e) => {
                    warn!("Skipping device without descriptor: {}", e);
                    continue;
                }
            };

            // Strings need an open handle; not every device allows that
            let (manufacturer, product) = match device.open() {
                Ok(handle) => (
                    handle.read_manufacturer_string_ascii(&desc).ok(),
                    handle.read_product_string_ascii(&desc).ok(),
                ),
                Err(_) => (None, None),
            };

            summaries.push(DeviceSummary {
                bus_number: device.bus_number(),
                address: device.address(),
                vendor_id: desc.vendor_id(),
                product_id: desc.product_id(),
                manufacturer,
                product,
            });
        }

        Ok(summaries)
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{FakeBus, ScriptedEndpoint};
    use super::*;
    use std::time::Duration;

    const DBC: DeviceIds = DeviceIds {
        vendor_id: 0x1d6b,
        product_id: 0x0010,
    };

    #[test]
    fn test_discover_after_retries() {
        let bus = FakeBus::new(Some(3), ScriptedEndpoint::default());
        let policy = WaitPolicy::forever(Duration::from_millis(1));

        discover(&bus, &DBC, &policy).unwrap();

        assert_eq!(bus.find_calls.get(), 4);
        assert!(bus.opened.borrow().is_empty());
    }

    #[test]
    fn test_discover_gives_up_with_cutoff() {
        let bus = FakeBus::new(None, ScriptedEndpoint::default());
        let policy = WaitPolicy::bounded(Duration::from_millis(1), Duration::from_millis(15));

        let err = discover(&bus, &DBC, &policy).unwrap_err();

        match err {
            ConsoleError::DeviceNotFound {
                vendor_id,
                product_id,
                ..
            } => {
                assert_eq!(vendor_id, 0x1d6b);
                assert_eq!(product_id, 0x0010);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(bus.find_calls.get() > 1);
    }

    #[test]
    fn test_summary_format_marks_match() {
        let summary = DeviceSummary {
            bus_number: 2,
            address: 7,
            vendor_id: 0x1d6b,
            product_id: 0x0010,
            manufacturer: Some("Linux Foundation".to_string()),
            product: None,
        };
        assert_eq!(
            summary.format(&DBC),
            "* Bus 002 Device 007: 1d6b:0010 - Linux Foundation Unknown Product"
        );

        let other = DeviceSummary {
            product_id: 0x0003,
            ..summary
        };
        assert!(other.format(&DBC).starts_with("  Bus 002"));
    }

    #[test]
    fn test_ids_display() {
        assert_eq!(DBC.to_string(), "1d6b:0010");
    }
}
