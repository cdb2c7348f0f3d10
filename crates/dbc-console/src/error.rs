//! Debug console error types

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("{platform} is not supported: {hint}")]
    UnsupportedPlatform {
        platform: String,
        hint: &'static str,
    },

    #[error("No device {vendor_id:04x}:{product_id:04x} found after {waited:?}")]
    DeviceNotFound {
        vendor_id: u16,
        product_id: u16,
        waited: Duration,
    },

    #[error("USB error while trying to {action}: {source}")]
    Usb {
        action: &'static str,
        #[source]
        source: rusb::Error,
    },

    #[error(transparent)]
    Wait(#[from] common::Error),

    #[error("Failed to write console output: {0}")]
    Output(#[from] std::io::Error),
}

impl ConsoleError {
    pub(crate) fn usb(action: &'static str) -> impl FnOnce(rusb::Error) -> Self {
        move |source| Self::Usb { action, source }
    }
}
