//! Host platform capability check
//!
//! The reader relies on libusb being able to detach the kernel's DbC serial
//! driver and claim the interface, which only works on Linux. Windows has its
//! own PowerShell-based reader.

use crate::error::ConsoleError;
use std::fmt;

const WINDOWS_HINT: &str = "use the PowerShell DbC reader script on Windows hosts";
const OTHER_HINT: &str = "the debug console reader only runs on Linux";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Windows,
    Other(&'static str),
}

impl Platform {
    /// Platform this binary was built for
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &'static str) -> Self {
        match os {
            "linux" => Platform::Linux,
            "windows" => Platform::Windows,
            other => Platform::Other(other),
        }
    }

    /// Fail with [`ConsoleError::UnsupportedPlatform`] unless reading is possible here
    pub fn ensure_supported(self) -> Result<(), ConsoleError> {
        let hint = match self {
            Platform::Linux => return Ok(()),
            Platform::Windows => WINDOWS_HINT,
            Platform::Other(_) => OTHER_HINT,
        };
        Err(ConsoleError::UnsupportedPlatform {
            platform: self.to_string(),
            hint,
        })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Linux => f.write_str("linux"),
            Platform::Windows => f.write_str("windows"),
            Platform::Other(os) => f.write_str(os),
        }
    }
}
