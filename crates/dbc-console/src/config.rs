//! Debug console configuration management

use crate::console::ConsoleSettings;
use crate::device::DeviceIds;
use crate::stream::StreamSettings;
use anyhow::{Context, Result, anyhow};
use common::WaitPolicy;
use common::ids::serde_hex::{hex_u8, hex_u16};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "dbc-console.toml";

/// Largest read buffer accepted for one bulk transfer
pub const MAX_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub timing: TimingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    #[serde(default = "GeneralSettings::default_log_level")]
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

impl GeneralSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

/// USB identifiers of the debug device
///
/// The defaults are the xHCI Debug Capability's: Linux Foundation vendor
/// 0x1D6B, product 0x0010, bulk IN endpoint 0x81 on interface 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default = "DeviceSettings::default_vendor_id", with = "hex_u16")]
    pub vendor_id: u16,
    #[serde(default = "DeviceSettings::default_product_id", with = "hex_u16")]
    pub product_id: u16,
    #[serde(default, with = "hex_u8")]
    pub interface: u8,
    #[serde(default = "DeviceSettings::default_endpoint", with = "hex_u8")]
    pub endpoint: u8,
    #[serde(default = "DeviceSettings::default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            vendor_id: Self::default_vendor_id(),
            product_id: Self::default_product_id(),
            interface: 0x00,
            endpoint: Self::default_endpoint(),
            chunk_size: Self::default_chunk_size(),
        }
    }
}

impl DeviceSettings {
    fn default_vendor_id() -> u16 {
        0x1D6B
    }

    fn default_product_id() -> u16 {
        0x0010
    }

    fn default_endpoint() -> u8 {
        0x81
    }

    fn default_chunk_size() -> usize {
        0x40
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    /// Sleep between discovery attempts
    #[serde(default = "TimingSettings::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Stop waiting for the device after this long (unset = forever)
    #[serde(default)]
    pub max_wait_secs: Option<u64>,
    #[serde(default = "TimingSettings::default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// End the read loop after this long (unset = run until killed)
    #[serde(default)]
    pub max_session_secs: Option<u64>,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            max_wait_secs: None,
            read_timeout_ms: Self::default_read_timeout_ms(),
            max_session_secs: None,
        }
    }
}

impl TimingSettings {
    fn default_poll_interval_ms() -> u64 {
        10
    }

    fn default_read_timeout_ms() -> u64 {
        1000
    }
}

impl ConsoleConfig {
    /// Load configuration from `path`, or from the first standard location
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => common::locate_config(CONFIG_FILE)
                .ok_or_else(|| anyhow!("No configuration file found"))?,
        };

        let config: ConsoleConfig = common::read_toml(&config_path)?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load the first configuration file found, or defaults if there is none
    ///
    /// A file that exists but does not parse or validate is an error.
    pub fn load_or_default() -> Result<Self> {
        Self::load_first(common::config_candidates(CONFIG_FILE))
    }

    fn load_first(candidates: Vec<PathBuf>) -> Result<Self> {
        match common::find_config(candidates) {
            Some(path) => Self::load(Some(path)),
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        common::write_toml(self, path)?;
        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        common::user_config_path(CONFIG_FILE)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        common::validate_log_level(&self.general.log_level)?;

        if self.device.endpoint & 0x80 == 0 {
            return Err(anyhow!(
                "Endpoint {:#04x} is an OUT endpoint, expected an IN endpoint (bit 7 set)",
                self.device.endpoint
            ));
        }

        if self.device.chunk_size == 0 || self.device.chunk_size > MAX_CHUNK_SIZE {
            return Err(anyhow!(
                "chunk_size must be between 1 and {} bytes, got {}",
                MAX_CHUNK_SIZE,
                self.device.chunk_size
            ));
        }

        if self.timing.poll_interval_ms == 0 {
            return Err(anyhow!("poll_interval_ms must be greater than 0"));
        }

        Ok(())
    }

    /// Resolve into runtime settings
    pub fn settings(&self) -> ConsoleSettings {
        let timing = &self.timing;
        let interval = Duration::from_millis(timing.poll_interval_ms);

        ConsoleSettings {
            ids: DeviceIds {
                vendor_id: self.device.vendor_id,
                product_id: self.device.product_id,
            },
            interface: self.device.interface,
            discovery: match timing.max_wait_secs {
                Some(secs) => WaitPolicy::bounded(interval, Duration::from_secs(secs)),
                None => WaitPolicy::forever(interval),
            },
            stream: StreamSettings {
                endpoint: self.device.endpoint,
                chunk_size: self.device.chunk_size,
                read_timeout: Duration::from_millis(timing.read_timeout_ms),
            },
            max_session: timing.max_session_secs.map(Duration::from_secs),
        }
    }
}
