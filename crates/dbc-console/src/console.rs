//! Console session
//!
//! Platform gate, then discovery, then one-time setup, then the read loop.
//! Each phase is only reached if the previous one finished.

use crate::device::{DeviceIds, UsbBus, discover};
use crate::error::ConsoleError;
use crate::platform::Platform;
use crate::stream::{ConsoleEndpoint, StreamSettings, StreamStats, stream_console};
use common::{Deadline, WaitPolicy};
use std::io::Write;
use std::time::Duration;
use tracing::info;

/// Everything a session needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleSettings {
    pub ids: DeviceIds,
    pub interface: u8,
    pub discovery: WaitPolicy,
    pub stream: StreamSettings,
    /// End the read loop after this long (None = never)
    pub max_session: Option<Duration>,
}

/// Run one console session
///
/// `connect` creates the bus and is only called once the platform check has
/// passed, so unsupported hosts never touch USB.
pub fn run_console<B, F, W>(
    platform: Platform,
    connect: F,
    settings: &ConsoleSettings,
    out: &mut W,
) -> Result<StreamStats, ConsoleError>
where
    B: UsbBus,
    B::Handle: ConsoleEndpoint,
    F: FnOnce() -> Result<B, ConsoleError>,
    W: Write,
{
    platform.ensure_supported()?;

    let bus = connect()?;
    let device = discover(&bus, &settings.ids, &settings.discovery)?;
    let mut handle = bus.open(device, settings.interface)?;

    info!(
        "Streaming endpoint {:#04x} in {}-byte chunks",
        settings.stream.endpoint, settings.stream.chunk_size
    );
    stream_console(
        &mut handle,
        out,
        &settings.stream,
        Deadline::after(settings.max_session),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsoleConfig;
    use crate::device::mock::{FakeBus, ScriptedEndpoint};
    use std::cell::Cell;

    fn test_settings(max_wait: Option<Duration>) -> ConsoleSettings {
        let mut settings = ConsoleConfig::default().settings();
        settings.discovery = WaitPolicy {
            interval: Duration::from_millis(1),
            max_wait,
        };
        settings.max_session = Some(Duration::from_millis(30));
        settings
    }

    #[test]
    fn test_full_session() {
        let script = ScriptedEndpoint::new(vec![Ok(b"hello from xue\n".to_vec())]);
        let bus = FakeBus::new(Some(2), script);
        let mut out = Vec::new();

        let stats = run_console(
            Platform::Linux,
            || Ok(&bus),
            &test_settings(None),
            &mut out,
        )
        .unwrap();

        assert_eq!(out, b"hello from xue\n");
        assert_eq!(stats.chunks, 1);
        assert_eq!(*bus.opened.borrow(), vec![0x00]);
        assert_eq!(bus.find_calls.get(), 3);
    }

    #[test]
    fn test_never_found_means_never_opened() {
        let bus = FakeBus::new(None, ScriptedEndpoint::default());
        let mut out = Vec::new();

        let err = run_console(
            Platform::Linux,
            || Ok(&bus),
            &test_settings(Some(Duration::from_millis(20))),
            &mut out,
        )
        .unwrap_err();

        assert!(matches!(err, ConsoleError::DeviceNotFound { .. }));
        assert!(bus.opened.borrow().is_empty());
        assert!(out.is_empty());
    }

    #[test]
    fn test_unsupported_platform_skips_discovery() {
        let connected = Cell::new(false);
        let mut out = Vec::new();

        let err = run_console(
            Platform::Windows,
            || {
                connected.set(true);
                Ok(FakeBus::new(Some(0), ScriptedEndpoint::default()))
            },
            &test_settings(None),
            &mut out,
        )
        .unwrap_err();

        assert!(matches!(err, ConsoleError::UnsupportedPlatform { .. }));
        assert!(!connected.get());
    }

    #[test]
    fn test_connect_failure_propagates() {
        let mut out = Vec::new();
        let result = run_console::<FakeBus, _, _>(
            Platform::Linux,
            || {
                Err(ConsoleError::Usb {
                    action: "initialize libusb",
                    source: rusb::Error::NotSupported,
                })
            },
            &test_settings(None),
            &mut out,
        );

        assert!(matches!(result, Err(ConsoleError::Usb { .. })));
    }
}
