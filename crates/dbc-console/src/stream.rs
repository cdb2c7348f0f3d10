//! Console streaming loop
//!
//! Reads fixed-size chunks from the debug device's IN endpoint and prints
//! every byte as one character. Read errors of any kind are dropped and the
//! next read starts right away; the session only ends when the process is
//! killed or the optional session limit runs out.

use crate::error::ConsoleError;
use common::Deadline;
use rusb::{DeviceHandle, UsbContext};
use std::io::Write;
use std::time::Duration;
use tracing::trace;

/// Source of console data
pub trait ConsoleEndpoint {
    /// Read up to `buf.len()` bytes from `endpoint`
    fn read_chunk(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, rusb::Error>;
}

impl<T: UsbContext> ConsoleEndpoint for DeviceHandle<T> {
    fn read_chunk(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, rusb::Error> {
        self.read_bulk(endpoint, buf, timeout)
    }
}

/// Parameters of the read loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    pub endpoint: u8,
    pub chunk_size: usize,
    pub read_timeout: Duration,
}

/// Counters for a finished session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    pub chunks: u64,
    pub bytes: u64,
    pub dropped_errors: u64,
}

/// Stream console output from `endpoint` to `out` until `deadline` expires
///
/// With [`Deadline::never`] this does not return unless writing to `out`
/// fails.
pub fn stream_console<E, W>(
    endpoint: &mut E,
    out: &mut W,
    settings: &StreamSettings,
    deadline: Deadline,
) -> Result<StreamStats, ConsoleError>
where
    E: ConsoleEndpoint,
    W: Write,
{
    let mut buf = vec![0u8; settings.chunk_size];
    let mut stats = StreamStats::default();
    let mut text = String::with_capacity(settings.chunk_size * 2);

    while !deadline.expired() {
        match endpoint.read_chunk(settings.endpoint, &mut buf, settings.read_timeout) {
            Ok(len) => {
                stats.chunks += 1;
                stats.bytes += len as u64;
                text.clear();
                text.extend(buf[..len].iter().copied().map(char::from));
                out.write_all(text.as_bytes())?;
                out.flush()?;
            }
            Err(e) => {
                stats.dropped_errors += 1;
                trace!("Ignoring read error on endpoint {:#04x}: {}", settings.endpoint, e);
            }
        }
    }

    Ok(stats)
}
