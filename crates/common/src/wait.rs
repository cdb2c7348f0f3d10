//! Wait policy for polling loops
//!
//! Both tools wait on things outside their control: a USB device showing up
//! on the bus, or a console session running until the operator kills it.
//! [`WaitPolicy`] makes the poll interval and the optional cutoff explicit.
//! Without a cutoff the wait is unbounded.

use crate::{Error, Result};
use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;

/// Poll interval plus optional maximum wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Sleep between attempts
    pub interval: Duration,
    /// Give up after this long (None = wait forever)
    pub max_wait: Option<Duration>,
}

impl WaitPolicy {
    /// Unbounded wait with the given interval
    pub fn forever(interval: Duration) -> Self {
        Self {
            interval,
            max_wait: None,
        }
    }

    /// Bounded wait
    pub fn bounded(interval: Duration, max_wait: Duration) -> Self {
        Self {
            interval,
            max_wait: Some(max_wait),
        }
    }

    /// Start the clock for this policy
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.max_wait)
    }
}

/// A point in time after which a wait should stop, or never
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn after(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn never() -> Self {
        Self::after(None)
    }

    pub fn expired(&self) -> bool {
        match self.limit {
            Some(limit) => self.started.elapsed() >= limit,
            None => false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Call `attempt` until it yields a value, sleeping `policy.interval` in between
///
/// Returns [`Error::Timeout`] naming `what` once `policy.max_wait` has passed.
/// `attempt` always runs at least once.
pub fn poll_until<T, F>(policy: &WaitPolicy, what: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Option<T>,
{
    let deadline = policy.deadline();
    let mut attempts: u64 = 0;

    loop {
        attempts += 1;
        if let Some(value) = attempt() {
            trace!("{} ready after {} attempt(s)", what, attempts);
            return Ok(value);
        }

        if deadline.expired() {
            return Err(Error::Timeout {
                what: what.to_string(),
                waited: deadline.elapsed(),
            });
        }

        thread::sleep(policy.interval);
    }
}
