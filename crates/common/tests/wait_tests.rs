//! Integration tests for the wait policy
//!
//! Covers:
//! - Immediate success without sleeping
//! - Success after several attempts
//! - Bounded waits giving up with a Timeout error
//! - Deadline bookkeeping

use common::{Deadline, Error, WaitPolicy, poll_until};
use std::time::{Duration, Instant};

mod poll {
    use super::*;

    #[test]
    fn test_ready_on_first_attempt() {
        let policy = WaitPolicy::forever(Duration::from_secs(60));
        let start = Instant::now();

        let value = poll_until(&policy, "widget", || Some(42)).unwrap();

        assert_eq!(value, 42);
        // Must not have slept a full interval
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_ready_after_retries() {
        let policy = WaitPolicy::forever(Duration::from_millis(1));
        let mut calls = 0;

        let value = poll_until(&policy, "widget", || {
            calls += 1;
            (calls == 5).then_some("found")
        })
        .unwrap();

        assert_eq!(value, "found");
        assert_eq!(calls, 5);
    }

    #[test]
    fn test_bounded_wait_times_out() {
        let policy = WaitPolicy::bounded(Duration::from_millis(2), Duration::from_millis(20));
        let mut calls = 0;

        let result: common::Result<()> = poll_until(&policy, "debug device", || {
            calls += 1;
            None
        });

        match result {
            Err(Error::Timeout { what, waited }) => {
                assert_eq!(what, "debug device");
                assert!(waited >= Duration::from_millis(20));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(calls >= 2);
    }

    #[test]
    fn test_zero_max_wait_still_attempts_once() {
        let policy = WaitPolicy::bounded(Duration::from_millis(1), Duration::ZERO);
        let mut calls = 0;

        let result: common::Result<()> = poll_until(&policy, "anything", || {
            calls += 1;
            None
        });

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}

mod deadline {
    use super::*;

    #[test]
    fn test_never_expires() {
        let deadline = Deadline::never();
        std::thread::sleep(Duration::from_millis(5));
        assert!(!deadline.expired());
    }

    #[test]
    fn test_expires_after_limit() {
        let deadline = Deadline::after(Some(Duration::from_millis(5)));
        std::thread::sleep(Duration::from_millis(10));
        assert!(deadline.expired());
        assert!(deadline.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_policy_deadline_uses_max_wait() {
        assert!(!WaitPolicy::forever(Duration::from_millis(10)).deadline().expired());
        assert!(
            WaitPolicy::bounded(Duration::from_millis(10), Duration::ZERO)
                .deadline()
                .expired()
        );
    }
}
