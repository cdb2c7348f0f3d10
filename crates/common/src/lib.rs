//! Common utilities for xen-pv-tools
//!
//! This crate provides the functionality shared by the header importer and the
//! debug-console reader: error types, logging setup, hex/decimal identifier
//! parsing, configuration file discovery and TOML load/save, and the wait
//! policy used by every "wait until something external is ready" loop.

pub mod config_file;
pub mod config_path;
pub mod error;
pub mod ids;
pub mod logging;
pub mod wait;

pub use config_file::{locate_config, read_toml, write_toml};
pub use config_path::{config_candidates, find_config, user_config_path};
pub use error::{Error, Result};
pub use ids::{parse_hex_or_dec_u8, parse_hex_or_dec_u16};
pub use logging::{VALID_LOG_LEVELS, setup_logging, validate_log_level};
pub use wait::{Deadline, WaitPolicy, poll_until};
