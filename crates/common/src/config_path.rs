//! Configuration file discovery
//!
//! Every tool looks for `<tool>.toml` in the same places:
//! 1. `~/.config/xen-pv-tools/<tool>.toml` (or the platform equivalent)
//! 2. `/etc/xen-pv-tools/<tool>.toml`

use std::path::{Path, PathBuf};

const APP_DIR: &str = "xen-pv-tools";

/// Per-user configuration path for `file_name`
pub fn user_config_path(file_name: &str) -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join(APP_DIR).join(file_name)
    } else {
        PathBuf::from(".config").join(APP_DIR).join(file_name)
    }
}

/// Standard locations for `file_name`, in lookup order
pub fn config_candidates(file_name: &str) -> Vec<PathBuf> {
    vec![
        user_config_path(file_name),
        Path::new("/etc").join(APP_DIR).join(file_name),
    ]
}

/// First candidate that exists on disk
pub fn find_config<I>(candidates: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    candidates.into_iter().find(|p| p.exists())
}
