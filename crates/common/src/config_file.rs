//! TOML configuration files
//!
//! Reading, writing and locating the per-tool TOML files. Validation of the
//! loaded values stays with each tool.

use crate::config_path::{config_candidates, find_config};
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Parse the TOML file at `path`
pub fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `value` to `path` as TOML, creating parent directories
pub fn write_toml<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(value)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::ConfigWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, content).map_err(|source| Error::ConfigWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// First standard location of `file_name` that exists
pub fn locate_config(file_name: &str) -> Option<PathBuf> {
    find_config(config_candidates(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_write_then_read_nested() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("sample.toml");
        let sample = Sample {
            name: "dbc".to_string(),
            count: 3,
        };

        write_toml(&sample, &path).unwrap();

        assert_eq!(read_toml::<Sample>(&path).unwrap(), sample);
    }

    #[test]
    fn test_read_errors_name_the_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            read_toml::<Sample>(&missing),
            Err(Error::ConfigRead { .. })
        ));

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "name = [unterminated").unwrap();
        let err = read_toml::<Sample>(&broken).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }
}
