//! Integration tests for configuration file discovery

use common::{config_candidates, find_config, user_config_path};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_candidates_order() {
    let candidates = config_candidates("dbc-console.toml");
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0], user_config_path("dbc-console.toml"));
    assert!(candidates[1].ends_with("xen-pv-tools/dbc-console.toml"));
    assert!(candidates[1].starts_with("/etc"));
}

#[test]
fn test_find_config_picks_first_existing() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.toml");
    let second = dir.path().join("second.toml");
    let third = dir.path().join("third.toml");
    fs::write(&second, "").unwrap();
    fs::write(&third, "").unwrap();

    let found = find_config(vec![missing, second.clone(), third]);
    assert_eq!(found, Some(second));
}

#[test]
fn test_find_config_none_when_nothing_exists() {
    let dir = tempdir().unwrap();
    let found = find_config(vec![dir.path().join("a.toml"), dir.path().join("b.toml")]);
    assert!(found.is_none());
}
