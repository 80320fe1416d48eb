//! Tests for locked atomic writes

use ext_fs::{NormalizedPath, io};
use tempfile::tempdir;

#[test]
fn test_write_atomic_creates_parent_dirs() {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join("managed/nested/managed.toml"));

    io::write_text(&path, "[extensions]\n").unwrap();

    assert_eq!(io::read_text(&path).unwrap(), "[extensions]\n");
}

#[test]
fn test_write_atomic_replaces_content() {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join("state.toml"));

    io::write_text(&path, "first").unwrap();
    io::write_text(&path, "second").unwrap();

    assert_eq!(io::read_text(&path).unwrap(), "second");
}

#[test]
fn test_write_atomic_leaves_no_temp_files() {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join("state.toml"));

    io::write_atomic(&path, b"x = 1").unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[test]
fn test_read_missing_file_reports_path() {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join("missing.toml"));

    let err = io::read_text(&path).unwrap_err();
    assert!(err.to_string().contains("missing.toml"));
}
