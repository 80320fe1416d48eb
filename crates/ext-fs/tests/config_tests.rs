//! Tests for format-agnostic config loading

use ext_fs::{ConfigStore, Error, NormalizedPath};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde::{Deserialize, Serialize};
use tempfile::tempdir;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Sample {
    host_version: String,
    #[serde(default)]
    scan: Vec<String>,
}

fn sample() -> Sample {
    Sample {
        host_version: "9.10.0".to_string(),
        scan: vec!["/opt/ext".to_string()],
    }
}

#[rstest]
#[case("settings.toml")]
#[case("settings.json")]
#[case("settings.yaml")]
#[case("settings.yml")]
fn test_save_then_load_each_format(#[case] file_name: &str) {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join(file_name));
    let store = ConfigStore::new();

    store.save(&path, &sample()).unwrap();
    let loaded: Sample = store.load(&path).unwrap();

    assert_eq!(loaded, sample());
}

#[test]
fn test_unsupported_extension() {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join("settings.ini"));
    std::fs::write(path.to_native(), "host_version=1").unwrap();

    let err = ConfigStore::new().load::<Sample>(&path).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat { ref extension } if extension == "ini"));
}

#[test]
fn test_parse_error_names_format() {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join("settings.toml"));
    std::fs::write(path.to_native(), "host_version = [").unwrap();

    let err = ConfigStore::new().load::<Sample>(&path).unwrap_err();
    assert!(matches!(err, Error::ConfigParse { ref format, .. } if format == "TOML"));
}

#[test]
fn test_load_or_default_missing_file() {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join("absent.toml"));

    let loaded: Sample = ConfigStore::new().load_or_default(&path).unwrap();
    assert_eq!(loaded, Sample::default());
}
