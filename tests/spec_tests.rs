//! Tests for OCI spec loading and flushing.

use magikgpu::Error;
use magikgpu::edits::EditSet;
use magikgpu::spec::{FileSpec, SpecSource};
use std::fs;
use tempfile::TempDir;

const CONFIG_JSON: &str = r#"{
    "ociVersion": "1.0.2",
    "process": {
        "terminal": false,
        "user": {"uid": 0, "gid": 0},
        "args": ["sh"],
        "env": ["PATH=/usr/bin", "NVIDIA_VISIBLE_DEVICES=all"],
        "cwd": "/"
    },
    "root": {"path": "rootfs", "readonly": true},
    "hostname": "gpu",
    "mounts": [
        {"destination": "/proc", "type": "proc", "source": "proc"}
    ],
    "annotations": {"io.kubernetes.pod.name": "trainer"},
    "linux": {
        "namespaces": [{"type": "pid"}, {"type": "mount"}],
        "resources": {"devices": [{"allow": false, "access": "rwm"}]}
    }
}"#;

fn bundle() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.json"), CONFIG_JSON).unwrap();
    dir
}

#[test]
fn test_load_reads_env() {
    let dir = bundle();
    let mut source = FileSpec::from_bundle(dir.path());

    let spec = source.load().unwrap();
    assert_eq!(spec.lookup_env("NVIDIA_VISIBLE_DEVICES"), Some("all"));
    assert_eq!(spec.mounts[0].mount_type.as_deref(), Some("proc"));
}

#[test]
fn test_flush_preserves_unknown_fields() {
    let dir = bundle();
    let mut source = FileSpec::from_bundle(dir.path());
    source.load().unwrap();
    source.modify(&EditSet::default()).unwrap();
    source.flush().unwrap();

    let before: serde_json::Value = serde_json::from_str(CONFIG_JSON).unwrap();
    let after: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("config.json")).unwrap())
            .unwrap();
    assert_eq!(before, after);
    assert!(!dir.path().join("config.json.tmp").exists());
}

#[test]
fn test_modify_before_load() {
    let dir = bundle();
    let mut source = FileSpec::from_bundle(dir.path());

    assert!(matches!(
        source.modify(&EditSet::default()),
        Err(Error::SpecNotLoaded)
    ));
    assert!(matches!(source.flush(), Err(Error::SpecNotLoaded)));
}

#[test]
fn test_load_missing_bundle() {
    let dir = TempDir::new().unwrap();
    let mut source = FileSpec::from_bundle(dir.path());

    let err = source.load().unwrap_err();
    assert!(matches!(err, Error::SpecLoad { .. }));
}

#[test]
fn test_load_invalid_json() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.json"), "{not json").unwrap();
    let mut source = FileSpec::from_bundle(dir.path());

    assert!(matches!(source.load(), Err(Error::SpecLoad { .. })));
}

#[test]
fn test_failed_flush_removes_temp_file() {
    let dir = bundle();
    let config = dir.path().join("config.json");
    let mut source = FileSpec::from_bundle(dir.path());
    source.load().unwrap();

    // A non-empty directory in place of config.json makes the rename fail.
    fs::remove_file(&config).unwrap();
    fs::create_dir(&config).unwrap();
    fs::write(config.join("keep"), "").unwrap();

    let err = source.flush().unwrap_err();
    assert!(matches!(err, Error::SpecWrite { .. }));
    assert!(!dir.path().join("config.json.tmp").exists());
    assert!(config.join("keep").exists());
}
