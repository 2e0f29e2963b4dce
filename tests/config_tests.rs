//! Tests for config file loading.

use magikgpu::Error;
use magikgpu::config::{Config, config_path};
use magikgpu::discover::DiscoverConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// Defaults
// =============================================================================

#[test]
fn test_defaults() {
    let config = Config::default();

    assert_eq!(config.nvidia_container_runtime.discover_mode, "auto");
    assert_eq!(config.nvidia_container_runtime.log_level, "info");
    assert_eq!(config.nvidia_ctk.path, "nvidia-ctk");
    assert_eq!(config.nvidia_container_cli.root, "");
    assert_eq!(config.root(), PathBuf::from("/"));
}

#[test]
fn test_empty_file_yields_defaults() {
    assert_eq!(Config::from_toml("").unwrap(), Config::default());
}

#[test]
fn test_missing_file_yields_defaults() {
    let temp = TempDir::new().unwrap();
    let config = Config::load(&temp.path().join("config.toml")).unwrap();
    assert_eq!(config, Config::default());
}

// =============================================================================
// Parsing
// =============================================================================

#[test]
fn test_parse_kebab_case_keys() {
    let config = Config::from_toml(
        r#"
disable-require = false

[nvidia-container-cli]
root = "/run/nvidia/driver"
path = "/usr/bin/nvidia-container-cli"
ldconfig = "@/sbin/ldconfig"

[nvidia-container-runtime]
discover-mode = "csv"
log-level = "debug"
runtimes = ["docker-runc", "runc"]

[nvidia-ctk]
path = "/opt/bin/nvidia-ctk"
"#,
    )
    .unwrap();

    assert_eq!(config.root(), PathBuf::from("/run/nvidia/driver"));
    assert_eq!(
        config.nvidia_container_cli.path.as_deref(),
        Some("/usr/bin/nvidia-container-cli")
    );
    assert_eq!(config.nvidia_container_runtime.discover_mode, "csv");
    assert_eq!(config.nvidia_container_runtime.log_level, "debug");
    assert_eq!(config.nvidia_ctk.path, "/opt/bin/nvidia-ctk");
}

#[test]
fn test_partial_section_keeps_other_defaults() {
    let config = Config::from_toml("[nvidia-container-runtime]\nlog-level = \"warn\"\n").unwrap();

    assert_eq!(config.nvidia_container_runtime.discover_mode, "auto");
    assert_eq!(config.nvidia_container_runtime.log_level, "warn");
}

#[test]
fn test_load_invalid_toml() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(&path, "[nvidia-container-runtime\n").unwrap();

    let err = Config::load(&path).unwrap_err();
    assert!(matches!(err, Error::ConfigLoad { .. }));
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn test_load_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(&path, "[nvidia-container-cli]\nroot = \"/driver\"\n").unwrap();

    let config = Config::load(&path).unwrap();
    let discover = DiscoverConfig::from_config(&config);
    assert_eq!(discover.root, PathBuf::from("/driver"));
    assert_eq!(discover.nvidia_ctk_path, "nvidia-ctk");
}

// =============================================================================
// Location
// =============================================================================

#[test]
fn test_config_path_honors_xdg() {
    assert_eq!(
        config_path(Some("/home/user/.config")),
        Path::new("/home/user/.config/nvidia-container-runtime/config.toml")
    );
    assert_eq!(
        config_path(None),
        Path::new("/etc/nvidia-container-runtime/config.toml")
    );
    assert_eq!(
        config_path(Some("")),
        Path::new("/etc/nvidia-container-runtime/config.toml")
    );
}
