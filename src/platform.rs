//! Platform detection and discover mode resolution.
//!
//! Decides which discovery strategy applies to the host. An explicitly
//! configured mode always wins; `auto` probes for Tegra markers:
//!
//! | Order | Evidence                                   | Result      |
//! |-------|--------------------------------------------|-------------|
//! | 1     | `/etc/nv_tegra_release` is a file          | Tegra (csv) |
//! | 2     | `/sys/devices/soc0/family` missing or dir  | legacy      |
//! | 3     | family file starts with `tegra` (any case) | Tegra (csv) |
//! | -     | otherwise                                  | legacy      |
//!
//! Missing or unreadable files are negative evidence, never errors.

use crate::constants::{TEGRA_FAMILY_FILE, TEGRA_FAMILY_PREFIX, TEGRA_RELEASE_FILE};
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Discovery strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoverMode {
    /// Resolve from platform evidence.
    Auto,
    /// Standard discrete-GPU hosts: inject the legacy prestart hook.
    Legacy,
    /// Tegra/Jetson hosts: mounts driven by L4T CSV files.
    Csv,
}

impl DiscoverMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Legacy => "legacy",
            Self::Csv => "csv",
        }
    }
}

impl FromStr for DiscoverMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "legacy" => Ok(Self::Legacy),
            "csv" => Ok(Self::Csv),
            other => Err(Error::InvalidDiscoverMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for DiscoverMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean platform evidence with the reason it was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSignal {
    pub detected: bool,
    pub reason: String,
}

impl PlatformSignal {
    fn new(detected: bool, reason: impl Into<String>) -> Self {
        Self {
            detected,
            reason: reason.into(),
        }
    }
}

/// Source of platform evidence.
pub trait PlatformProbe {
    /// Returns whether the host is a Tegra-based system.
    fn tegra_signal(&self) -> PlatformSignal;
}

/// Probes the real filesystem, optionally under an alternate root.
#[derive(Debug, Clone)]
pub struct HostPlatform {
    root: PathBuf,
}

impl HostPlatform {
    /// Probes the host root filesystem.
    pub fn new() -> Self {
        Self::with_root("/")
    }

    /// Probes marker files relative to `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn host_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformProbe for HostPlatform {
    fn tegra_signal(&self) -> PlatformSignal {
        let release_file = self.host_path(TEGRA_RELEASE_FILE);
        if is_file(&release_file) {
            return PlatformSignal::new(true, format!("{} found", TEGRA_RELEASE_FILE));
        }

        let family_file = self.host_path(TEGRA_FAMILY_FILE);
        if !is_file(&family_file) {
            return PlatformSignal::new(false, format!("{} not found", TEGRA_FAMILY_FILE));
        }

        let contents = match fs::read_to_string(&family_file) {
            Ok(contents) => contents,
            Err(_) => {
                return PlatformSignal::new(false, format!("could not read {}", TEGRA_FAMILY_FILE));
            }
        };

        if contents.to_lowercase().starts_with(TEGRA_FAMILY_PREFIX) {
            PlatformSignal::new(
                true,
                format!("{} has '{}' prefix", TEGRA_FAMILY_FILE, TEGRA_FAMILY_PREFIX),
            )
        } else {
            PlatformSignal::new(
                false,
                format!("{} has no '{}' prefix", TEGRA_FAMILY_FILE, TEGRA_FAMILY_PREFIX),
            )
        }
    }
}

/// Exists and is not a directory.
fn is_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| !m.is_dir()).unwrap_or(false)
}

/// Resolves `auto` to a concrete mode; any other mode is returned unchanged.
pub fn resolve_discover_mode(probe: &dyn PlatformProbe, mode: DiscoverMode) -> DiscoverMode {
    if mode != DiscoverMode::Auto {
        return mode;
    }

    let signal = probe.tegra_signal();
    debug!("Is Tegra-based system? {}: {}", signal.detected, signal.reason);

    let resolved = if signal.detected {
        DiscoverMode::Csv
    } else {
        DiscoverMode::Legacy
    };
    info!("Auto-detected discover mode as '{}'", resolved);

    resolved
}
