//! # CSV Mount Specs (Tegra)
//!
//! L4T ships the list of host files a GPU container needs as CSV files in
//! [`DEFAULT_MOUNT_SPEC_PATH`]. Each line names a type and an absolute path:
//!
//! ```text
//! # comment
//! dev, /dev/nvhost-ctrl
//! lib, /usr/lib/aarch64-linux-gnu/tegra/libcuda.so.1.1
//! sym, /usr/lib/aarch64-linux-gnu/libcuda.so
//! dir, /usr/lib/aarch64-linux-gnu/tegra
//! ```
//!
//! `dev` entries become device nodes; `lib`, `sym` and `dir` entries become
//! read-only bind mounts. Entries missing on the host are skipped.
//!
//! [`DEFAULT_MOUNT_SPEC_PATH`]: crate::constants::DEFAULT_MOUNT_SPEC_PATH

use super::{Device, Discover, DiscoverConfig, Mount};
use crate::constants::{BASE_CSV_FILES, CSV_MOUNT_OPTIONS};
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Kind of a CSV mount-spec entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountSpecType {
    Dev,
    Lib,
    Sym,
    Dir,
}

impl FromStr for MountSpecType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "lib" => Ok(Self::Lib),
            "sym" => Ok(Self::Sym),
            "dir" => Ok(Self::Dir),
            other => Err(format!("unexpected mount spec type '{}'", other)),
        }
    }
}

/// One entry of a CSV mount spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    pub spec_type: MountSpecType,
    /// Absolute path, as seen in the container.
    pub path: String,
}

/// Parses the contents of one CSV file. `file` is used in error messages.
pub fn parse_mount_specs(contents: &str, file: &Path) -> Result<Vec<MountSpec>> {
    let mut specs = Vec::new();

    for (index, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let invalid = |reason: String| Error::InvalidMountSpec {
            file: file.to_path_buf(),
            line: index + 1,
            reason,
        };

        let (kind, path) = line
            .split_once(',')
            .ok_or_else(|| invalid(format!("expected '<type>, <path>', got '{}'", line)))?;
        let spec_type: MountSpecType = kind.trim().parse().map_err(invalid)?;
        let path = path.trim();
        if path.is_empty() {
            return Err(invalid("empty path".to_string()));
        }

        specs.push(MountSpec {
            spec_type,
            path: path.to_string(),
        });
    }

    Ok(specs)
}

/// Reads and parses every given CSV file, in order.
pub fn load_mount_specs(files: &[PathBuf]) -> Result<Vec<MountSpec>> {
    let mut specs = Vec::new();
    for file in files {
        let contents = fs::read_to_string(file).map_err(|e| Error::InvalidMountSpec {
            file: file.clone(),
            line: 0,
            reason: e.to_string(),
        })?;
        specs.extend(parse_mount_specs(&contents, file)?);
    }
    Ok(specs)
}

/// Lists the `*.csv` files in a directory, sorted by name.
pub fn file_list(dir: &Path) -> Result<Vec<PathBuf>> {
    let list_failed = |e: std::io::Error| Error::CsvFileList {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(list_failed)? {
        let path = entry.map_err(list_failed)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            files.push(path);
        }
    }
    files.sort();

    debug!("Found {} CSV files in {}", files.len(), dir.display());
    Ok(files)
}

/// Keeps only the base CSV files (`devices.csv`, `drivers.csv`, `l4t.csv`).
pub fn base_files_only(files: Vec<PathBuf>) -> Vec<PathBuf> {
    files
        .into_iter()
        .filter(|f| {
            f.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| BASE_CSV_FILES.contains(&n))
        })
        .collect()
}

/// Discovers devices and mounts listed in CSV mount specs.
#[derive(Debug, Clone)]
pub struct CsvDiscoverer {
    config: DiscoverConfig,
    specs: Vec<MountSpec>,
}

impl CsvDiscoverer {
    /// Parses the given CSV files.
    pub fn new(files: &[PathBuf], config: &DiscoverConfig) -> Result<Self> {
        Ok(Self::from_specs(load_mount_specs(files)?, config))
    }

    pub fn from_specs(specs: Vec<MountSpec>, config: &DiscoverConfig) -> Self {
        Self {
            config: config.clone(),
            specs,
        }
    }

    /// Host locations of entries of the given types that exist under the root.
    fn located<'a>(
        &'a self,
        types: &'a [MountSpecType],
    ) -> impl Iterator<Item = (&'a MountSpec, PathBuf)> + 'a {
        self.specs
            .iter()
            .filter(move |s| types.contains(&s.spec_type))
            .filter_map(move |s| {
                let host_path = self.config.host_path(&s.path);
                if host_path.exists() {
                    Some((s, host_path))
                } else {
                    debug!("Skipping {}: not found at {}", s.path, host_path.display());
                    None
                }
            })
    }
}

impl Discover for CsvDiscoverer {
    fn devices(&self) -> Result<Vec<Device>> {
        Ok(self
            .located(&[MountSpecType::Dev])
            .map(|(spec, host_path)| Device {
                host_path,
                path: spec.path.clone(),
            })
            .collect())
    }

    fn mounts(&self) -> Result<Vec<Mount>> {
        Ok(self
            .located(&[MountSpecType::Lib, MountSpecType::Sym, MountSpecType::Dir])
            .map(|(spec, host_path)| Mount {
                host_path,
                path: spec.path.clone(),
                options: CSV_MOUNT_OPTIONS.iter().map(|o| o.to_string()).collect(),
            })
            .collect())
    }
}
