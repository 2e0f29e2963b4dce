//! # Host Resource Discovery
//!
//! A discoverer enumerates host resources a GPU container needs (device
//! nodes, library/directory mounts) and the lifecycle hooks that prepare
//! them. The modification pipeline depends only on the [`Discover`]
//! capability, never on a concrete discoverer.
//!
//! ## Discoverers
//!
//! | Discoverer             | Mode   | Produces                                   |
//! |------------------------|--------|--------------------------------------------|
//! | [`LegacyDiscoverer`]   | legacy | prestart `nvidia-container-runtime-hook`   |
//! | [`CsvDiscoverer`]      | csv    | devices + mounts listed in L4T CSV files   |
//! | [`LdCacheUpdateHook`]  | csv    | createContainer `update-ldcache` hook      |
//! | [`CreateSymlinksHook`] | csv    | createContainer `create-symlinks` hook     |
//! | [`DiscoverList`]       | any    | concatenation of children, in order        |
//!
//! ## Root Handling
//!
//! Host paths are located under [`DiscoverConfig::root`] so that a driver
//! installed in an alternate root (e.g. a driver container) is found. Paths
//! *inside the container* never include the root.

pub mod csv;
pub mod ldcache;
pub mod legacy;
pub mod symlinks;

pub use self::csv::CsvDiscoverer;
pub use self::ldcache::LdCacheUpdateHook;
pub use self::legacy::LegacyDiscoverer;
pub use self::symlinks::CreateSymlinksHook;

use crate::config::Config;
use crate::constants::{DEFAULT_NVIDIA_CTK_PATH, EXECUTABLE_SEARCH_PATHS, NVIDIA_CTK};
use crate::error::Result;
use crate::spec::{HookLifecycle, OciHook};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

// =============================================================================
// Discovered Resources
// =============================================================================

/// A device node to expose in the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Location on the host (including the driver root).
    pub host_path: PathBuf,
    /// Location in the container.
    pub path: String,
}

/// A host path to bind mount into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Location on the host (including the driver root).
    pub host_path: PathBuf,
    /// Mount destination in the container.
    pub path: String,
    pub options: Vec<String>,
}

/// A lifecycle hook to inject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hook {
    pub lifecycle: HookLifecycle,
    /// Executable path on the host.
    pub path: String,
    /// Arguments, including argv\[0\].
    pub args: Vec<String>,
    pub env: Vec<String>,
}

impl Hook {
    pub fn new(lifecycle: HookLifecycle, path: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            lifecycle,
            path: path.into(),
            args,
            env: Vec::new(),
        }
    }

    /// Converts to the OCI hook entry for this hook's phase.
    pub fn to_oci(&self) -> OciHook {
        OciHook {
            path: self.path.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
            timeout: None,
        }
    }
}

// =============================================================================
// Discover Capability
// =============================================================================

/// Enumerates host resources and the hooks that prepare them.
pub trait Discover: Send + Sync {
    fn devices(&self) -> Result<Vec<Device>> {
        Ok(Vec::new())
    }

    fn mounts(&self) -> Result<Vec<Mount>> {
        Ok(Vec::new())
    }

    fn hooks(&self) -> Result<Vec<Hook>> {
        Ok(Vec::new())
    }
}

/// Ordered composition of discoverers.
///
/// Results are concatenated in the order the discoverers were given; hooks
/// that prepare state for later hooks rely on this.
#[derive(Clone, Default)]
pub struct DiscoverList {
    discoverers: Vec<Arc<dyn Discover>>,
}

impl DiscoverList {
    pub fn new(discoverers: Vec<Arc<dyn Discover>>) -> Self {
        Self { discoverers }
    }
}

impl Discover for DiscoverList {
    fn devices(&self) -> Result<Vec<Device>> {
        let mut all = Vec::new();
        for d in &self.discoverers {
            all.extend(d.devices()?);
        }
        Ok(all)
    }

    fn mounts(&self) -> Result<Vec<Mount>> {
        let mut all = Vec::new();
        for d in &self.discoverers {
            all.extend(d.mounts()?);
        }
        Ok(all)
    }

    fn hooks(&self) -> Result<Vec<Hook>> {
        let mut all = Vec::new();
        for d in &self.discoverers {
            all.extend(d.hooks()?);
        }
        Ok(all)
    }
}

// =============================================================================
// Discovery Configuration
// =============================================================================

/// Settings shared by all discoverers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverConfig {
    /// Driver root on the host.
    pub root: PathBuf,
    /// Configured `nvidia-ctk` name or path.
    pub nvidia_ctk_path: String,
}

impl DiscoverConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.root(),
            nvidia_ctk_path: config.nvidia_ctk.path.clone(),
        }
    }

    /// Maps an absolute container-side path to its location under the root.
    pub fn host_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            nvidia_ctk_path: NVIDIA_CTK.to_string(),
        }
    }
}

/// Searches the standard bin directories under `root` for an executable.
pub fn locate_executable(root: &Path, name: &str) -> Option<PathBuf> {
    EXECUTABLE_SEARCH_PATHS
        .iter()
        .map(|dir| root.join(dir.trim_start_matches('/')).join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Resolves the `nvidia-ctk` executable used in injected hooks.
///
/// A configured value containing a path separator is used verbatim.
pub fn find_nvidia_ctk(config: &DiscoverConfig) -> String {
    let configured = config.nvidia_ctk_path.as_str();
    if configured.contains('/') {
        return configured.to_string();
    }

    let name = if configured.is_empty() { NVIDIA_CTK } else { configured };
    match locate_executable(&config.root, name) {
        Some(path) => {
            debug!("Found {} at {}", name, path.display());
            path.display().to_string()
        }
        None => {
            warn!(
                "Failed to locate {}; using default path {}",
                name, DEFAULT_NVIDIA_CTK_PATH
            );
            DEFAULT_NVIDIA_CTK_PATH.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn install_executable(root: &Path, dir: &str, name: &str) -> PathBuf {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_locate_executable_search_order() {
        let temp = TempDir::new().unwrap();
        install_executable(temp.path(), "usr/bin", "tool");
        let sbin = install_executable(temp.path(), "usr/local/sbin", "tool");

        assert_eq!(locate_executable(temp.path(), "tool"), Some(sbin));
    }

    #[test]
    fn test_locate_executable_skips_non_executable() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("usr/bin");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("tool"), "data").unwrap();
        fs::set_permissions(dir.join("tool"), fs::Permissions::from_mode(0o644)).unwrap();

        assert_eq!(locate_executable(temp.path(), "tool"), None);
    }

    #[test]
    fn test_find_nvidia_ctk() {
        let temp = TempDir::new().unwrap();
        let mut config = DiscoverConfig {
            root: temp.path().to_path_buf(),
            nvidia_ctk_path: "nvidia-ctk".to_string(),
        };
        assert_eq!(find_nvidia_ctk(&config), DEFAULT_NVIDIA_CTK_PATH);

        let installed = install_executable(temp.path(), "usr/bin", "nvidia-ctk");
        assert_eq!(find_nvidia_ctk(&config), installed.display().to_string());

        config.nvidia_ctk_path = "/opt/nvidia/bin/nvidia-ctk".to_string();
        assert_eq!(find_nvidia_ctk(&config), "/opt/nvidia/bin/nvidia-ctk");
    }

    struct Fixed(&'static str);

    impl Discover for Fixed {
        fn hooks(&self) -> Result<Vec<Hook>> {
            Ok(vec![Hook::new(
                HookLifecycle::CreateContainer,
                format!("/bin/{}", self.0),
                vec![self.0.to_string()],
            )])
        }
    }

    #[test]
    fn test_discover_list_preserves_order() {
        let list = DiscoverList::new(vec![
            Arc::new(Fixed("a")),
            Arc::new(Fixed("b")),
            Arc::new(Fixed("c")),
        ]);

        let paths: Vec<String> = list.hooks().unwrap().into_iter().map(|h| h.path).collect();
        assert_eq!(paths, vec!["/bin/a", "/bin/b", "/bin/c"]);
        assert!(list.devices().unwrap().is_empty());
        assert!(list.mounts().unwrap().is_empty());
    }
}
