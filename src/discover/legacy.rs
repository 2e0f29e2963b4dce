//! Legacy discovery: a single prestart hook running
//! `nvidia-container-runtime-hook prestart`, which performs all GPU setup
//! itself when the container is created.

use super::{Discover, DiscoverConfig, Hook, locate_executable};
use crate::constants::{DEFAULT_RUNTIME_HOOK_PATH, NVIDIA_CONTAINER_RUNTIME_HOOK};
use crate::error::Result;
use crate::spec::HookLifecycle;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Discoverer for standard (non-Tegra) hosts.
#[derive(Debug, Clone)]
pub struct LegacyDiscoverer {
    root: PathBuf,
}

impl LegacyDiscoverer {
    pub fn new(config: &DiscoverConfig) -> Self {
        Self {
            root: config.root.clone(),
        }
    }

    fn hook_path(&self) -> String {
        match locate_executable(&self.root, NVIDIA_CONTAINER_RUNTIME_HOOK) {
            Some(path) => {
                debug!("Found {} at {}", NVIDIA_CONTAINER_RUNTIME_HOOK, path.display());
                path.display().to_string()
            }
            None => {
                warn!(
                    "Failed to locate {}; using default path {}",
                    NVIDIA_CONTAINER_RUNTIME_HOOK, DEFAULT_RUNTIME_HOOK_PATH
                );
                DEFAULT_RUNTIME_HOOK_PATH.to_string()
            }
        }
    }
}

impl Discover for LegacyDiscoverer {
    fn hooks(&self) -> Result<Vec<Hook>> {
        let path = self.hook_path();
        let args = vec![path.clone(), "prestart".to_string()];
        Ok(vec![Hook::new(HookLifecycle::Prestart, path, args)])
    }
}
