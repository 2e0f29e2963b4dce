//! `update-ldcache` hook: refreshes the container's linker cache so the
//! injected libraries are resolvable.

use super::{Discover, DiscoverConfig, Hook, find_nvidia_ctk};
use crate::error::Result;
use crate::spec::HookLifecycle;
use std::path::Path;
use std::sync::Arc;

/// Wraps a mount discoverer and emits one `createContainer` hook listing
/// the directories of the libraries it mounts.
pub struct LdCacheUpdateHook {
    mounts: Arc<dyn Discover>,
    nvidia_ctk: String,
}

impl LdCacheUpdateHook {
    pub fn new(mounts: Arc<dyn Discover>, config: &DiscoverConfig) -> Self {
        Self {
            mounts,
            nvidia_ctk: find_nvidia_ctk(config),
        }
    }

    /// Unique parent directories of library mounts, in first-seen order.
    fn library_folders(&self) -> Result<Vec<String>> {
        let mut folders: Vec<String> = Vec::new();
        for mount in self.mounts.mounts()? {
            if !is_library(&mount.path) {
                continue;
            }
            let Some(parent) = Path::new(&mount.path).parent() else {
                continue;
            };
            let parent = parent.display().to_string();
            if !folders.contains(&parent) {
                folders.push(parent);
            }
        }
        Ok(folders)
    }
}

impl Discover for LdCacheUpdateHook {
    fn hooks(&self) -> Result<Vec<Hook>> {
        let mut args = vec![
            self.nvidia_ctk.clone(),
            "hook".to_string(),
            "update-ldcache".to_string(),
        ];
        for folder in self.library_folders()? {
            args.push("--folder".to_string());
            args.push(folder);
        }

        Ok(vec![Hook::new(
            HookLifecycle::CreateContainer,
            self.nvidia_ctk.clone(),
            args,
        )])
    }
}

/// Shared objects are named `lib*.so` or `lib*.so.<version>`.
fn is_library(path: &str) -> bool {
    let name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    name.ends_with(".so") || name.contains(".so.")
}
