//! `create-symlinks` hook: recreates in the container the symlinks listed
//! as `sym` entries in the CSV mount specs.

use super::csv::{MountSpecType, load_mount_specs};
use super::{Discover, DiscoverConfig, Hook, find_nvidia_ctk};
use crate::error::Result;
use crate::spec::HookLifecycle;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Emits a `createContainer` hook with one `--link target::path` per host
/// symlink, or no hook if there are none.
#[derive(Debug, Clone)]
pub struct CreateSymlinksHook {
    nvidia_ctk: String,
    links: Vec<String>,
}

impl CreateSymlinksHook {
    /// Resolves `sym` entries of the given CSV files against the host.
    pub fn new(files: &[PathBuf], config: &DiscoverConfig) -> Result<Self> {
        let mut links = Vec::new();
        for spec in load_mount_specs(files)? {
            if spec.spec_type != MountSpecType::Sym {
                continue;
            }
            let host_path = config.host_path(&spec.path);
            match fs::read_link(&host_path) {
                Ok(target) => links.push(format!("{}::{}", target.display(), spec.path)),
                Err(e) => debug!("Skipping symlink {}: {}", host_path.display(), e),
            }
        }

        Ok(Self {
            nvidia_ctk: find_nvidia_ctk(config),
            links,
        })
    }

    /// The `target::path` link arguments.
    pub fn links(&self) -> &[String] {
        &self.links
    }
}

impl Discover for CreateSymlinksHook {
    fn hooks(&self) -> Result<Vec<Hook>> {
        if self.links.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec![
            self.nvidia_ctk.clone(),
            "hook".to_string(),
            "create-symlinks".to_string(),
        ];
        for link in &self.links {
            args.push("--link".to_string());
            args.push(link.clone());
        }

        Ok(vec![Hook::new(
            HookLifecycle::CreateContainer,
            self.nvidia_ctk.clone(),
            args,
        )])
    }
}
