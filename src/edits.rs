//! # Container Edits
//!
//! An [`EditSet`] is the normalized form of everything discovery asks for:
//! device nodes, bind mounts, environment assignments and lifecycle hooks.
//! Applying it merges those into an [`OciSpec`].
//!
//! ## Apply Order
//!
//! ```text
//! 1. log every hook                      (no mutation)
//! 2. resolve device nodes, validate      (no mutation; may fail)
//! 3. append hooks      → hooks.<phase>
//!    append devices    → linux.devices
//!    append mounts     → mounts
//!    append env        → process.env
//! ```
//!
//! Every fallible step runs before the first mutation, so a failed apply
//! leaves the spec untouched.

use crate::discover::{Device, Discover, Hook, Mount};
use crate::error::{Error, Result};
use crate::spec::{OciDevice, OciMount, OciSpec, SpecModifier};
use serde_json::Map;
use std::fs;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use tracing::info;

/// Spec mutations derived from discovery, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSet {
    pub device_nodes: Vec<Device>,
    pub mounts: Vec<Mount>,
    /// `KEY=VALUE` assignments.
    pub env: Vec<String>,
    pub hooks: Vec<Hook>,
}

impl EditSet {
    /// Creates an edit set carrying only hooks.
    pub fn from_hooks(hooks: impl IntoIterator<Item = Hook>) -> Self {
        Self {
            hooks: hooks.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Collects devices, mounts and hooks from a discoverer.
    pub fn from_discoverer(discoverer: &dyn Discover) -> Result<Self> {
        let failed = |what: &str, e: Error| Error::DiscoveryFailed {
            discoverer: what.to_string(),
            reason: e.to_string(),
        };

        Ok(Self {
            device_nodes: discoverer.devices().map_err(|e| failed("device", e))?,
            mounts: discoverer.mounts().map_err(|e| failed("mount", e))?,
            env: Vec::new(),
            hooks: discoverer.hooks().map_err(|e| failed("hook", e))?,
        })
    }

    /// Appends another edit set after this one.
    pub fn append(&mut self, other: EditSet) {
        self.device_nodes.extend(other.device_nodes);
        self.mounts.extend(other.mounts);
        self.env.extend(other.env);
        self.hooks.extend(other.hooks);
    }

    pub fn is_empty(&self) -> bool {
        self.device_nodes.is_empty()
            && self.mounts.is_empty()
            && self.env.is_empty()
            && self.hooks.is_empty()
    }

    /// Merges the edits into the spec.
    pub fn apply(&self, spec: &mut OciSpec) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        info!("Hooks:");
        for hook in &self.hooks {
            info!("Injecting {:?}", hook.args);
        }

        let devices = self
            .device_nodes
            .iter()
            .map(resolve_device)
            .collect::<Result<Vec<_>>>()?;
        let mounts = self
            .mounts
            .iter()
            .map(to_oci_mount)
            .collect::<Result<Vec<_>>>()?;
        for entry in &self.env {
            if !entry.contains('=') || entry.starts_with('=') {
                return Err(Error::InvalidEdit(format!(
                    "environment entry '{}' is not KEY=VALUE",
                    entry
                )));
            }
        }
        for hook in &self.hooks {
            if !hook.path.starts_with('/') {
                return Err(Error::InvalidEdit(format!(
                    "hook path '{}' is not absolute",
                    hook.path
                )));
            }
        }

        if !self.hooks.is_empty() {
            let hooks = spec.hooks_mut();
            for hook in &self.hooks {
                hooks.phase_mut(hook.lifecycle).push(hook.to_oci());
            }
        }
        if !devices.is_empty() {
            spec.linux_mut().devices.extend(devices);
        }
        spec.mounts.extend(mounts);
        if !self.env.is_empty() {
            spec.process_mut().env.extend(self.env.iter().cloned());
        }

        Ok(())
    }
}

impl SpecModifier for EditSet {
    fn modify(&self, spec: &mut OciSpec) -> Result<()> {
        self.apply(spec)
    }
}

/// Stats the host device node for its type and numbers.
fn resolve_device(device: &Device) -> Result<OciDevice> {
    if !device.path.starts_with('/') {
        return Err(Error::InvalidEdit(format!(
            "device path '{}' is not absolute",
            device.path
        )));
    }

    let metadata = fs::metadata(&device.host_path).map_err(|e| {
        Error::InvalidEdit(format!(
            "failed to stat device {}: {}",
            device.host_path.display(),
            e
        ))
    })?;

    let file_type = metadata.file_type();
    let device_type = if file_type.is_char_device() {
        "c"
    } else if file_type.is_block_device() {
        "b"
    } else {
        return Err(Error::InvalidEdit(format!(
            "{} is not a device node",
            device.host_path.display()
        )));
    };

    let rdev = metadata.rdev() as libc::dev_t;
    Ok(OciDevice {
        device_type: device_type.to_string(),
        path: device.path.clone(),
        major: Some(i64::from(libc::major(rdev))),
        minor: Some(i64::from(libc::minor(rdev))),
        file_mode: Some(metadata.mode() & 0o777),
        uid: Some(metadata.uid()),
        gid: Some(metadata.gid()),
    })
}

fn to_oci_mount(mount: &Mount) -> Result<OciMount> {
    if !mount.path.starts_with('/') {
        return Err(Error::InvalidEdit(format!(
            "mount destination '{}' is not absolute",
            mount.path
        )));
    }

    Ok(OciMount {
        destination: mount.path.clone(),
        mount_type: Some("bind".to_string()),
        source: Some(mount.host_path.display().to_string()),
        options: mount.options.clone(),
        extra: Map::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::HookLifecycle;
    use std::path::PathBuf;

    fn hook(path: &str) -> Hook {
        Hook::new(HookLifecycle::CreateContainer, path, vec![path.to_string()])
    }

    #[test]
    fn test_empty_edit_set_is_noop() {
        let mut spec = OciSpec::default();
        EditSet::default().apply(&mut spec).unwrap();
        assert_eq!(spec, OciSpec::default());
        assert!(spec.hooks.is_none());
    }

    #[test]
    fn test_append_preserves_order() {
        let mut edits = EditSet::from_hooks([hook("/bin/a")]);
        edits.append(EditSet::from_hooks([hook("/bin/b"), hook("/bin/c")]));

        let paths: Vec<&str> = edits.hooks.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(paths, vec!["/bin/a", "/bin/b", "/bin/c"]);
    }

    #[test]
    fn test_apply_devices_and_mounts() {
        let edits = EditSet {
            device_nodes: vec![Device {
                host_path: PathBuf::from("/dev/null"),
                path: "/dev/null".to_string(),
            }],
            mounts: vec![Mount {
                host_path: PathBuf::from("/run/driver/usr/lib/libcuda.so"),
                path: "/usr/lib/libcuda.so".to_string(),
                options: vec!["ro".to_string(), "bind".to_string()],
            }],
            env: vec!["NVIDIA_INJECTED=1".to_string()],
            hooks: Vec::new(),
        };
        let mut spec = OciSpec::default();
        edits.apply(&mut spec).unwrap();

        let devices = &spec.linux.as_ref().unwrap().devices;
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].device_type, "c");
        assert_eq!(devices[0].major, Some(1));
        assert_eq!(devices[0].minor, Some(3));

        assert_eq!(spec.mounts[0].destination, "/usr/lib/libcuda.so");
        assert_eq!(
            spec.mounts[0].source.as_deref(),
            Some("/run/driver/usr/lib/libcuda.so")
        );
        assert_eq!(spec.mounts[0].mount_type.as_deref(), Some("bind"));
        assert_eq!(spec.lookup_env("NVIDIA_INJECTED"), Some("1"));
    }

    #[test]
    fn test_failed_apply_leaves_spec_untouched() {
        let edits = EditSet {
            device_nodes: vec![Device {
                host_path: PathBuf::from("/nonexistent/dev/nvhost-ctrl"),
                path: "/dev/nvhost-ctrl".to_string(),
            }],
            hooks: vec![hook("/bin/a")],
            ..Default::default()
        };
        let mut spec = OciSpec::default();

        let result = edits.apply(&mut spec);
        assert!(matches!(result, Err(Error::InvalidEdit(_))));
        assert_eq!(spec, OciSpec::default());
    }

    #[test]
    fn test_regular_file_is_not_a_device() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let device = Device {
            host_path: temp.path().to_path_buf(),
            path: "/dev/fake".to_string(),
        };
        assert!(matches!(resolve_device(&device), Err(Error::InvalidEdit(_))));
    }

    #[test]
    fn test_relative_hook_path_rejected() {
        let edits = EditSet::from_hooks([hook("nvidia-ctk")]);
        let mut spec = OciSpec::default();
        assert!(edits.apply(&mut spec).is_err());
        assert!(spec.hooks.is_none());
    }
}
