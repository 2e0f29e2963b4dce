//! # OCI Runtime Spec Access
//!
//! Models the parts of an OCI runtime `config.json` that GPU modification
//! touches (process environment, mounts, hooks, Linux device nodes) and
//! carries every other field through untouched, so a load → modify → flush
//! cycle never drops configuration the runtime wrapper did not ask about.
//!
//! ## Access Model
//!
//! ```text
//! ┌──────────────┐  load()   ┌──────────┐  modify(&dyn SpecModifier)
//! │  SpecSource  │ ────────► │ OciSpec  │ ◄──────────────────────────
//! │ (file / mem) │ ◄──────── │ (&mut)   │
//! └──────────────┘  flush()  └──────────┘
//! ```
//!
//! A [`SpecModifier`] only ever sees `&mut OciSpec` for the duration of one
//! call; it never keeps a reference to the spec.
//!
//! Reference: <https://github.com/opencontainers/runtime-spec/blob/main/config.md>

use crate::constants::BUNDLE_CONFIG_FILE;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

// =============================================================================
// Modifier Contract
// =============================================================================

/// Applies in-place modifications to an OCI spec.
pub trait SpecModifier {
    /// Modifies the spec. On error the spec may be partially modified.
    fn modify(&self, spec: &mut OciSpec) -> Result<()>;
}

/// `None` means "nothing to do": modifying with it always succeeds.
impl<M: SpecModifier> SpecModifier for Option<M> {
    fn modify(&self, spec: &mut OciSpec) -> Result<()> {
        match self {
            Some(modifier) => modifier.modify(spec),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Spec Sources
// =============================================================================

/// Owner of an OCI spec that can hand it out for inspection and modification.
pub trait SpecSource {
    /// Loads the spec and returns a view of it.
    fn load(&mut self) -> Result<&OciSpec>;

    /// Applies a modifier to the loaded spec.
    fn modify(&mut self, modifier: &dyn SpecModifier) -> Result<()>;

    /// Persists the modified spec.
    fn flush(&self) -> Result<()>;
}

/// Spec backed by a `config.json` file.
#[derive(Debug, Clone)]
pub struct FileSpec {
    path: PathBuf,
    spec: Option<OciSpec>,
}

impl FileSpec {
    /// Creates a file spec for the given `config.json` path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            spec: None,
        }
    }

    /// Creates a file spec for the `config.json` inside a bundle directory.
    pub fn from_bundle(bundle: &Path) -> Self {
        Self::new(bundle.join(BUNDLE_CONFIG_FILE))
    }

    /// Returns the config file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the loaded spec, if any.
    pub fn spec(&self) -> Option<&OciSpec> {
        self.spec.as_ref()
    }
}

impl SpecSource for FileSpec {
    fn load(&mut self) -> Result<&OciSpec> {
        let contents = fs::read_to_string(&self.path).map_err(|e| Error::SpecLoad {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        let spec: OciSpec = serde_json::from_str(&contents).map_err(|e| Error::SpecLoad {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        debug!("Loaded OCI spec from {}", self.path.display());
        Ok(&*self.spec.insert(spec))
    }

    fn modify(&mut self, modifier: &dyn SpecModifier) -> Result<()> {
        let spec = self.spec.as_mut().ok_or(Error::SpecNotLoaded)?;
        modifier.modify(spec)
    }

    fn flush(&self) -> Result<()> {
        let spec = self.spec.as_ref().ok_or(Error::SpecNotLoaded)?;
        let mut json = serde_json::to_string_pretty(spec)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        json.push('\n');

        // Temp file + rename so a crash never leaves a truncated config.json
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|e| Error::SpecWrite {
            path: tmp_path.clone(),
            reason: e.to_string(),
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            Error::SpecWrite {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;

        debug!("Flushed OCI spec to {}", self.path.display());
        Ok(())
    }
}

/// Spec held in memory; `flush` is a no-op.
#[derive(Debug, Clone, Default)]
pub struct MemorySpec {
    spec: OciSpec,
}

impl MemorySpec {
    pub fn new(spec: OciSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &OciSpec {
        &self.spec
    }

    pub fn into_inner(self) -> OciSpec {
        self.spec
    }
}

impl SpecSource for MemorySpec {
    fn load(&mut self) -> Result<&OciSpec> {
        Ok(&self.spec)
    }

    fn modify(&mut self, modifier: &dyn SpecModifier) -> Result<()> {
        modifier.modify(&mut self.spec)
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// OCI Runtime Spec Types
// =============================================================================

/// OCI Runtime Spec.
///
/// Fields not listed here are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub oci_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<OciProcess>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<OciMount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<OciHooks>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux: Option<OciLinux>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OciSpec {
    /// Parses a spec from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Returns the container's declared environment (`KEY=VALUE` entries).
    pub fn env(&self) -> &[String] {
        self.process.as_ref().map(|p| p.env.as_slice()).unwrap_or(&[])
    }

    /// Looks up a variable in the container's declared environment.
    ///
    /// Returns the value of the first `KEY=` entry. An entry of just `KEY`
    /// yields an empty value.
    pub fn lookup_env(&self, key: &str) -> Option<&str> {
        self.env().iter().find_map(|entry| match entry.split_once('=') {
            Some((k, v)) if k == key => Some(v),
            None if entry == key => Some(""),
            _ => None,
        })
    }

    /// Returns the hooks section, creating it if absent.
    pub fn hooks_mut(&mut self) -> &mut OciHooks {
        self.hooks.get_or_insert_with(OciHooks::default)
    }

    /// Returns the process section, creating it if absent.
    pub fn process_mut(&mut self) -> &mut OciProcess {
        self.process.get_or_insert_with(OciProcess::default)
    }

    /// Returns the Linux section, creating it if absent.
    pub fn linux_mut(&mut self) -> &mut OciLinux {
        self.linux.get_or_insert_with(OciLinux::default)
    }
}

/// OCI process config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OciProcess {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// OCI mount config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OciMount {
    pub destination: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mount_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// OCI Linux-specific config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OciLinux {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<OciDevice>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// OCI device node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciDevice {
    /// Device type (`c`, `b`, `p`, `u`).
    #[serde(rename = "type")]
    pub device_type: String,
    /// Device path in the container.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_mode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
}

// =============================================================================
// Hooks
// =============================================================================

/// Container lifecycle phase a hook runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookLifecycle {
    /// After create, before `pivot_root` (deprecated by OCI, still honored).
    Prestart,
    CreateRuntime,
    CreateContainer,
    StartContainer,
    Poststart,
    Poststop,
}

impl HookLifecycle {
    /// All phases, in execution order.
    pub const ALL: [HookLifecycle; 6] = [
        Self::Prestart,
        Self::CreateRuntime,
        Self::CreateContainer,
        Self::StartContainer,
        Self::Poststart,
        Self::Poststop,
    ];

    /// Returns the config.json key for this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prestart => "prestart",
            Self::CreateRuntime => "createRuntime",
            Self::CreateContainer => "createContainer",
            Self::StartContainer => "startContainer",
            Self::Poststart => "poststart",
            Self::Poststop => "poststop",
        }
    }
}

impl std::fmt::Display for HookLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container lifecycle hooks, one list per phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciHooks {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prestart: Vec<OciHook>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub create_runtime: Vec<OciHook>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub create_container: Vec<OciHook>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub start_container: Vec<OciHook>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub poststart: Vec<OciHook>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub poststop: Vec<OciHook>,
}

impl OciHooks {
    /// Returns the hooks of one phase.
    pub fn phase(&self, lifecycle: HookLifecycle) -> &[OciHook] {
        match lifecycle {
            HookLifecycle::Prestart => &self.prestart,
            HookLifecycle::CreateRuntime => &self.create_runtime,
            HookLifecycle::CreateContainer => &self.create_container,
            HookLifecycle::StartContainer => &self.start_container,
            HookLifecycle::Poststart => &self.poststart,
            HookLifecycle::Poststop => &self.poststop,
        }
    }

    /// Returns the mutable hook list of one phase.
    pub fn phase_mut(&mut self, lifecycle: HookLifecycle) -> &mut Vec<OciHook> {
        match lifecycle {
            HookLifecycle::Prestart => &mut self.prestart,
            HookLifecycle::CreateRuntime => &mut self.create_runtime,
            HookLifecycle::CreateContainer => &mut self.create_container,
            HookLifecycle::StartContainer => &mut self.start_container,
            HookLifecycle::Poststart => &mut self.poststart,
            HookLifecycle::Poststop => &mut self.poststop,
        }
    }

    /// Returns true if no phase has any hook.
    pub fn is_empty(&self) -> bool {
        HookLifecycle::ALL.iter().all(|l| self.phase(*l).is_empty())
    }
}

/// A single hook entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OciHook {
    /// Absolute path to the hook executable.
    pub path: String,
    /// Arguments, including argv\[0\].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
}
