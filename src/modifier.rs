//! # GPU Spec Modifier
//!
//! Decides whether a container needs GPU support and, if so, which
//! discovery strategy supplies it; then rewrites the OCI spec accordingly.
//!
//! ## Construction
//!
//! ```text
//! load spec ──► NVIDIA_VISIBLE_DEVICES unset / "" / "void" ──► Ok(None)
//!     │
//!     ▼
//! parse discover-mode ──► resolve "auto" (PlatformProbe)
//!     │
//!     ├── legacy ──► LegacyDiscoverer
//!     │
//!     └── csv ─────► check image requirements (CudaProbe)
//!                    list *.csv (base files unless csv-mounts=all)
//!                    DiscoverList[CsvDiscoverer, LdCacheUpdateHook, CreateSymlinksHook]
//! ```
//!
//! ## Modification
//!
//! `modify` removes stale GPU hooks, collects an [`EditSet`] from the
//! discoverer and applies it. Construction and modification are separate
//! so that callers can skip the low-level runtime rewrite entirely when no
//! modifier is returned.

use crate::config::Config;
use crate::constants::{
    CSV_MOUNTS_ALL, DEFAULT_MOUNT_SPEC_PATH, REQUIREMENTS_PROBE_DEVICE, REQUIRE_JETPACK_ENVVAR,
    VISIBLE_DEVICES_ENVVAR, VISIBLE_DEVICES_VOID,
};
use crate::cuda::{CudaProbe, NvidiaSmi};
use crate::discover::csv::{base_files_only, file_list};
use crate::discover::{
    CreateSymlinksHook, CsvDiscoverer, Discover, DiscoverConfig, DiscoverList, LdCacheUpdateHook,
    LegacyDiscoverer,
};
use crate::edits::EditSet;
use crate::error::{Error, Result};
use crate::hook_remover::HookRemover;
use crate::image::CudaImage;
use crate::platform::{DiscoverMode, HostPlatform, PlatformProbe, resolve_discover_mode};
use crate::requirements::{Property, Requirements};
use crate::spec::{OciSpec, SpecModifier, SpecSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

// =============================================================================
// Host Context
// =============================================================================

/// Host facts consulted while building a modifier.
pub struct HostContext {
    pub platform: Box<dyn PlatformProbe>,
    pub cuda: Box<dyn CudaProbe>,
    /// Directory holding the L4T CSV mount specs.
    pub mount_spec_path: PathBuf,
}

impl Default for HostContext {
    fn default() -> Self {
        Self {
            platform: Box::new(HostPlatform::new()),
            cuda: Box::new(NvidiaSmi::new()),
            mount_spec_path: PathBuf::from(DEFAULT_MOUNT_SPEC_PATH),
        }
    }
}

// =============================================================================
// Modifier
// =============================================================================

/// Applies the discovered GPU edits to an OCI spec.
#[derive(Clone)]
pub struct GpuModifier {
    discoverer: Arc<dyn Discover>,
}

impl GpuModifier {
    /// Builds a modifier for the spec, probing the real host.
    ///
    /// Returns `Ok(None)` when the container does not request GPUs.
    pub fn new(config: &Config, spec: &mut dyn SpecSource) -> Result<Option<Self>> {
        Self::with_host(config, spec, &HostContext::default())
    }

    /// Builds a modifier using the given host probes.
    pub fn with_host(
        config: &Config,
        spec: &mut dyn SpecSource,
        host: &HostContext,
    ) -> Result<Option<Self>> {
        let spec = spec.load()?;

        let visible_devices = spec.lookup_env(VISIBLE_DEVICES_ENVVAR);
        match visible_devices {
            None | Some("") | Some(VISIBLE_DEVICES_VOID) => {
                info!(
                    "No modification required: {}={} (exists={})",
                    VISIBLE_DEVICES_ENVVAR,
                    visible_devices.unwrap_or_default(),
                    visible_devices.is_some()
                );
                return Ok(None);
            }
            Some(_) => {}
        }
        info!("Constructing modifier from config: {:?}", config);

        let discover_config = DiscoverConfig::from_config(config);
        let configured: DiscoverMode = config.nvidia_container_runtime.discover_mode.parse()?;

        let discoverer: Arc<dyn Discover> =
            match resolve_discover_mode(host.platform.as_ref(), configured) {
                DiscoverMode::Legacy => Arc::new(LegacyDiscoverer::new(&discover_config)),
                DiscoverMode::Csv => Arc::new(csv_discoverer(spec, host, &discover_config)?),
                DiscoverMode::Auto => {
                    return Err(Error::InvalidDiscoverMode(DiscoverMode::Auto.to_string()));
                }
            };

        Ok(Some(Self::from_discoverer(discoverer)))
    }

    /// Wraps an already constructed discoverer.
    pub fn from_discoverer(discoverer: Arc<dyn Discover>) -> Self {
        Self { discoverer }
    }
}

impl SpecModifier for GpuModifier {
    fn modify(&self, spec: &mut OciSpec) -> Result<()> {
        HookRemover
            .modify(spec)
            .map_err(|e| Error::HookRemovalFailed(e.to_string()))?;

        let edits = EditSet::from_discoverer(self.discoverer.as_ref())
            .map_err(|e| Error::EditsFailed(e.to_string()))?;

        edits.apply(spec)
    }
}

// =============================================================================
// CSV Mode
// =============================================================================

fn csv_discoverer(
    spec: &OciSpec,
    host: &HostContext,
    config: &DiscoverConfig,
) -> Result<DiscoverList> {
    let image = CudaImage::from_spec(spec);
    check_requirements(&image, host.cuda.as_ref())?;

    let mut csv_files = file_list(&host.mount_spec_path)?;
    if spec.lookup_env(REQUIRE_JETPACK_ENVVAR) != Some(CSV_MOUNTS_ALL) {
        csv_files = base_files_only(csv_files);
    }
    debug!("Using CSV files {:?}", csv_files);

    let csv: Arc<dyn Discover> = Arc::new(
        CsvDiscoverer::new(&csv_files, config).map_err(|e| create_failed("CSV", e))?,
    );
    let ldcache = LdCacheUpdateHook::new(Arc::clone(&csv), config);
    let symlinks =
        CreateSymlinksHook::new(&csv_files, config).map_err(|e| create_failed("symlink hook", e))?;

    Ok(DiscoverList::new(vec![
        csv,
        Arc::new(ldcache),
        Arc::new(symlinks),
    ]))
}

fn create_failed(discoverer: &str, e: Error) -> Error {
    Error::DiscovererCreate {
        discoverer: discoverer.to_string(),
        reason: e.to_string(),
    }
}

/// Evaluates the image's requirements against the probed host.
///
/// Probe failures only leave the property unset; constraints on it are
/// then skipped with a warning.
pub fn check_requirements(image: &CudaImage, cuda: &dyn CudaProbe) -> Result<()> {
    if image.has_disable_require() {
        return Requirements::default().with_checks_disabled(true).assert();
    }

    let mut requirements = image
        .requirements()
        .and_then(Requirements::new)
        .map_err(|e| Error::RequirementsCheck(e.to_string()))?;

    match cuda.cuda_version() {
        Ok(version) => requirements.add_version_property(Property::Cuda, &version),
        Err(e) => warn!("Failed to get CUDA version: {}", e),
    }
    match cuda.compute_capability(REQUIREMENTS_PROBE_DEVICE) {
        Ok(capability) => requirements.add_version_property(Property::Arch, &capability),
        Err(e) => warn!("Failed to get CUDA Compute Capability: {}", e),
    }

    requirements.assert()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FakeCuda {
        version: Option<&'static str>,
        capability: Option<&'static str>,
        calls: Cell<usize>,
    }

    impl FakeCuda {
        fn new(version: Option<&'static str>, capability: Option<&'static str>) -> Self {
            Self {
                version,
                capability,
                calls: Cell::new(0),
            }
        }
    }

    impl CudaProbe for FakeCuda {
        fn cuda_version(&self) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            self.version.map(str::to_string).ok_or_else(|| Error::ProbeFailed {
                property: "CUDA version".to_string(),
                reason: "no driver".to_string(),
            })
        }

        fn compute_capability(&self, _device: u32) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            self.capability.map(str::to_string).ok_or_else(|| Error::ProbeFailed {
                property: "compute capability".to_string(),
                reason: "no device".to_string(),
            })
        }
    }

    #[test]
    fn test_check_requirements_met() {
        let image = CudaImage::from_env(&["NVIDIA_REQUIRE_CUDA=cuda>=11.4 arch>=7.2"]);
        let cuda = FakeCuda::new(Some("11.4"), Some("8.7"));
        check_requirements(&image, &cuda).unwrap();
    }

    #[test]
    fn test_check_requirements_unmet() {
        let image = CudaImage::from_env(&["NVIDIA_REQUIRE_CUDA=cuda>=12.0"]);
        let cuda = FakeCuda::new(Some("11.4"), Some("8.7"));
        let err = check_requirements(&image, &cuda).unwrap_err();
        assert!(matches!(err, Error::RequirementsNotMet { .. }));
    }

    #[test]
    fn test_check_requirements_probe_failures_are_skipped() {
        let image = CudaImage::from_env(&["NVIDIA_REQUIRE_CUDA=cuda>=12.0 arch>=9.0"]);
        let cuda = FakeCuda::new(None, None);
        check_requirements(&image, &cuda).unwrap();
    }

    #[test]
    fn test_check_requirements_disabled_skips_probing() {
        let image = CudaImage::from_env(&[
            "NVIDIA_REQUIRE_CUDA=cuda>=99.0",
            "NVIDIA_DISABLE_REQUIRE=true",
        ]);
        let cuda = FakeCuda::new(Some("11.4"), Some("8.7"));
        check_requirements(&image, &cuda).unwrap();
        assert_eq!(cuda.calls.get(), 0);
    }

    #[test]
    fn test_unreadable_requirements_name_the_stage() {
        let cuda = FakeCuda::new(Some("11.4"), Some("8.7"));

        let image = CudaImage::from_env(&["CUDA_VERSION=eleven"]);
        let err = check_requirements(&image, &cuda).unwrap_err();
        assert!(matches!(err, Error::RequirementsCheck(_)));
        assert!(err.to_string().starts_with("failed to get image requirements"));

        let image = CudaImage::from_env(&["NVIDIA_REQUIRE_CUDA=gpu>=1.0"]);
        let err = check_requirements(&image, &cuda).unwrap_err();
        assert!(matches!(err, Error::RequirementsCheck(_)));
        assert!(err.to_string().contains("gpu>=1.0"));
        assert_eq!(cuda.calls.get(), 0);
    }

    #[test]
    fn test_legacy_image_requires_its_cuda_version() {
        let image = CudaImage::from_env(&["CUDA_VERSION=10.2.89"]);
        let cuda = FakeCuda::new(Some("10.1"), None);
        let err = check_requirements(&image, &cuda).unwrap_err();
        assert!(err.to_string().contains("cuda>=10.2"));
    }
}
