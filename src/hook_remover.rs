//! Removes hooks injected by earlier runtime wrappers so the GPU hooks are
//! never installed twice.

use crate::constants::{NVIDIA_CONTAINER_RUNTIME_HOOK, NVIDIA_CONTAINER_TOOLKIT_HOOK};
use crate::error::Result;
use crate::spec::{HookLifecycle, OciHook, OciSpec, SpecModifier};
use std::path::Path;
use tracing::debug;

/// Strips `nvidia-container-runtime-hook` and `nvidia-container-toolkit`
/// hooks from every lifecycle phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookRemover;

impl HookRemover {
    /// Returns true if the hook runs one of the legacy GPU hook executables.
    pub fn is_gpu_hook(hook: &OciHook) -> bool {
        Path::new(&hook.path)
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| {
                name == NVIDIA_CONTAINER_RUNTIME_HOOK || name == NVIDIA_CONTAINER_TOOLKIT_HOOK
            })
    }
}

impl SpecModifier for HookRemover {
    fn modify(&self, spec: &mut OciSpec) -> Result<()> {
        let Some(hooks) = spec.hooks.as_mut() else {
            return Ok(());
        };

        for lifecycle in HookLifecycle::ALL {
            hooks.phase_mut(lifecycle).retain(|hook| {
                if Self::is_gpu_hook(hook) {
                    debug!("Removing {} hook {:?}", lifecycle, hook.path);
                    false
                } else {
                    true
                }
            });
        }

        Ok(())
    }
}
