//! Tests for stale GPU hook removal.

use magikgpu::hook_remover::HookRemover;
use magikgpu::spec::{HookLifecycle, OciSpec, SpecModifier};

fn spec() -> OciSpec {
    OciSpec::from_json(
        r#"{
            "ociVersion": "1.0.2",
            "hooks": {
                "prestart": [
                    {"path": "/usr/bin/nvidia-container-runtime-hook", "args": ["nvidia-container-runtime-hook", "prestart"]},
                    {"path": "/usr/local/bin/other-hook"}
                ],
                "createContainer": [
                    {"path": "/usr/bin/nvidia-container-toolkit"},
                    {"path": "/usr/bin/nvidia-ctk", "args": ["nvidia-ctk", "hook", "update-ldcache"]}
                ],
                "poststop": [
                    {"path": "/opt/nvidia/nvidia-container-runtime-hook"}
                ]
            }
        }"#,
    )
    .unwrap()
}

fn paths(spec: &OciSpec, lifecycle: HookLifecycle) -> Vec<String> {
    spec.hooks
        .as_ref()
        .map(|h| h.phase(lifecycle).iter().map(|h| h.path.clone()).collect())
        .unwrap_or_default()
}

#[test]
fn test_removes_gpu_hooks_from_every_phase() {
    let mut spec = spec();
    HookRemover.modify(&mut spec).unwrap();

    assert_eq!(
        paths(&spec, HookLifecycle::Prestart),
        vec!["/usr/local/bin/other-hook"]
    );
    assert_eq!(
        paths(&spec, HookLifecycle::CreateContainer),
        vec!["/usr/bin/nvidia-ctk"]
    );
    assert!(paths(&spec, HookLifecycle::Poststop).is_empty());
}

#[test]
fn test_removal_is_idempotent() {
    let mut once = spec();
    HookRemover.modify(&mut once).unwrap();

    let mut twice = once.clone();
    HookRemover.modify(&mut twice).unwrap();

    assert_eq!(once, twice);
}

#[test]
fn test_spec_without_gpu_hooks_unchanged() {
    let original = OciSpec::from_json(
        r#"{"hooks": {"prestart": [{"path": "/usr/bin/my-hook"}]}, "hostname": "h"}"#,
    )
    .unwrap();
    let mut spec = original.clone();

    HookRemover.modify(&mut spec).unwrap();
    assert_eq!(spec, original);
}

#[test]
fn test_spec_without_hooks_section() {
    let mut spec = OciSpec::default();
    HookRemover.modify(&mut spec).unwrap();
    assert_eq!(spec, OciSpec::default());
}
