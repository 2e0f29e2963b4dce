//! # magikgpu
//!
//! **GPU Support for OCI Container Specs**
//!
//! This crate decides whether a container's OCI runtime spec needs NVIDIA GPU
//! support and rewrites it before the low-level runtime sees it: stale GPU
//! hooks are removed, the host's GPU device nodes, driver libraries and
//! preparation hooks are discovered, and the result is merged into the spec.
//! Launching the low-level runtime is left to the caller.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                            magikgpu                                 │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────────┐    │
//! │  │                   GpuModifier (modifier)                    │    │
//! │  │   with_host(config, spec) → Option<GpuModifier> → modify    │    │
//! │  └─────────────────────────────────────────────────────────────┘    │
//! │          │                  │                       │               │
//! │  ┌───────┴───────┐  ┌───────┴────────┐  ┌───────────┴───────────┐   │
//! │  │ Mode Resolver │  │  Requirements  │  │   Hook Remover        │   │
//! │  │ auto → legacy │  │ cuda/arch/...  │  │ strip stale GPU hooks │   │
//! │  │      or csv   │  │ vs. probes     │  │                       │   │
//! │  └───────────────┘  └────────────────┘  └───────────────────────┘   │
//! │                              │                                      │
//! │  ┌───────────────────────────┴───────────────────────────────┐      │
//! │  │                 Discover (trait objects)                  │      │
//! │  │  Legacy │ CSV │ LdCacheUpdateHook │ CreateSymlinksHook    │      │
//! │  └───────────────────────────┬───────────────────────────────┘      │
//! │                              ▼                                      │
//! │  ┌───────────────────────────────────────────────────────────┐      │
//! │  │              EditSet → apply to OciSpec                   │      │
//! │  │  devices │ mounts │ env │ hooks per lifecycle phase       │      │
//! │  └───────────────────────────────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Discover Modes
//!
//! | Mode     | Hosts                 | Injected                                   |
//! |----------|-----------------------|--------------------------------------------|
//! | `legacy` | discrete GPU hosts    | prestart `nvidia-container-runtime-hook`   |
//! | `csv`    | Tegra / Jetson (L4T)  | CSV-listed devices and mounts, ldcache and |
//! |          |                       | symlink `createContainer` hooks            |
//! | `auto`   | any                   | resolves to one of the above               |
//!
//! # Opting In
//!
//! A container requests GPUs through `NVIDIA_VISIBLE_DEVICES` in its process
//! environment. When the variable is unset, empty or `void`, no modifier is
//! built and the spec is left alone.
//!
//! # Example
//!
//! ```rust,ignore
//! use magikgpu::{Config, FileSpec, GpuModifier, SpecSource};
//!
//! fn main() -> magikgpu::Result<()> {
//!     let config = Config::load_default()?;
//!     let mut spec = FileSpec::from_bundle(std::path::Path::new("."));
//!
//!     if let Some(modifier) = GpuModifier::new(&config, &mut spec)? {
//!         spec.modify(&modifier)?;
//!         spec.flush()?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod cuda;
pub mod discover;
pub mod edits;
pub mod error;
pub mod hook_remover;
pub mod image;
pub mod modifier;
pub mod platform;
pub mod requirements;
pub mod spec;

// Re-exports
pub use config::Config;
pub use constants::*;
pub use cuda::{CudaProbe, NvidiaSmi};
pub use discover::{Discover, DiscoverConfig, DiscoverList};
pub use edits::EditSet;
pub use error::{Error, Result};
pub use hook_remover::HookRemover;
pub use image::CudaImage;
pub use modifier::{GpuModifier, HostContext};
pub use platform::{DiscoverMode, HostPlatform, PlatformProbe, PlatformSignal, resolve_discover_mode};
pub use requirements::Requirements;
pub use spec::{FileSpec, HookLifecycle, MemorySpec, OciSpec, SpecModifier, SpecSource};
