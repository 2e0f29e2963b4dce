//! # GPU Spec Modifier Constants
//!
//! Environment variable names, well-known host paths, and hook executable
//! names used by the modification pipeline. These constants are the
//! **single source of truth** for every string the pipeline matches on.
//!
//! ## Cross-References
//!
//! - [`crate::platform`]: Uses the Tegra marker paths for `auto` mode
//! - [`crate::image`]: Uses the `NVIDIA_REQUIRE_*` family of variables
//! - [`crate::modifier`]: Uses the visibility and Jetpack variables
//! - [`crate::hook_remover`]: Uses the legacy hook executable names
//! - [`crate::discover`]: Uses the CSV directory and `nvidia-ctk` defaults

// =============================================================================
// Container Environment
// =============================================================================
//
// These variables are read from the *container's* declared environment
// (`process.env` in config.json), never from the runtime's own process.
// =============================================================================

/// Selects the GPUs visible to the container.
///
/// Absent, empty, or [`VISIBLE_DEVICES_VOID`] means the container gets no
/// GPU and the spec is left untouched.
pub const VISIBLE_DEVICES_ENVVAR: &str = "NVIDIA_VISIBLE_DEVICES";

/// Explicit "no GPU" value for [`VISIBLE_DEVICES_ENVVAR`].
pub const VISIBLE_DEVICES_VOID: &str = "void";

/// Jetpack mount selection on Tegra systems.
pub const REQUIRE_JETPACK_ENVVAR: &str = "NVIDIA_REQUIRE_JETPACK";

/// Value of [`REQUIRE_JETPACK_ENVVAR`] that mounts every CSV file instead
/// of the base set.
pub const CSV_MOUNTS_ALL: &str = "csv-mounts=all";

/// Image-declared switch that disables all requirement checks.
pub const DISABLE_REQUIRE_ENVVAR: &str = "NVIDIA_DISABLE_REQUIRE";

/// Prefix shared by all image-declared requirement variables.
pub const REQUIRE_ENVVAR_PREFIX: &str = "NVIDIA_REQUIRE_";

/// CUDA requirement variable set by current CUDA base images.
pub const REQUIRE_CUDA_ENVVAR: &str = "NVIDIA_REQUIRE_CUDA";

/// CUDA toolkit version set by legacy CUDA base images.
///
/// Images that set this without [`REQUIRE_CUDA_ENVVAR`] implicitly require
/// `cuda>=<major>.<minor>`.
pub const CUDA_VERSION_ENVVAR: &str = "CUDA_VERSION";

// =============================================================================
// Platform Markers
// =============================================================================
//
// Evidence consulted, in this order, when the discover mode is `auto`.
// =============================================================================

/// Release file present on L4T (Jetson) installations.
pub const TEGRA_RELEASE_FILE: &str = "/etc/nv_tegra_release";

/// SoC family descriptor exposed by the kernel.
pub const TEGRA_FAMILY_FILE: &str = "/sys/devices/soc0/family";

/// Case-insensitive prefix of [`TEGRA_FAMILY_FILE`] on Tegra SoCs.
pub const TEGRA_FAMILY_PREFIX: &str = "tegra";

// =============================================================================
// CSV Mount Specs
// =============================================================================

/// Directory holding the `*.csv` mount specs shipped with L4T.
pub const DEFAULT_MOUNT_SPEC_PATH: &str = "/etc/nvidia-container-runtime/host-files-for-container.d";

/// CSV files mounted unless the image opts into [`CSV_MOUNTS_ALL`].
pub const BASE_CSV_FILES: &[&str] = &["devices.csv", "drivers.csv", "l4t.csv"];

/// Mount options applied to every CSV-discovered bind mount.
pub const CSV_MOUNT_OPTIONS: &[&str] = &["ro", "nosuid", "nodev", "bind"];

// =============================================================================
// Hook Executables
// =============================================================================

/// Legacy prestart hook executable.
pub const NVIDIA_CONTAINER_RUNTIME_HOOK: &str = "nvidia-container-runtime-hook";

/// Alternate name the legacy hook is installed under.
pub const NVIDIA_CONTAINER_TOOLKIT_HOOK: &str = "nvidia-container-toolkit";

/// Fallback location of the legacy hook when it is not found under the root.
pub const DEFAULT_RUNTIME_HOOK_PATH: &str = "/usr/bin/nvidia-container-runtime-hook";

/// NVIDIA Container Toolkit CLI executable name.
pub const NVIDIA_CTK: &str = "nvidia-ctk";

/// Fallback location of `nvidia-ctk`.
pub const DEFAULT_NVIDIA_CTK_PATH: &str = "/usr/bin/nvidia-ctk";

/// Directories searched (under the configured root) for hook executables.
pub const EXECUTABLE_SEARCH_PATHS: &[&str] = &[
    "/usr/local/sbin",
    "/usr/local/bin",
    "/usr/sbin",
    "/usr/bin",
    "/sbin",
    "/bin",
];

// =============================================================================
// Configuration
// =============================================================================

/// System-wide configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/nvidia-container-runtime/config.toml";

/// Configuration file path relative to `$XDG_CONFIG_HOME`.
pub const CONFIG_FILE_RELATIVE_PATH: &str = "nvidia-container-runtime/config.toml";

/// Default discover mode when the config does not set one.
pub const DEFAULT_DISCOVER_MODE: &str = "auto";

/// Name of the OCI runtime config inside a bundle.
pub const BUNDLE_CONFIG_FILE: &str = "config.json";

/// Probed GPU used for compute capability requirements.
pub const REQUIREMENTS_PROBE_DEVICE: u32 = 0;
