//! Host CUDA property probes.
//!
//! Probes feed [`crate::requirements::Requirements`]. A failing probe is not
//! fatal to the pipeline: the caller downgrades it to a warning and the
//! corresponding constraints are skipped.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Source of CUDA properties for requirement checks.
pub trait CudaProbe {
    /// Returns the CUDA driver API version (e.g. `12.2`).
    fn cuda_version(&self) -> Result<String>;

    /// Returns the compute capability of a device (e.g. `8.6`).
    fn compute_capability(&self, device: u32) -> Result<String>;
}

/// Probes via the `nvidia-smi` utility.
#[derive(Debug, Clone)]
pub struct NvidiaSmi {
    executable: PathBuf,
}

impl NvidiaSmi {
    pub fn new() -> Self {
        Self::with_executable("nvidia-smi")
    }

    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn run(&self, property: &str, args: &[&str]) -> Result<String> {
        let probe_failed = |reason: String| Error::ProbeFailed {
            property: property.to_string(),
            reason,
        };

        debug!("Running {} {:?}", self.executable.display(), args);
        let output = Command::new(&self.executable)
            .args(args)
            .output()
            .map_err(|e| probe_failed(format!("{}: {}", self.executable.display(), e)))?;

        if !output.status.success() {
            return Err(probe_failed(format!(
                "{} exited with {}: {}",
                self.executable.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        String::from_utf8(output.stdout).map_err(|e| probe_failed(e.to_string()))
    }
}

impl Default for NvidiaSmi {
    fn default() -> Self {
        Self::new()
    }
}

impl CudaProbe for NvidiaSmi {
    fn cuda_version(&self) -> Result<String> {
        let output = self.run("CUDA version", &[])?;
        parse_cuda_version(&output).ok_or_else(|| Error::ProbeFailed {
            property: "CUDA version".to_string(),
            reason: "no 'CUDA Version' in nvidia-smi output".to_string(),
        })
    }

    fn compute_capability(&self, device: u32) -> Result<String> {
        let index = device.to_string();
        let output = self.run(
            "compute capability",
            &["--query-gpu=compute_cap", "--format=csv,noheader", "-i", index.as_str()],
        )?;

        output
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::ProbeFailed {
                property: "compute capability".to_string(),
                reason: format!("no compute capability reported for device {}", device),
            })
    }
}

/// Extracts `12.2` from an nvidia-smi banner line `... CUDA Version: 12.2 |`.
fn parse_cuda_version(output: &str) -> Option<String> {
    let (_, rest) = output.split_once("CUDA Version:")?;
    rest.split_whitespace()
        .next()
        .map(|v| v.trim_end_matches('|').to_string())
        .filter(|v| !v.is_empty())
}
