//! # CUDA Image Descriptor
//!
//! Reads what a container image declares about its GPU needs from the
//! spec's process environment:
//!
//! | Variable                 | Meaning                                    |
//! |--------------------------|--------------------------------------------|
//! | `NVIDIA_REQUIRE_*`       | Requirement expressions (all must hold)    |
//! | `NVIDIA_DISABLE_REQUIRE` | Boolean; skip all requirement checks       |
//! | `CUDA_VERSION`           | Legacy images: implies `cuda>=major.minor` |
//!
//! `NVIDIA_REQUIRE_JETPACK` shares the prefix but selects CSV mounts; it is
//! not a requirement expression.

use crate::constants::{
    CUDA_VERSION_ENVVAR, DISABLE_REQUIRE_ENVVAR, REQUIRE_CUDA_ENVVAR, REQUIRE_ENVVAR_PREFIX,
    REQUIRE_JETPACK_ENVVAR,
};
use crate::error::Result;
use crate::requirements::Version;
use crate::spec::OciSpec;
use std::collections::BTreeMap;

/// Image environment relevant to GPU requirement checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CudaImage {
    env: BTreeMap<String, String>,
}

impl CudaImage {
    /// Builds the descriptor from the spec's process environment.
    ///
    /// Entries without `=` are ignored; later entries override earlier ones.
    pub fn from_spec(spec: &OciSpec) -> Self {
        Self::from_env(spec.env())
    }

    /// Builds the descriptor from `KEY=VALUE` entries.
    pub fn from_env<S: AsRef<str>>(env: &[S]) -> Self {
        let env = env
            .iter()
            .filter_map(|entry| entry.as_ref().split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { env }
    }

    pub fn getenv(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Returns true if the image disables requirement checks.
    pub fn has_disable_require(&self) -> bool {
        self.getenv(DISABLE_REQUIRE_ENVVAR)
            .and_then(parse_bool)
            .unwrap_or(false)
    }

    /// Returns true for images predating `NVIDIA_REQUIRE_CUDA`.
    pub fn is_legacy(&self) -> bool {
        let legacy_version = self.getenv(CUDA_VERSION_ENVVAR).unwrap_or_default();
        let cuda_require = self.getenv(REQUIRE_CUDA_ENVVAR).unwrap_or_default();
        !legacy_version.is_empty() && cuda_require.is_empty()
    }

    /// Returns the image's requirement expressions, ordered by variable name.
    pub fn requirements(&self) -> Result<Vec<String>> {
        let mut requirements: Vec<String> = self
            .env
            .iter()
            .filter(|(k, _)| k.starts_with(REQUIRE_ENVVAR_PREFIX) && *k != REQUIRE_JETPACK_ENVVAR)
            .map(|(_, v)| v.clone())
            .collect();

        if self.is_legacy() {
            let version: Version = self.getenv(CUDA_VERSION_ENVVAR).unwrap_or_default().parse()?;
            requirements.push(format!("cuda>={}.{}", version.major(), version.minor()));
        }

        Ok(requirements)
    }
}

/// Boolean spellings accepted for `NVIDIA_DISABLE_REQUIRE`.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_spellings() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("f"), Some(false));
        assert_eq!(parse_bool("yes"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_entries_without_equals_ignored() {
        let image = CudaImage::from_env(&["NVIDIA_REQUIRE_CUDA", "A=1"]);
        assert_eq!(image.getenv("NVIDIA_REQUIRE_CUDA"), None);
        assert_eq!(image.getenv("A"), Some("1"));
    }
}
