//! Error types for the GPU spec modifier.

use std::path::PathBuf;

/// Result type alias for spec modification operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or applying GPU spec modifications.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Discover mode is not one of `auto`, `legacy`, `csv`.
    #[error("invalid discover mode: {0}")]
    InvalidDiscoverMode(String),

    /// Config file could not be read or parsed.
    #[error("failed to load config from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    // =========================================================================
    // Spec Access Errors
    // =========================================================================
    /// OCI spec could not be read or parsed.
    #[error("failed to load OCI spec from {path}: {reason}")]
    SpecLoad { path: PathBuf, reason: String },

    /// OCI spec could not be written back.
    #[error("failed to write OCI spec to {path}: {reason}")]
    SpecWrite { path: PathBuf, reason: String },

    /// Spec accessed before being loaded.
    #[error("OCI spec has not been loaded")]
    SpecNotLoaded,

    // =========================================================================
    // Discovery Errors
    // =========================================================================
    /// CSV mount-spec directory could not be listed.
    #[error("failed to get list of CSV files from {path}: {reason}")]
    CsvFileList { path: PathBuf, reason: String },

    /// Malformed line in a CSV mount spec.
    #[error("invalid mount spec {file}:{line}: {reason}")]
    InvalidMountSpec {
        file: PathBuf,
        line: usize,
        reason: String,
    },

    /// A discoverer could not be constructed.
    #[error("failed to create {discoverer} discoverer: {reason}")]
    DiscovererCreate { discoverer: String, reason: String },

    /// A discoverer failed while enumerating resources.
    #[error("{discoverer} discovery failed: {reason}")]
    DiscoveryFailed { discoverer: String, reason: String },

    // =========================================================================
    // Requirement Errors
    // =========================================================================
    /// Requirement expression could not be parsed.
    #[error("invalid requirement '{expression}': {reason}")]
    InvalidRequirement { expression: String, reason: String },

    /// One or more image requirements do not hold on this host.
    #[error("requirements not met: {}", .unmet.join("; "))]
    RequirementsNotMet { unmet: Vec<String> },

    /// Image requirements could not be read or parsed.
    #[error("failed to get image requirements: {0}")]
    RequirementsCheck(String),

    /// Version string is not dotted numeric.
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// Host property could not be probed.
    #[error("failed to probe {property}: {reason}")]
    ProbeFailed { property: String, reason: String },

    // =========================================================================
    // Modification Errors
    // =========================================================================
    /// Stale hooks could not be removed from the spec.
    #[error("failed to remove existing hooks: {0}")]
    HookRemovalFailed(String),

    /// Container edits could not be built from discovery.
    #[error("failed to get required container edits: {0}")]
    EditsFailed(String),

    /// An edit cannot be applied to the spec.
    #[error("invalid container edit: {0}")]
    InvalidEdit(String),

    // =========================================================================
    // Serialization Errors
    // =========================================================================
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
