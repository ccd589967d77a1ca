//! Error kinds for a deployment run
//!
//! Every variant is fatal: the orchestrator stops at the first error and the
//! binary exits with status 1. Identity collisions are not errors, they are
//! corrected by the resolver.

use std::path::PathBuf;

/// Errors raised while synthesizing and merging deployment configuration
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Apps root or a setup file is missing or unreadable
    #[error("configuration not found at {0}")]
    ConfigurationNotFound(PathBuf),

    /// A setup file could not be parsed or lacks a required key
    #[error("malformed setup {path}: {reason}")]
    MalformedSetup { path: PathBuf, reason: String },

    /// An environment provisioning subprocess failed
    #[error("[{app}] provisioning failed running `{command}`: {status}")]
    ProvisioningFailure {
        app: String,
        command: String,
        status: String,
    },

    /// Reading, backing up or writing a shared configuration file failed
    #[error("file system failure on {path}: {source}")]
    FileSystemFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The proxy configuration exists but has no catch-all marker to insert before
    #[error("{0} has no catch-all marker, refusing to guess an insertion point")]
    MergeAnchorMissing(PathBuf),

    /// The tool configuration file could not be parsed
    #[error("invalid tool configuration: {0}")]
    InvalidToolConfig(String),
}

impl DeployError {
    /// Wrap an I/O error with the path it happened on
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DeployError::FileSystemFailure {
            path: path.into(),
            source,
        }
    }

    /// Short machine-friendly name for the error kind, logged as the `kind` field
    pub fn kind(&self) -> &'static str {
        match self {
            DeployError::ConfigurationNotFound(_) => "CONFIGURATION_NOT_FOUND",
            DeployError::MalformedSetup { .. } => "MALFORMED_SETUP",
            DeployError::ProvisioningFailure { .. } => "PROVISIONING_FAILURE",
            DeployError::FileSystemFailure { .. } => "FILE_SYSTEM_FAILURE",
            DeployError::MergeAnchorMissing(_) => "MERGE_ANCHOR_MISSING",
            DeployError::InvalidToolConfig(_) => "INVALID_TOOL_CONFIG",
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
