//! Error types for the ONTAP NFS provisioner
//!
//! Provides a closed set of structured error kinds for the remote client,
//! the provisioning workflow stages and the maintenance operations.

use crate::domain::model::Stage;
use std::time::Duration;
use thiserror::Error;

/// Unified error type for the provisioner
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("Transport error: {method} {path}: {reason}")]
    Transport {
        method: String,
        path: String,
        reason: String,
    },

    // =========================================================================
    // Export Policy Errors
    // =========================================================================
    #[error("Failed to create export policy {policy} (HTTP {status}): {message}")]
    PolicyCreation {
        policy: String,
        status: u16,
        message: String,
    },

    #[error("Export policy {policy} could not be resolved: {detail}")]
    PolicyLookup { policy: String, detail: String },

    #[error("All {failed} export rule(s) for policy {policy} failed to apply")]
    RuleReconciliation { policy: String, failed: usize },

    // =========================================================================
    // Volume Errors
    // =========================================================================
    #[error("Failed to create volume {volume} (HTTP {status}): {message}")]
    VolumeCreation {
        volume: String,
        status: u16,
        message: String,
    },

    #[error("Volume {volume} not found after creation")]
    VolumeNotFound { volume: String },

    #[error("Volume {volume} entered state '{state}' while waiting for it to come online")]
    VolumeFailedState { volume: String, state: String },

    #[error("Background job {job} ended in state '{state}': {message}")]
    ProvisioningJobFailed {
        job: String,
        state: String,
        message: String,
        last_status: serde_json::Value,
    },

    // =========================================================================
    // Polling Errors
    // =========================================================================
    #[error("Timed out after {waited:?} waiting for {operation}")]
    Timeout { operation: String, waited: Duration },

    #[error("Cancelled while waiting for {operation}")]
    Cancelled { operation: String },

    // =========================================================================
    // Advisory Errors
    // =========================================================================
    #[error("Failed to apply {setting} to volume {volume} (HTTP {status:?}): {message}")]
    AdvisoryConfigFailure {
        volume: String,
        setting: String,
        status: Option<u16>,
        message: String,
    },

    // =========================================================================
    // Generic Remote Errors
    // =========================================================================
    #[error("Remote operation failed: {operation} {resource} (HTTP {status}): {message}")]
    RemoteOperationFailed {
        operation: String,
        resource: String,
        status: u16,
        message: String,
    },

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("Stage '{stage}' failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },

    // =========================================================================
    // Configuration / Parse Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Capacity parse error: {0}")]
    CapacityParse(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Attach the failing workflow stage to a fatal error
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            already @ Error::StageFailed { .. } => already,
            other => Error::StageFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage the error was raised in, if known
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost error, unwrapping stage context
    pub fn root(&self) -> &Error {
        match self {
            Error::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether re-running the same operation is expected to be safe and useful.
    ///
    /// Creation steps are idempotent, so anything short of bad input may be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.root(),
            Error::Configuration(_) | Error::CapacityParse(_) | Error::Cancelled { .. }
        )
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(self.root(), Error::Transport { .. } | Error::Timeout { .. })
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self.root() {
            Error::Configuration(_) | Error::CapacityParse(_) | Error::YamlParse(_) => 2,
            Error::Transport { .. } => 3,
            _ => 1,
        }
    }
}

/// Result type alias for the provisioner
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wrapping() {
        let err = Error::VolumeNotFound {
            volume: "v1".into(),
        }
        .at_stage(Stage::VolumeLookup);

        assert_eq!(err.stage(), Some(Stage::VolumeLookup));
        assert!(matches!(err.root(), Error::VolumeNotFound { .. }));
        assert!(err.to_string().contains("volume-lookup"));

        // Re-wrapping keeps the original stage
        let err = err.at_stage(Stage::OnlineWait);
        assert_eq!(err.stage(), Some(Stage::VolumeLookup));
    }

    #[test]
    fn test_error_retryable() {
        let transient = Error::Transport {
            method: "GET".into(),
            path: "/cluster/jobs/1".into(),
            reason: "connection refused".into(),
        };
        assert!(transient.is_retryable());
        assert!(transient.is_transient());
        assert_eq!(transient.exit_code(), 3);

        let config_err = Error::Configuration("missing cluster".into());
        assert!(!config_err.is_retryable());
        assert!(!config_err.is_transient());
        assert_eq!(config_err.exit_code(), 2);

        let job = Error::ProvisioningJobFailed {
            job: "j1".into(),
            state: "failure".into(),
            message: "aggregate full".into(),
            last_status: serde_json::Value::Null,
        }
        .at_stage(Stage::JobWait);
        assert!(job.is_retryable());
        assert_eq!(job.exit_code(), 1);
    }
}
