//! Workflow model
//!
//! Plain data passed between provisioning stages and reported to the caller.

use crate::error::Error;
use serde::{Deserialize, Serialize};

// =============================================================================
// Stages
// =============================================================================

/// Provisioning workflow stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    ExportPolicy,
    ExportRules,
    VolumeCreate,
    JobWait,
    VolumeLookup,
    OnlineWait,
    SnapshotPolicy,
    FinalSettings,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::ExportPolicy => write!(f, "export-policy"),
            Stage::ExportRules => write!(f, "export-rules"),
            Stage::VolumeCreate => write!(f, "volume-create"),
            Stage::JobWait => write!(f, "job-wait"),
            Stage::VolumeLookup => write!(f, "volume-lookup"),
            Stage::OnlineWait => write!(f, "online-wait"),
            Stage::SnapshotPolicy => write!(f, "snapshot-policy"),
            Stage::FinalSettings => write!(f, "final-settings"),
        }
    }
}

// =============================================================================
// Background Jobs
// =============================================================================

/// State of a cluster background job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Paused,
    Success,
    Failure,
    Canceled,
    /// Anything the cluster reports that we don't know; never terminal
    Unknown,
}

impl JobState {
    /// Parse the `state` field of a job record
    pub fn parse(s: &str) -> Self {
        match s {
            "queued" => JobState::Queued,
            "running" => JobState::Running,
            "paused" => JobState::Paused,
            "success" => JobState::Success,
            "failure" => JobState::Failure,
            "canceled" | "cancelled" => JobState::Canceled,
            _ => JobState::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Success | JobState::Failure | JobState::Canceled)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::Running => write!(f, "running"),
            JobState::Paused => write!(f, "paused"),
            JobState::Success => write!(f, "success"),
            JobState::Failure => write!(f, "failure"),
            JobState::Canceled => write!(f, "canceled"),
            JobState::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// Volume Creation
// =============================================================================

/// How the cluster accepted a volume create request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Creation {
    /// The volume existed as soon as the call returned
    Immediate,
    /// A background job is finishing the creation
    Job { uuid: String },
}

// =============================================================================
// Rule Reconciliation
// =============================================================================

/// What happened to one desired client IP during rule reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RuleStatus {
    AlreadyPresent,
    Created,
    Failed {
        status: Option<u16>,
        message: String,
    },
}

/// Outcome for one client IP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub ip: String,
    #[serde(flatten)]
    pub status: RuleStatus,
}

impl RuleOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, RuleStatus::Failed { .. })
    }
}

// =============================================================================
// Advisories
// =============================================================================

/// A non-fatal failure reported alongside a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub stage: Stage,
    /// What the advisory is about (client IP, setting name)
    pub subject: String,
    pub status: Option<u16>,
    pub message: String,
}

impl Advisory {
    /// Build an advisory from a failed rule outcome
    pub fn from_rule(outcome: &RuleOutcome) -> Option<Self> {
        match &outcome.status {
            RuleStatus::Failed { status, message } => Some(Self {
                stage: Stage::ExportRules,
                subject: outcome.ip.clone(),
                status: *status,
                message: message.clone(),
            }),
            _ => None,
        }
    }

    /// Build an advisory from an error raised by a non-fatal stage
    pub fn from_error(stage: Stage, err: &Error) -> Self {
        match err {
            Error::AdvisoryConfigFailure {
                setting,
                status,
                message,
                ..
            } => Self {
                stage,
                subject: setting.clone(),
                status: *status,
                message: message.clone(),
            },
            other => Self {
                stage,
                subject: stage.to_string(),
                status: None,
                message: other.to_string(),
            },
        }
    }
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "[{}] {} (HTTP {}): {}",
                self.stage, self.subject, status, self.message
            ),
            None => write!(f, "[{}] {}: {}", self.stage, self.subject, self.message),
        }
    }
}
