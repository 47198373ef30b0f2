//! Maintenance operations
//!
//! Day-two operations on resources created by the provisioning workflow:
//! removing export policies, volumes and single client IPs, and resizing
//! volumes. Missing targets are reported as outcomes rather than errors.

pub mod policy;
pub mod volume;

pub use policy::*;
pub use volume::*;

use serde::Serialize;

/// Result of a delete request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// Resource removed; `id` is the cluster identifier it had
    Deleted { id: String },
    /// Nothing with that name exists in the tenant
    NotFound,
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted { .. })
    }
}
