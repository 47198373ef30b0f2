//! ONTAP NFS Provisioner
//!
//! Provisions NFS volumes on an ONTAP cluster through its management REST
//! API: a per-volume export policy, one export rule per client, a
//! thick-provisioned UNIX-style volume and its post-creation tuning.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Provisioning Orchestrator                       │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌────────────────┐  ┌────────────────┐  ┌───────────────────────┐  │
//! │  │ Export Policy  │─►│     Volume     │─►│  Post-Provision       │  │
//! │  │ + Rules        │  │ (job + online) │  │  Configurator         │  │
//! │  └────────────────┘  └────────────────┘  └───────────────────────┘  │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │              Maintenance (delete / remove IP / resize)              │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │           RemoteClient port  ──►  OntapClient (reqwest)             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`provisioning`]: Provisioning workflow stages and orchestrator
//! - [`maintenance`]: Day-two operations on provisioned resources
//! - [`ontap`]: HTTP client, REST paths and wire types
//! - [`domain`]: Workflow types and the remote client port
//! - [`config`]: Provisioner configuration
//! - [`capacity`]: Capacity string parsing
//! - [`error`]: Error types and handling

pub mod capacity;
pub mod config;
pub mod domain;
pub mod error;
pub mod maintenance;
pub mod ontap;
pub mod provisioning;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{ClusterConfig, PollSettings, ProvisionerConfig, RuleFailurePolicy};

pub use domain::model::{Advisory, Creation, JobState, RuleOutcome, RuleStatus, Stage};
pub use domain::ports::{RemoteClient, RemoteClientRef, RemoteResponse};

pub use error::{Error, Result};

pub use maintenance::{
    DeleteOutcome, PolicyMaintenance, ResizeOutcome, RuleAction, RuleEdit, VolumeMaintenance,
};

pub use ontap::OntapClient;

pub use provisioning::{
    JobWaiter, Orchestrator, PollConfig, ProvisionReport, ProvisionRequest,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
