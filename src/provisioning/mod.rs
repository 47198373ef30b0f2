//! Provisioning workflow
//!
//! Export policy, export rules, volume creation with job and online waits,
//! post-creation tuning, and the orchestrator sequencing them.

pub mod export_policy;
pub mod job;
pub mod orchestrator;
pub mod poll;
pub mod post_config;
pub mod volume;

pub use export_policy::*;
pub use job::*;
pub use orchestrator::*;
pub use poll::*;
pub use post_config::*;
pub use volume::*;
