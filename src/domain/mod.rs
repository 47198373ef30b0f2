//! Domain layer - Core workflow types and port definitions
//!
//! This module defines the remote-client port the workflow drives and the
//! plain data exchanged between provisioning stages.

pub mod model;
pub mod ports;

pub use model::*;
pub use ports::*;
