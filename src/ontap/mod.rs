//! ONTAP Management API Adapter
//!
//! Provides the HTTP implementation of the [`RemoteClient`](crate::domain::ports::RemoteClient)
//! port, the REST resource paths, and the wire types of the resources the
//! workflow touches.

pub mod client;
pub mod endpoints;
pub mod resources;

pub use client::*;
pub use endpoints::*;
pub use resources::*;
