//! Domain Ports - Core trait definitions for the provisioner
//!
//! The workflow only needs one capability from the outside world: send an
//! authenticated request scoped to a tenant (SVM) and get back a status code
//! plus a JSON body. Adapters implement [`RemoteClient`] to provide it.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

pub use reqwest::Method;

// =============================================================================
// Remote Response
// =============================================================================

/// Status code and parsed JSON body of a remote call
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    /// HTTP status code
    pub status: u16,
    /// Parsed body (`Null` when the body was empty)
    pub body: Value,
}

impl RemoteResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Any 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 202: accepted, completes asynchronously
    pub fn is_accepted(&self) -> bool {
        self.status == 202
    }

    /// 409: the resource already exists
    pub fn is_conflict(&self) -> bool {
        self.status == 409
    }

    /// `records` array of a collection response
    pub fn records(&self) -> &[Value] {
        self.body
            .get("records")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// UUID of the background job referenced by an asynchronous response
    pub fn job_uuid(&self) -> Option<&str> {
        self.body.pointer("/job/uuid").and_then(Value::as_str)
    }

    /// Human-readable remote message for a failed call
    pub fn error_message(&self) -> String {
        match self.body.pointer("/error/message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None if self.body.is_null() => String::from("<empty body>"),
            None => self.body.to_string(),
        }
    }

    /// Deserialize the body into a typed record
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone()).map_err(Error::from)
    }
}

// =============================================================================
// Remote Client Port
// =============================================================================

/// Port for the storage cluster's management API
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Send one request scoped to `tenant`.
    ///
    /// `path` is relative to the API root and may carry an encoded query
    /// string. Status codes are returned as-is; no retries are attempted.
    async fn send(
        &self,
        method: Method,
        path: &str,
        tenant: &str,
        body: Option<&Value>,
    ) -> Result<RemoteResponse>;

    /// Endpoint description for logs
    fn endpoint(&self) -> &str;
}

pub type RemoteClientRef = Arc<dyn RemoteClient>;
