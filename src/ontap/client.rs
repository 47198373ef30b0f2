//! ONTAP REST Client
//!
//! `reqwest`-backed implementation of the remote client port. Every request
//! carries basic auth, JSON headers and the `X-Dot-SVM-Name` tenant header.

use crate::config::ClusterConfig;
use crate::domain::ports::{Method, RemoteClient, RemoteResponse};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tracing::debug;

/// Header that scopes a request to one SVM
pub const SVM_HEADER: &str = "X-Dot-SVM-Name";

/// HTTP client for the cluster management API
pub struct OntapClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl std::fmt::Debug for OntapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OntapClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl OntapClient {
    /// Create a client from cluster connection settings
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl RemoteClient for OntapClient {
    async fn send(
        &self,
        method: Method,
        path: &str,
        tenant: &str,
        body: Option<&Value>,
    ) -> Result<RemoteResponse> {
        let transport_err = |reason: String| Error::Transport {
            method: method.to_string(),
            path: path.to_string(),
            reason,
        };

        let tenant_header = HeaderValue::from_str(tenant)
            .map_err(|_| Error::Configuration(format!("Invalid SVM name: {}", tenant)))?;

        let mut request = self
            .http
            .request(method.clone(), self.url(path))
            .basic_auth(&self.username, Some(&self.password))
            .header(SVM_HEADER, tenant_header);
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!("{} {} (svm: {})", method, path, tenant);

        let response = request
            .send()
            .await
            .map_err(|e| transport_err(e.to_string()))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_err(e.to_string()))?;

        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| transport_err(format!("unparseable response body: {}", e)))?
        };

        debug!("{} {} -> {}", method, path, status);

        Ok(RemoteResponse::new(status, body))
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}
