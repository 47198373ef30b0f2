//! Provisioner configuration
//!
//! One explicit configuration value is built at startup (optional YAML file,
//! then command-line overrides) and handed to each component.

use crate::error::{Error, Result};
use crate::provisioning::poll::PollConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Cluster Connection
// =============================================================================

/// Connection settings for the cluster management endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Management address (`10.0.0.5`) or base URL (`https://cluster/api`)
    pub endpoint: String,
    /// API user
    pub username: String,
    /// API password
    #[serde(skip_serializing)]
    pub password: String,
    /// Accept self-signed management certificates
    pub accept_invalid_certs: bool,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            username: String::new(),
            password: String::new(),
            accept_invalid_certs: true,
            request_timeout_secs: 60,
        }
    }
}

impl ClusterConfig {
    /// API root URL
    pub fn base_url(&self) -> String {
        let endpoint = self.endpoint.trim_end_matches('/');
        if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("https://{}/api", endpoint)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::Configuration("cluster endpoint is empty".into()));
        }
        if self.username.is_empty() {
            return Err(Error::Configuration("cluster username is empty".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Configuration(
                "request timeout must be at least one second".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Upper bound for poll interval and timeout, one week
pub const MAX_POLL_SECS: u64 = 7 * 24 * 60 * 60;

/// Poll settings as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Seconds between two polls; at least one when loaded from a file.
    /// Sub-second intervals are only reachable through [`PollConfig`] directly.
    pub interval_secs: u64,
    /// Give up after this many seconds
    pub timeout_secs: u64,
    /// Give up after this many polls
    pub max_attempts: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            timeout_secs: 1800,
            max_attempts: None,
        }
    }
}

impl From<&PollSettings> for PollConfig {
    fn from(settings: &PollSettings) -> Self {
        PollConfig {
            interval: Duration::from_secs(settings.interval_secs),
            timeout: Duration::from_secs(settings.timeout_secs),
            max_attempts: settings.max_attempts,
        }
    }
}

// =============================================================================
// Workflow Policies
// =============================================================================

/// What to do when export rules fail to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleFailurePolicy {
    /// Report failed rules as advisories; the run still succeeds
    #[default]
    Tolerate,
    /// Abort when every attempted rule failed
    FailIfAllFailed,
}

/// Export rule settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub failure_policy: RuleFailurePolicy,
}

/// Online-wait settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OnlineConfig {
    /// Volume states that abort the online wait instead of being polled through
    pub failure_states: Vec<String>,
}

// =============================================================================
// Top-level Configuration
// =============================================================================

/// Complete provisioner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    pub cluster: ClusterConfig,
    pub polling: PollSettings,
    pub rules: RulesConfig,
    pub online: OnlineConfig,
}

impl ProvisionerConfig {
    /// Load from a YAML file; missing fields take their defaults
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: ProvisionerConfig = serde_yaml::from_str(raw)?;
        config.validate_polling()?;
        Ok(config)
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig::from(&self.polling)
    }

    /// Check the whole configuration before any remote call
    pub fn validate(&self) -> Result<()> {
        self.cluster.validate()?;
        self.validate_polling()
    }

    fn validate_polling(&self) -> Result<()> {
        if self.polling.interval_secs == 0 {
            return Err(Error::Configuration(
                "poll interval must be at least one second".into(),
            ));
        }
        if self.polling.interval_secs > MAX_POLL_SECS || self.polling.timeout_secs > MAX_POLL_SECS {
            return Err(Error::Configuration(format!(
                "poll interval and timeout must not exceed {} seconds",
                MAX_POLL_SECS
            )));
        }
        if self.polling.max_attempts == Some(0) {
            return Err(Error::Configuration("max_attempts must be positive".into()));
        }
        Ok(())
    }
}
