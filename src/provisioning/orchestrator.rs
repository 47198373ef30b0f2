//! Provisioning Orchestrator
//!
//! Runs one provisioning request end to end:
//! export policy → export rules → volume → post-creation settings.
//!
//! Fatal errors stop the run at the failing stage and leave earlier stages in
//! place; creation steps are idempotent, so the same request can be re-run.
//! Non-fatal failures are collected into the report.

use crate::config::ProvisionerConfig;
use crate::domain::model::{Advisory, Creation, RuleOutcome, Stage};
use crate::domain::ports::RemoteClientRef;
use crate::error::{Error, Result};
use crate::provisioning::export_policy::ExportPolicyManager;
use crate::provisioning::job::JobWaiter;
use crate::provisioning::poll::PollConfig;
use crate::provisioning::post_config::PostProvisionConfigurator;
use crate::provisioning::volume::{VolumeProvisioner, VolumeSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const GIB: u64 = 1024 * 1024 * 1024;

// =============================================================================
// Request / Report
// =============================================================================

/// Request to provision one NFS volume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub volume_name: String,
    pub aggregate: String,
    pub size_bytes: u64,
    /// Clients allowed to mount the volume
    pub client_ips: Vec<String>,
}

impl ProvisionRequest {
    /// Request sized in GiB
    pub fn new(
        volume_name: impl Into<String>,
        aggregate: impl Into<String>,
        size_gib: u64,
        client_ips: Vec<String>,
    ) -> Result<Self> {
        let size_bytes = size_gib.checked_mul(GIB).ok_or_else(|| {
            Error::Configuration(format!("volume size of {} GiB is too large", size_gib))
        })?;

        Ok(Self {
            volume_name: volume_name.into(),
            aggregate: aggregate.into(),
            size_bytes,
            client_ips,
        })
    }

    /// Export policy dedicated to this volume
    pub fn policy_name(&self) -> String {
        format!("{}_policy", self.volume_name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.volume_name.trim().is_empty() {
            return Err(Error::Configuration("volume name is empty".into()));
        }
        if self.aggregate.trim().is_empty() {
            return Err(Error::Configuration("aggregate name is empty".into()));
        }
        if self.size_bytes == 0 {
            return Err(Error::Configuration("volume size must be positive".into()));
        }
        if self.client_ips.is_empty() {
            return Err(Error::Configuration(
                "at least one client IP is required".into(),
            ));
        }
        Ok(())
    }
}

/// End state of a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub tenant: String,
    pub volume_name: String,
    pub volume_uuid: String,
    pub policy_name: String,
    pub policy_id: u64,
    pub size_bytes: u64,
    pub creation: Creation,
    pub rules: Vec<RuleOutcome>,
    pub advisories: Vec<Advisory>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ProvisionReport {
    /// No advisories were raised
    pub fn is_clean(&self) -> bool {
        self.advisories.is_empty()
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Sequences the provisioning stages for one tenant
pub struct Orchestrator {
    tenant: String,
    policies: ExportPolicyManager,
    volumes: VolumeProvisioner,
    configurator: PostProvisionConfigurator,
}

impl Orchestrator {
    pub fn new(
        client: RemoteClientRef,
        tenant: impl Into<String>,
        config: &ProvisionerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self::with_poll_config(client, tenant, config, config.poll_config(), cancel)
    }

    /// Like [`Orchestrator::new`] with explicit polling bounds, which may be
    /// finer than the whole seconds a config file allows
    pub fn with_poll_config(
        client: RemoteClientRef,
        tenant: impl Into<String>,
        config: &ProvisionerConfig,
        poll: PollConfig,
        cancel: CancellationToken,
    ) -> Self {
        let tenant = tenant.into();
        let jobs = JobWaiter::new(client.clone(), tenant.clone(), poll, cancel);

        Self {
            policies: ExportPolicyManager::new(
                client.clone(),
                tenant.clone(),
                config.rules.failure_policy,
            ),
            volumes: VolumeProvisioner::new(client.clone(), tenant.clone(), jobs)
                .with_failure_states(config.online.failure_states.clone()),
            configurator: PostProvisionConfigurator::new(client, tenant.clone()),
            tenant,
        }
    }

    /// Provision one volume
    pub async fn provision(&self, request: &ProvisionRequest) -> Result<ProvisionReport> {
        request.validate()?;
        let started_at = Utc::now();
        let policy_name = request.policy_name();

        info!(
            "Provisioning volume {} in SVM {} ({} bytes, {} client(s))",
            request.volume_name,
            self.tenant,
            request.size_bytes,
            request.client_ips.len()
        );

        let policy_id = self
            .policies
            .ensure_policy(&policy_name)
            .await
            .map_err(|e| e.at_stage(Stage::ExportPolicy))?;

        let rules = self
            .policies
            .reconcile_rules(policy_id, &request.client_ips)
            .await
            .map_err(|e| e.at_stage(Stage::ExportRules))?;

        let spec = VolumeSpec {
            name: request.volume_name.clone(),
            aggregate: request.aggregate.clone(),
            size_bytes: request.size_bytes,
            policy_id,
        };
        let volume = self.volumes.provision(&spec).await?;

        let mut advisories: Vec<Advisory> = rules.iter().filter_map(Advisory::from_rule).collect();
        advisories.extend(
            self.configurator
                .configure(&request.volume_name, &volume.uuid)
                .await,
        );

        for advisory in &advisories {
            warn!("Advisory: {}", advisory);
        }
        info!(
            "Volume {} provisioned ({} advisory item(s))",
            request.volume_name,
            advisories.len()
        );

        Ok(ProvisionReport {
            tenant: self.tenant.clone(),
            volume_name: request.volume_name.clone(),
            volume_uuid: volume.uuid,
            policy_name,
            policy_id,
            size_bytes: request.size_bytes,
            creation: volume.creation,
            rules,
            advisories,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
