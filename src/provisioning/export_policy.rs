//! Export Policy Manager
//!
//! Ensures the volume's export policy exists and that its rules cover the
//! desired client IPs without duplicating any client already covered.

use crate::config::RuleFailurePolicy;
use crate::domain::model::{RuleOutcome, RuleStatus};
use crate::domain::ports::{Method, RemoteClientRef};
use crate::error::{Error, Result};
use crate::ontap::endpoints::{self, EXPORT_POLICIES};
use crate::ontap::resources::{ExportPolicyRecord, ExportRule};
use serde_json::json;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Export policy operations scoped to one tenant
pub struct ExportPolicyManager {
    client: RemoteClientRef,
    tenant: String,
    failure_policy: RuleFailurePolicy,
}

impl ExportPolicyManager {
    pub fn new(
        client: RemoteClientRef,
        tenant: impl Into<String>,
        failure_policy: RuleFailurePolicy,
    ) -> Self {
        Self {
            client,
            tenant: tenant.into(),
            failure_policy,
        }
    }

    /// Create the policy unless it already exists, then resolve its id
    pub async fn ensure_policy(&self, name: &str) -> Result<u64> {
        let resp = self
            .client
            .send(
                Method::POST,
                EXPORT_POLICIES,
                &self.tenant,
                Some(&json!({ "name": name })),
            )
            .await?;

        if resp.is_conflict() {
            info!("Export policy '{}' already exists, reusing it", name);
        } else if resp.is_success() {
            info!("Export policy '{}' created", name);
        } else {
            return Err(Error::PolicyCreation {
                policy: name.to_string(),
                status: resp.status,
                message: resp.error_message(),
            });
        }

        let id = self
            .find_policy(name)
            .await
            .map_err(|e| match e {
                transport @ Error::Transport { .. } => transport,
                other => Error::PolicyLookup {
                    policy: name.to_string(),
                    detail: other.to_string(),
                },
            })?
            .ok_or_else(|| Error::PolicyLookup {
                policy: name.to_string(),
                detail: "no matching record after create".into(),
            })?;

        debug!("Export policy '{}' has id {}", name, id);
        Ok(id)
    }

    /// Resolve a policy id by name
    pub async fn find_policy(&self, name: &str) -> Result<Option<u64>> {
        let record =
            endpoints::find_by_name(self.client.as_ref(), &self.tenant, EXPORT_POLICIES, name, None)
                .await?;

        match record {
            None => Ok(None),
            Some(record) => {
                let record: ExportPolicyRecord = serde_json::from_value(record)?;
                record.id.map(Some).ok_or_else(|| Error::PolicyLookup {
                    policy: name.to_string(),
                    detail: "record carries no id".into(),
                })
            }
        }
    }

    /// List a policy's rules with their client lists
    pub async fn list_rules(&self, policy_id: u64) -> Result<Vec<ExportRule>> {
        let path = format!("{}?fields=clients", endpoints::export_rules(policy_id));
        let resp = self
            .client
            .send(Method::GET, &path, &self.tenant, None)
            .await?;

        if !resp.is_success() {
            return Err(Error::RemoteOperationFailed {
                operation: "list rules".into(),
                resource: endpoints::export_rules(policy_id),
                status: resp.status,
                message: resp.error_message(),
            });
        }

        resp.records()
            .iter()
            .map(|r| serde_json::from_value(r.clone()).map_err(Error::from))
            .collect()
    }

    /// Add one rule per desired IP not yet covered.
    ///
    /// A rule that fails to apply is reported in its outcome and does not stop
    /// the remaining IPs. Outcomes follow the order of `desired_ips`, one per
    /// distinct IP.
    pub async fn reconcile_rules(
        &self,
        policy_id: u64,
        desired_ips: &[String],
    ) -> Result<Vec<RuleOutcome>> {
        let existing = self.list_rules(policy_id).await?;
        let mut present: HashSet<String> = existing
            .iter()
            .filter_map(|r| r.first_match().map(str::to_string))
            .collect();

        let rules_path = endpoints::export_rules(policy_id);
        let mut seen = HashSet::new();
        let mut outcomes = Vec::with_capacity(desired_ips.len());

        for ip in desired_ips {
            if !seen.insert(ip.as_str()) {
                continue;
            }

            if present.contains(ip) {
                debug!("Client {} already covered by policy {}", ip, policy_id);
                outcomes.push(RuleOutcome {
                    ip: ip.clone(),
                    status: RuleStatus::AlreadyPresent,
                });
                continue;
            }

            let rule = serde_json::to_value(ExportRule::nfs_any(ip))?;
            let resp = self
                .client
                .send(Method::POST, &rules_path, &self.tenant, Some(&rule))
                .await?;

            let status = if resp.is_success() {
                info!("Added export rule for {}", ip);
                present.insert(ip.clone());
                RuleStatus::Created
            } else {
                let message = resp.error_message();
                warn!("Failed to add export rule for {}: {}", ip, message);
                RuleStatus::Failed {
                    status: Some(resp.status),
                    message,
                }
            };

            outcomes.push(RuleOutcome {
                ip: ip.clone(),
                status,
            });
        }

        self.check_failure_policy(policy_id, &outcomes)?;
        Ok(outcomes)
    }

    fn check_failure_policy(&self, policy_id: u64, outcomes: &[RuleOutcome]) -> Result<()> {
        if self.failure_policy != RuleFailurePolicy::FailIfAllFailed {
            return Ok(());
        }

        let attempted = outcomes
            .iter()
            .filter(|o| o.status != RuleStatus::AlreadyPresent)
            .count();
        let failed = outcomes.iter().filter(|o| o.is_failed()).count();

        if attempted > 0 && failed == attempted {
            return Err(Error::RuleReconciliation {
                policy: format!("#{}", policy_id),
                failed,
            });
        }
        Ok(())
    }
}
