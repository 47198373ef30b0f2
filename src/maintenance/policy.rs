//! Export policy maintenance

use crate::config::RuleFailurePolicy;
use crate::domain::ports::{Method, RemoteClientRef};
use crate::error::{Error, Result};
use crate::maintenance::DeleteOutcome;
use crate::ontap::endpoints;
use crate::ontap::resources::{ClientMatch, ExportRule};
use crate::provisioning::export_policy::ExportPolicyManager;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

/// What happened to one rule while removing a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RuleAction {
    /// The client was the rule's last one; the rule is gone
    RuleDeleted,
    /// The client was dropped from the rule's client list
    ClientRemoved { remaining: Vec<String> },
    Failed { status: u16, message: String },
}

/// Edit applied to one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleEdit {
    pub index: u32,
    #[serde(flatten)]
    pub action: RuleAction,
}

/// Export policy maintenance for one tenant
pub struct PolicyMaintenance {
    client: RemoteClientRef,
    tenant: String,
    policies: ExportPolicyManager,
}

impl PolicyMaintenance {
    pub fn new(client: RemoteClientRef, tenant: impl Into<String>) -> Self {
        let tenant = tenant.into();
        Self {
            policies: ExportPolicyManager::new(
                client.clone(),
                tenant.clone(),
                RuleFailurePolicy::default(),
            ),
            client,
            tenant,
        }
    }

    /// Delete an export policy by name.
    ///
    /// The cluster refuses to delete a policy still attached to a volume; that
    /// refusal comes back as [`Error::RemoteOperationFailed`].
    pub async fn delete_export_policy(&self, name: &str) -> Result<DeleteOutcome> {
        let Some(id) = self.policies.find_policy(name).await? else {
            info!("Export policy '{}' not found in SVM {}", name, self.tenant);
            return Ok(DeleteOutcome::NotFound);
        };

        let path = endpoints::export_policy(id);
        let resp = self
            .client
            .send(Method::DELETE, &path, &self.tenant, None)
            .await?;

        if !resp.is_success() {
            return Err(Error::RemoteOperationFailed {
                operation: "delete export policy".into(),
                resource: name.to_string(),
                status: resp.status,
                message: resp.error_message(),
            });
        }

        info!("Export policy '{}' (id {}) deleted", name, id);
        Ok(DeleteOutcome::Deleted { id: id.to_string() })
    }

    /// Remove one client IP from every rule of a policy.
    ///
    /// Rules left without clients are deleted; others are patched with the
    /// remaining clients. An empty result means no rule listed the IP.
    pub async fn remove_client_ip(&self, policy: &str, ip: &str) -> Result<Vec<RuleEdit>> {
        let id = self
            .policies
            .find_policy(policy)
            .await?
            .ok_or_else(|| Error::ResourceNotFound {
                kind: "export-policy".into(),
                name: policy.to_string(),
            })?;

        let mut edits = Vec::new();
        for listed in self.policies.list_rules(id).await? {
            let Some(index) = listed.index else {
                continue;
            };
            if let Some(edit) = self.remove_from_rule(id, index, ip).await? {
                edits.push(edit);
            }
        }

        if edits.is_empty() {
            info!("No export rule in '{}' lists {}", policy, ip);
        }
        Ok(edits)
    }

    async fn remove_from_rule(&self, policy_id: u64, index: u32, ip: &str) -> Result<Option<RuleEdit>> {
        let path = endpoints::export_rule(policy_id, index);
        let resp = self
            .client
            .send(Method::GET, &path, &self.tenant, None)
            .await?;

        if !resp.is_success() {
            warn!("Failed to read export rule {}: {}", index, resp.error_message());
            return Ok(Some(RuleEdit {
                index,
                action: RuleAction::Failed {
                    status: resp.status,
                    message: resp.error_message(),
                },
            }));
        }

        let rule: ExportRule = resp.parse()?;
        if !rule.covers(ip) {
            return Ok(None);
        }

        let remaining: Vec<ClientMatch> = rule
            .clients
            .into_iter()
            .filter(|c| c.pattern != ip)
            .collect();

        let (resp, action) = if remaining.is_empty() {
            let resp = self
                .client
                .send(Method::DELETE, &path, &self.tenant, None)
                .await?;
            (resp, RuleAction::RuleDeleted)
        } else {
            let body = json!({ "clients": remaining });
            let resp = self
                .client
                .send(Method::PATCH, &path, &self.tenant, Some(&body))
                .await?;
            let remaining = remaining.into_iter().map(|c| c.pattern).collect();
            (resp, RuleAction::ClientRemoved { remaining })
        };

        if !resp.is_success() {
            let message = resp.error_message();
            warn!("Failed to update export rule {}: {}", index, message);
            return Ok(Some(RuleEdit {
                index,
                action: RuleAction::Failed {
                    status: resp.status,
                    message,
                },
            }));
        }

        match &action {
            RuleAction::RuleDeleted => info!("Deleted rule {} (last client {} removed)", index, ip),
            _ => info!("Updated rule {}, removed {}", index, ip),
        }
        Ok(Some(RuleEdit { index, action }))
    }
}
