//! Post-Provision Configurator
//!
//! Space and efficiency tuning applied once the volume is online. Failures
//! here leave a usable volume behind and are reported, not raised.

use crate::domain::model::{Advisory, Stage};
use crate::domain::ports::{Method, RemoteClientRef};
use crate::error::{Error, Result};
use crate::ontap::endpoints;
use crate::ontap::resources::{FinalSettingsPatch, NamedRef, SnapshotPolicyPatch, SNAPSHOT_POLICY_NONE};
use serde::Serialize;
use tracing::{info, warn};

/// Applies the post-creation patches to one volume
pub struct PostProvisionConfigurator {
    client: RemoteClientRef,
    tenant: String,
}

impl PostProvisionConfigurator {
    pub fn new(client: RemoteClientRef, tenant: impl Into<String>) -> Self {
        Self {
            client,
            tenant: tenant.into(),
        }
    }

    /// Apply both patches in order, collecting failures as advisories
    pub async fn configure(&self, name: &str, uuid: &str) -> Vec<Advisory> {
        let mut advisories = Vec::new();

        if let Err(e) = self.attach_snapshot_policy(name, uuid).await {
            warn!("{}", e);
            advisories.push(Advisory::from_error(Stage::SnapshotPolicy, &e));
        }

        if let Err(e) = self.apply_final_settings(name, uuid).await {
            warn!("{}", e);
            advisories.push(Advisory::from_error(Stage::FinalSettings, &e));
        }

        advisories
    }

    /// Attach the `none` snapshot policy, disabling scheduled snapshots
    pub async fn attach_snapshot_policy(&self, name: &str, uuid: &str) -> Result<()> {
        let patch = SnapshotPolicyPatch {
            snapshot_policy: NamedRef::new(SNAPSHOT_POLICY_NONE),
        };
        self.patch(name, uuid, "snapshot policy", &patch).await?;

        info!(
            "'{}' snapshot policy attached; no snapshots will be taken for {}",
            SNAPSHOT_POLICY_NONE, name
        );
        Ok(())
    }

    /// Zero snapshot reserve, hide `.snapshot`, disable efficiency
    pub async fn apply_final_settings(&self, name: &str, uuid: &str) -> Result<()> {
        self.patch(name, uuid, "final settings", &FinalSettingsPatch::lean())
            .await?;

        info!("Final volume settings applied to {}", name);
        Ok(())
    }

    async fn patch<T: Serialize>(&self, name: &str, uuid: &str, setting: &str, body: &T) -> Result<()> {
        let advisory = |status: Option<u16>, message: String| Error::AdvisoryConfigFailure {
            volume: name.to_string(),
            setting: setting.to_string(),
            status,
            message,
        };

        let body = serde_json::to_value(body)?;
        let resp = self
            .client
            .send(Method::PATCH, &endpoints::volume(uuid), &self.tenant, Some(&body))
            .await
            .map_err(|e| advisory(None, e.to_string()))?;

        if !resp.is_success() {
            return Err(advisory(Some(resp.status), resp.error_message()));
        }
        Ok(())
    }
}
