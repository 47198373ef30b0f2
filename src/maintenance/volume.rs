//! Volume maintenance

use crate::capacity::format_capacity;
use crate::domain::model::JobState;
use crate::domain::ports::{Method, RemoteClientRef};
use crate::error::{Error, Result};
use crate::maintenance::DeleteOutcome;
use crate::ontap::endpoints::{self, VOLUMES};
use crate::ontap::resources::VolumeRecord;
use crate::provisioning::job::JobWaiter;
use serde::Serialize;
use serde_json::json;
use tracing::info;

/// Result of a resize request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResizeOutcome {
    Resized {
        uuid: String,
        previous_bytes: Option<u64>,
        requested_bytes: u64,
        /// Terminal state of the resize job, when the cluster used one
        job: Option<JobState>,
    },
    NotFound,
}

/// Volume maintenance for one tenant
pub struct VolumeMaintenance {
    client: RemoteClientRef,
    tenant: String,
    jobs: JobWaiter,
}

impl VolumeMaintenance {
    pub fn new(client: RemoteClientRef, tenant: impl Into<String>, jobs: JobWaiter) -> Self {
        Self {
            client,
            tenant: tenant.into(),
            jobs,
        }
    }

    async fn find(&self, name: &str, fields: Option<&str>) -> Result<Option<VolumeRecord>> {
        let record =
            endpoints::find_by_name(self.client.as_ref(), &self.tenant, VOLUMES, name, fields)
                .await?;
        record
            .map(|r| serde_json::from_value(r).map_err(Error::from))
            .transpose()
    }

    /// Delete a volume by name, waiting for the delete job if one is started
    pub async fn delete_volume(&self, name: &str) -> Result<DeleteOutcome> {
        let Some(volume) = self.find(name, None).await? else {
            info!("Volume {} not found in SVM {}", name, self.tenant);
            return Ok(DeleteOutcome::NotFound);
        };

        let resp = self
            .client
            .send(Method::DELETE, &endpoints::volume(&volume.uuid), &self.tenant, None)
            .await?;

        if !resp.is_success() {
            return Err(Error::RemoteOperationFailed {
                operation: "delete volume".into(),
                resource: name.to_string(),
                status: resp.status,
                message: resp.error_message(),
            });
        }
        self.jobs.settle(&resp).await?;

        info!("Volume {} ({}) deleted", name, volume.uuid);
        Ok(DeleteOutcome::Deleted { id: volume.uuid })
    }

    /// Change a volume's size
    pub async fn resize_volume(&self, name: &str, size_bytes: u64) -> Result<ResizeOutcome> {
        if size_bytes == 0 {
            return Err(Error::Configuration("volume size must be positive".into()));
        }

        let Some(volume) = self.find(name, Some("size")).await? else {
            info!("Volume {} not found in SVM {}", name, self.tenant);
            return Ok(ResizeOutcome::NotFound);
        };

        if let Some(current) = volume.size {
            info!("Volume {} is currently {}", name, format_capacity(current));
        }

        let body = json!({ "size": size_bytes });
        let resp = self
            .client
            .send(Method::PATCH, &endpoints::volume(&volume.uuid), &self.tenant, Some(&body))
            .await?;

        if !resp.is_success() {
            return Err(Error::RemoteOperationFailed {
                operation: "resize volume".into(),
                resource: name.to_string(),
                status: resp.status,
                message: resp.error_message(),
            });
        }
        let job = self.jobs.settle(&resp).await?;

        info!("Resize of {} to {} requested", name, format_capacity(size_bytes));
        Ok(ResizeOutcome::Resized {
            uuid: volume.uuid,
            previous_bytes: volume.size,
            requested_bytes: size_bytes,
            job,
        })
    }
}
