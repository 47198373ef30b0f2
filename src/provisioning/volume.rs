//! Volume Provisioner
//!
//! Creates the thick-provisioned NFS volume and drives it to `online`:
//!
//! ```text
//! requested ──► (job pending)? ──► created ──► waiting-online ──► online
//! ```
//!
//! Whether the cluster creates the volume synchronously or through a
//! background job is invisible to callers of [`VolumeProvisioner::provision`].

use crate::domain::model::{Creation, Stage};
use crate::domain::ports::{Method, RemoteClientRef};
use crate::error::{Error, Result};
use crate::ontap::endpoints::{self, VOLUMES};
use crate::ontap::resources::{VolumeCreateRequest, VolumeRecord, VOLUME_ONLINE};
use crate::provisioning::job::JobWaiter;
use crate::provisioning::poll::{poll_until, Probe};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// What to create
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    pub aggregate: String,
    pub size_bytes: u64,
    pub policy_id: u64,
}

/// A created, online volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedVolume {
    pub uuid: String,
    pub creation: Creation,
}

/// Volume operations scoped to one tenant
pub struct VolumeProvisioner {
    client: RemoteClientRef,
    tenant: String,
    jobs: JobWaiter,
    /// Volume states that end the online wait with an error
    failure_states: Vec<String>,
}

impl VolumeProvisioner {
    pub fn new(client: RemoteClientRef, tenant: impl Into<String>, jobs: JobWaiter) -> Self {
        Self {
            client,
            tenant: tenant.into(),
            jobs,
            failure_states: Vec::new(),
        }
    }

    pub fn with_failure_states(mut self, states: Vec<String>) -> Self {
        self.failure_states = states;
        self
    }

    /// Create, wait for the job if any, resolve the UUID, wait for online.
    ///
    /// Errors carry the stage they were raised in.
    pub async fn provision(&self, spec: &VolumeSpec) -> Result<ProvisionedVolume> {
        let creation = self
            .create(&spec.name, &spec.aggregate, spec.size_bytes, spec.policy_id)
            .await
            .map_err(|e| e.at_stage(Stage::VolumeCreate))?;

        if let Creation::Job { uuid } = &creation {
            self.await_job(uuid)
                .await
                .map_err(|e| e.at_stage(Stage::JobWait))?;
        }

        let uuid = self
            .resolve_id(&spec.name)
            .await
            .map_err(|e| e.at_stage(Stage::VolumeLookup))?;

        self.await_online(&spec.name, &uuid)
            .await
            .map_err(|e| e.at_stage(Stage::OnlineWait))?;

        Ok(ProvisionedVolume { uuid, creation })
    }

    /// Submit the create request
    pub async fn create(
        &self,
        name: &str,
        aggregate: &str,
        size_bytes: u64,
        policy_id: u64,
    ) -> Result<Creation> {
        info!(
            "Creating volume {} on {} ({} bytes, policy {})",
            name, aggregate, size_bytes, policy_id
        );

        let body = serde_json::to_value(VolumeCreateRequest::thick_nfs(
            name, aggregate, size_bytes, policy_id,
        ))?;
        let resp = self
            .client
            .send(Method::POST, VOLUMES, &self.tenant, Some(&body))
            .await?;

        if !resp.is_success() {
            return Err(Error::VolumeCreation {
                volume: name.to_string(),
                status: resp.status,
                message: resp.error_message(),
            });
        }

        match resp.job_uuid() {
            Some(job) if resp.is_accepted() => {
                info!("Volume {} is being created by job {}", name, job);
                Ok(Creation::Job {
                    uuid: job.to_string(),
                })
            }
            _ => {
                info!("Volume {} created immediately", name);
                Ok(Creation::Immediate)
            }
        }
    }

    /// Wait for the creation job
    pub async fn await_job(&self, job_uuid: &str) -> Result<()> {
        self.jobs.await_job(job_uuid).await.map(|_| ())
    }

    /// Resolve a volume UUID by name; absence is an error
    pub async fn resolve_id(&self, name: &str) -> Result<String> {
        self.find(name, None)
            .await?
            .map(|v| v.uuid)
            .ok_or_else(|| Error::VolumeNotFound {
                volume: name.to_string(),
            })
    }

    /// Look a volume up by name
    pub async fn find(&self, name: &str, fields: Option<&str>) -> Result<Option<VolumeRecord>> {
        let record =
            endpoints::find_by_name(self.client.as_ref(), &self.tenant, VOLUMES, name, fields)
                .await?;
        record
            .map(|r| serde_json::from_value(r).map_err(Error::from))
            .transpose()
    }

    /// Poll the volume until its state is `online`
    pub async fn await_online(&self, name: &str, uuid: &str) -> Result<()> {
        let path = endpoints::volume(uuid);
        let operation = format!("volume {} to come online", name);

        poll_until(
            &operation,
            self.jobs.poll_config(),
            self.jobs.cancel_token(),
            || {
                let client = self.client.clone();
                let tenant = self.tenant.clone();
                let path = path.clone();
                let name = name.to_string();
                let failure_states = self.failure_states.clone();
                async move {
                    let resp = client.send(Method::GET, &path, &tenant, None).await?;
                    if !resp.is_success() {
                        return Err(Error::RemoteOperationFailed {
                            operation: "get volume".into(),
                            resource: path,
                            status: resp.status,
                            message: resp.error_message(),
                        });
                    }

                    let state = resp
                        .body
                        .get("state")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();

                    if state == VOLUME_ONLINE {
                        Ok(Probe::Ready(()))
                    } else if failure_states.contains(&state) {
                        Err(Error::VolumeFailedState {
                            volume: name,
                            state,
                        })
                    } else {
                        debug!("Volume {} is '{}', waiting", name, state);
                        Ok(Probe::Pending)
                    }
                }
            },
        )
        .await?;

        info!("Volume {} is online", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioning::poll::PollConfig;
    use crate::testing::FakeCluster;
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn provisioner(cluster: &Arc<FakeCluster>) -> VolumeProvisioner {
        let poll = PollConfig {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
            max_attempts: Some(50),
        };
        let jobs = JobWaiter::new(cluster.clone(), "dc0_d000", poll, CancellationToken::new());
        VolumeProvisioner::new(cluster.clone(), "dc0_d000", jobs)
    }

    fn spec(name: &str) -> VolumeSpec {
        VolumeSpec {
            name: name.into(),
            aggregate: "aggr1".into(),
            size_bytes: 10 * GIB,
            policy_id: 7,
        }
    }

    #[tokio::test]
    async fn test_sync_creation() {
        let cluster = FakeCluster::new();
        let volume = provisioner(&cluster).provision(&spec("v1")).await.unwrap();

        assert_eq!(volume.creation, Creation::Immediate);
        assert_eq!(cluster.count(Method::GET, "/cluster/jobs"), 0);

        let doc = cluster.volume("v1").unwrap();
        assert_eq!(doc["uuid"], volume.uuid.as_str());
        assert_eq!(doc["guarantee"]["type"], "volume");
        assert_eq!(doc["size"], 10 * GIB);
        assert_eq!(doc["nas"]["path"], "/v1");
        assert_eq!(doc["nas"]["export_policy"]["id"], 7);
        assert_eq!(doc["nas"]["security_style"], "unix");
        assert_eq!(doc["aggregates"][0]["name"], "aggr1");
    }

    #[tokio::test]
    async fn test_async_creation_is_transparent() {
        let cluster = FakeCluster::new();
        cluster.async_jobs(&["queued", "running", "success"]);
        cluster.volume_states(&["creating", "creating"]);

        let volume = provisioner(&cluster).provision(&spec("v1")).await.unwrap();

        assert_matches!(volume.creation, Creation::Job { .. });
        assert_eq!(cluster.count(Method::GET, "/cluster/jobs"), 3);
        // two non-online states, then online
        assert_eq!(cluster.count(Method::GET, &endpoints::volume(&volume.uuid)), 3);
        assert!(cluster.volume("v1").is_some());
    }

    #[tokio::test]
    async fn test_job_failure_stops_before_lookup() {
        let cluster = FakeCluster::new();
        cluster.async_jobs(&["running", "failure"]);

        let err = provisioner(&cluster).provision(&spec("v1")).await.unwrap_err();

        assert_eq!(err.stage(), Some(Stage::JobWait));
        assert_matches!(err.root(), Error::ProvisioningJobFailed { state, .. } if state == "failure");
        assert_eq!(cluster.count(Method::GET, VOLUMES), 0);
    }

    #[tokio::test]
    async fn test_create_rejected() {
        let cluster = FakeCluster::new();
        cluster.fail_volume_create(400);

        let err = provisioner(&cluster).provision(&spec("v1")).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::VolumeCreate));
        assert_matches!(err.root(), Error::VolumeCreation { status: 400, .. });
    }

    #[tokio::test]
    async fn test_volume_missing_after_create() {
        let cluster = FakeCluster::new();
        cluster.hide_volumes();

        let err = provisioner(&cluster).provision(&spec("v1")).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::VolumeLookup));
        assert_matches!(err.root(), Error::VolumeNotFound { volume } if volume == "v1");
    }

    #[tokio::test]
    async fn test_online_wait_times_out() {
        let cluster = FakeCluster::new();
        cluster.volume_states(&["error"; 60]);

        let err = provisioner(&cluster).provision(&spec("v1")).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::OnlineWait));
        assert_matches!(err.root(), Error::Timeout { .. });
    }

    #[tokio::test]
    async fn test_online_wait_failure_state() {
        let cluster = FakeCluster::new();
        cluster.volume_states(&["creating", "error"]);

        let err = provisioner(&cluster)
            .with_failure_states(vec!["error".into()])
            .provision(&spec("v1"))
            .await
            .unwrap_err();
        assert_matches!(err.root(), Error::VolumeFailedState { state, .. } if state == "error");
    }

    #[tokio::test]
    async fn test_find_with_fields() {
        let cluster = FakeCluster::new();
        cluster.with_volume("existing", 5 * GIB);

        let record = provisioner(&cluster)
            .find("existing", Some("size"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.size, Some(5 * GIB));
        assert!(provisioner(&cluster).find("absent", None).await.unwrap().is_none());
    }
}
