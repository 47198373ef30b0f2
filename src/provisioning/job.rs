//! Background job tracking
//!
//! Mutations the cluster cannot finish synchronously answer `202 Accepted`
//! with a job reference; [`JobWaiter`] polls that job to a terminal state.

use crate::domain::model::JobState;
use crate::domain::ports::{Method, RemoteClientRef, RemoteResponse};
use crate::error::{Error, Result};
use crate::ontap::endpoints;
use crate::ontap::resources::JobRecord;
use crate::provisioning::poll::{poll_until, PollConfig, Probe};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Polls cluster jobs for one tenant
#[derive(Clone)]
pub struct JobWaiter {
    client: RemoteClientRef,
    tenant: String,
    poll: PollConfig,
    cancel: CancellationToken,
}

impl JobWaiter {
    pub fn new(
        client: RemoteClientRef,
        tenant: impl Into<String>,
        poll: PollConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            tenant: tenant.into(),
            poll,
            cancel,
        }
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait for a job to finish; anything but success is an error
    pub async fn await_job(&self, job_uuid: &str) -> Result<JobState> {
        let path = endpoints::job(job_uuid);
        let operation = format!("job {}", job_uuid);

        let (state, record, raw) = poll_until(&operation, &self.poll, &self.cancel, || {
            let client = self.client.clone();
            let tenant = self.tenant.clone();
            let path = path.clone();
            let job_uuid = job_uuid.to_string();
            async move {
                let resp = client.send(Method::GET, &path, &tenant, None).await?;
                if !resp.is_success() {
                    return Err(Error::RemoteOperationFailed {
                        operation: "get job".into(),
                        resource: path,
                        status: resp.status,
                        message: resp.error_message(),
                    });
                }

                let record: JobRecord = resp.parse()?;
                let state = record.job_state();
                debug!("Job {} is {}", job_uuid, state);

                if state.is_terminal() {
                    Ok(Probe::Ready((state, record, resp.body)))
                } else {
                    Ok(Probe::Pending)
                }
            }
        })
        .await?;

        if state != JobState::Success {
            return Err(Error::ProvisioningJobFailed {
                job: job_uuid.to_string(),
                state: state.to_string(),
                message: record.message.unwrap_or_default(),
                last_status: raw,
            });
        }

        info!("Job {} completed", job_uuid);
        Ok(state)
    }

    /// Wait out the job referenced by an accepted response, if any
    pub async fn settle(&self, resp: &RemoteResponse) -> Result<Option<JobState>> {
        match resp.job_uuid() {
            Some(uuid) if resp.is_accepted() => self.await_job(uuid).await.map(Some),
            _ => Ok(None),
        }
    }
}
