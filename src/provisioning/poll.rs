//! Bounded polling
//!
//! Waits on a remote condition at a fixed interval, bounded by a timeout and
//! an optional attempt cap, and abandoned as soon as the cancellation token
//! fires.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Polling bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two probes
    pub interval: Duration,
    /// Overall wait budget
    pub timeout: Duration,
    /// Optional cap on the number of probes
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(1800),
            max_attempts: None,
        }
    }
}

/// Result of one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    /// The condition holds; stop polling
    Ready(T),
    /// Not there yet
    Pending,
}

/// Probe until ready, timed out, out of attempts, or cancelled.
///
/// Probe errors end the wait immediately. A ready probe is never followed by
/// another probe.
pub async fn poll_until<T, F, Fut>(
    operation: &str,
    config: &PollConfig,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>>>,
{
    let started = Instant::now();
    // `None` when the timeout is beyond what the clock can represent
    let deadline = started.checked_add(config.timeout);
    let mut attempts: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                operation: operation.to_string(),
            });
        }

        attempts += 1;
        if let Probe::Ready(value) = probe().await? {
            debug!("{} ready after {} attempt(s)", operation, attempts);
            return Ok(value);
        }

        let out_of_attempts = config.max_attempts.map_or(false, |max| attempts >= max);
        let past_deadline = match (Instant::now().checked_add(config.interval), deadline) {
            (_, None) => false,
            (Some(next), Some(deadline)) => next > deadline,
            (None, Some(_)) => true,
        };
        if out_of_attempts || past_deadline {
            return Err(Error::Timeout {
                operation: operation.to_string(),
                waited: started.elapsed(),
            });
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(Error::Cancelled {
                    operation: operation.to_string(),
                });
            }
            _ = tokio::time::sleep(config.interval) => {}
        }
    }
}
