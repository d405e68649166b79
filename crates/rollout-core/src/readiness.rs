use crate::catalog::DeploymentTarget;
use crate::cluster::{ClusterClient, Diagnostics};
use crate::config::ReadinessConfig;
use crate::error::ReadinessError;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Time allowed for collecting diagnostics once the wait has timed out.
const DIAGNOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Polls a workload until it reports available or the timeout elapses.
///
/// Never reports success without having observed `available` at least once,
/// and never waits past the timeout: each query gets only the time left
/// before the deadline, and the last sleep is clamped to it so the timeout
/// fires exactly on the boundary.
pub struct ReadinessWaiter<'a> {
    client: &'a dyn ClusterClient,
    timeout: Duration,
    poll_interval: Duration,
}

impl<'a> ReadinessWaiter<'a> {
    pub fn new(client: &'a dyn ClusterClient, config: &ReadinessConfig) -> Self {
        Self {
            client,
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn await_ready(&self, target: &DeploymentTarget) -> Result<(), ReadinessError> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        info!(workload = %target, timeout_secs = self.timeout.as_secs(), "waiting for availability");

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.client.readiness(target)).await {
                Ok(Ok(readiness)) if readiness.available => {
                    info!(workload = %target, elapsed_secs = started.elapsed().as_secs(), "available");
                    return Ok(());
                }
                Ok(Ok(readiness)) => {
                    debug!(workload = %target, detail = %readiness.detail, "not available yet");
                }
                Ok(Err(e)) => {
                    debug!(workload = %target, error = %e, "readiness query failed; retrying");
                }
                Err(_) => {
                    debug!(workload = %target, "readiness query still pending at the deadline");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let remaining = deadline - now;
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }

        let waited = started.elapsed();
        warn!(workload = %target, waited_secs = waited.as_secs(), "timed out waiting for availability");
        let diagnostics = match tokio::time::timeout(DIAGNOSE_TIMEOUT, self.client.diagnose(target))
            .await
        {
            Ok(Ok(diagnostics)) => diagnostics,
            Ok(Err(e)) => Diagnostics::unavailable(e.to_string()),
            Err(_) => Diagnostics::unavailable(format!(
                "no answer within {}s",
                DIAGNOSE_TIMEOUT.as_secs()
            )),
        };
        Err(ReadinessError {
            target: target.to_string(),
            waited,
            diagnostics,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
