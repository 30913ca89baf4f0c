use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::api::PlatformApi;
use crate::error::KilnError;
use crate::model::{RuntimeRecord, RuntimeState};

/// Fixed spacing between status fetches.
pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Readiness budget used when the caller does not supply one.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Polls a runtime until it is `running`, has failed, or the budget runs out.
///
/// Cadence is a fixed [`POLL_INTERVAL`] with no backoff or jitter. The only
/// way to stop a wait early is its timeout.
pub struct ReadinessPoller {
    api: Arc<dyn PlatformApi>,
}

impl ReadinessPoller {
    pub fn new(api: Arc<dyn PlatformApi>) -> Self {
        Self { api }
    }

    /// Refresh `runtime` in place until it is usable.
    ///
    /// `error` is terminal. `stopping`, `stopped` and `unknown` keep the wait
    /// going since the platform may restart the runtime.
    pub async fn wait_until_ready(
        &self,
        runtime: &mut RuntimeRecord,
        timeout: Duration,
    ) -> Result<(), KilnError> {
        let start = Instant::now();
        let mut polls = 0u32;

        loop {
            let fresh = self
                .api
                .get_runtime(&runtime.pod_name)
                .await
                .map_err(|e| KilnError::runtime_lookup(&runtime.pod_name, e))?;
            *runtime = fresh;
            polls += 1;

            match runtime.state {
                RuntimeState::Running => {
                    tracing::info!(
                        pod_name = %runtime.pod_name,
                        polls,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Runtime ready"
                    );
                    return Ok(());
                }
                RuntimeState::Error => {
                    tracing::error!(pod_name = %runtime.pod_name, polls, "Runtime entered error state");
                    return Err(KilnError::RuntimeFailed {
                        pod_name: runtime.pod_name.clone(),
                        last_state: RuntimeState::Error,
                    });
                }
                RuntimeState::Stopping | RuntimeState::Stopped => {
                    tracing::warn!(
                        pod_name = %runtime.pod_name,
                        state = %runtime.state,
                        "Runtime not running during a readiness wait; still waiting"
                    );
                }
                RuntimeState::Starting | RuntimeState::Unknown => {
                    tracing::debug!(pod_name = %runtime.pod_name, state = %runtime.state, polls, "Runtime not ready");
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(KilnError::Timeout {
                    pod_name: runtime.pod_name.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
